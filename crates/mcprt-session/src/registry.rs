//! Tool-server session lifecycle.
//!
//! The registry is the only owner of live sessions. Executors borrow a
//! session handle for the duration of one call via [`SessionRegistry::session`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use mcprt_core::{
    DiscoveryError, DiscoveryPort, LifecycleReport, RuntimeError, RuntimeResult, SessionConnector,
    SessionSnapshot, SessionStatus, StartupConfig, ToolSession, TransportKind,
};
use tokio::sync::{Mutex as AsyncMutex, RwLock};

/// Failure recorded for a session whose server went away on its own.
const SESSION_CLOSED: &str = "session closed";

/// One registry slot.
struct SessionEntry {
    status: SessionStatus,
    session: Option<Arc<dyn ToolSession>>,
    transport: Option<TransportKind>,
    started_at: Option<DateTime<Utc>>,
}

impl SessionEntry {
    const fn starting() -> Self {
        Self {
            status: SessionStatus::Starting,
            session: None,
            transport: None,
            started_at: None,
        }
    }

    /// Running with a session that can still serve calls.
    fn is_live(&self) -> bool {
        self.status.is_running() && self.session.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// Status as callers see it: a running entry whose session died is failed.
    fn effective_status(&self) -> SessionStatus {
        if self.status.is_running() && !self.is_live() {
            SessionStatus::Failed(SESSION_CLOSED.to_string())
        } else {
            self.status.clone()
        }
    }
}

/// Registry of tool-server sessions keyed by server name.
pub struct SessionRegistry {
    discovery: Arc<dyn DiscoveryPort>,
    connector: Arc<dyn SessionConnector>,
    entries: RwLock<HashMap<String, SessionEntry>>,
    /// Serializes start/shutdown per server name.
    name_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionRegistry {
    pub fn new(discovery: Arc<dyn DiscoveryPort>, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            discovery,
            connector,
            entries: RwLock::new(HashMap::new()),
            name_locks: Mutex::new(HashMap::new()),
        }
    }

    fn name_lock(&self, server_name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .name_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(server_name.to_string()).or_default())
    }

    /// Forget the lock for `server_name` unless someone else holds a handle.
    fn prune_name_lock(&self, server_name: &str, lock: &Arc<AsyncMutex<()>>) {
        let mut locks = self
            .name_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one in `lock`.
        if Arc::strong_count(lock) == 2 {
            locks.remove(server_name);
        }
    }

    /// Ensure `server_name` is running.
    ///
    /// Idempotent: a running server is left untouched. Failures are reported
    /// in the returned [`LifecycleReport`] and recorded as `Failed`. A server
    /// whose session closed on its own is started again.
    pub async fn start(&self, server_name: &str) -> LifecycleReport {
        let lock = self.name_lock(server_name);
        let _guard = lock.lock().await;

        let dead = {
            let mut entries = self.entries.write().await;
            match entries.get_mut(server_name) {
                Some(entry) if entry.is_live() => {
                    return LifecycleReport::ok(format!(
                        "Server '{server_name}' is already running"
                    ));
                }
                Some(entry) => entry.session.take(),
                None => None,
            }
        };
        if let Some(session) = dead {
            tracing::warn!(server_name = %server_name, "Tool-server session closed on its own, restarting");
            if let Err(e) = session.close().await {
                tracing::debug!(server_name = %server_name, error = %e, "Error while reaping dead session");
            }
        }

        self.entries
            .write()
            .await
            .insert(server_name.to_string(), SessionEntry::starting());

        match self.open(server_name).await {
            Ok(session) => {
                let transport = session.transport();
                self.entries.write().await.insert(
                    server_name.to_string(),
                    SessionEntry {
                        status: SessionStatus::Running,
                        session: Some(session),
                        transport: Some(transport),
                        started_at: Some(Utc::now()),
                    },
                );
                tracing::info!(server_name = %server_name, %transport, "Tool-server started");
                LifecycleReport::ok(format!("Server '{server_name}' started"))
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(server_name = %server_name, error = %message, "Failed to start tool-server");
                if let Some(entry) = self.entries.write().await.get_mut(server_name) {
                    entry.status = SessionStatus::Failed(message.clone());
                }
                LifecycleReport::failed(message)
            }
        }
    }

    /// Fetch the startup config and connect, bounded by the config's timeout.
    async fn open(&self, server_name: &str) -> RuntimeResult<Arc<dyn ToolSession>> {
        let config = self
            .discovery
            .get_startup_config(server_name)
            .await
            .map_err(|e| startup_config_error(server_name, e))?;
        self.connect(server_name, &config).await
    }

    async fn connect(
        &self,
        server_name: &str,
        config: &StartupConfig,
    ) -> RuntimeResult<Arc<dyn ToolSession>> {
        let limit = config.connect_timeout();
        match tokio::time::timeout(limit, self.connector.connect(config)).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => Err(RuntimeError::ServerStartFailed {
                server_name: server_name.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(RuntimeError::ServerStartFailed {
                server_name: server_name.to_string(),
                message: format!("timed out after {}s", limit.as_secs_f64()),
            }),
        }
    }

    /// Close and forget `server_name`.
    ///
    /// Succeeds without action when the server is not running.
    pub async fn shutdown(&self, server_name: &str) -> LifecycleReport {
        let lock = self.name_lock(server_name);
        let report = {
            let _guard = lock.lock().await;
            self.remove(server_name).await
        };
        self.prune_name_lock(server_name, &lock);
        report
    }

    async fn remove(&self, server_name: &str) -> LifecycleReport {
        let entry = self.entries.write().await.remove(server_name);
        let Some(session) = entry.and_then(|e| e.session) else {
            return LifecycleReport::ok(format!(
                "Server '{server_name}' is not running; nothing to do"
            ));
        };

        match session.close().await {
            Ok(()) => {
                tracing::info!(server_name = %server_name, "Tool-server stopped");
                LifecycleReport::ok(format!("Server '{server_name}' shut down"))
            }
            Err(e) => {
                tracing::warn!(server_name = %server_name, error = %e, "Error while closing tool-server");
                LifecycleReport::ok(format!(
                    "Server '{server_name}' removed; close reported: {e}"
                ))
            }
        }
    }

    /// Shut down every session.
    pub async fn shutdown_all(&self) {
        let names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        for name in names {
            let report = self.shutdown(&name).await;
            tracing::debug!(server_name = %name, message = %report.message, "shutdown");
        }
    }

    /// Session handle for a running server.
    pub async fn session(&self, server_name: &str) -> RuntimeResult<Arc<dyn ToolSession>> {
        self.entries
            .read()
            .await
            .get(server_name)
            .filter(|e| e.is_live())
            .and_then(|e| e.session.clone())
            .ok_or_else(|| RuntimeError::ServerNotRunning(server_name.to_string()))
    }

    pub async fn is_running(&self, server_name: &str) -> bool {
        self.entries
            .read()
            .await
            .get(server_name)
            .is_some_and(SessionEntry::is_live)
    }

    pub async fn status(&self, server_name: &str) -> Option<SessionStatus> {
        self.entries
            .read()
            .await
            .get(server_name)
            .map(SessionEntry::effective_status)
    }

    /// Names of running servers, sorted.
    pub async fn list_running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.is_live())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Every entry, sorted by name.
    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<SessionSnapshot> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(name, e)| SessionSnapshot {
                server_name: name.clone(),
                status: e.effective_status(),
                transport: e.transport,
                started_at: e.started_at,
            })
            .collect();
        snapshots.sort_by(|a, b| a.server_name.cmp(&b.server_name));
        snapshots
    }
}

fn startup_config_error(server_name: &str, err: DiscoveryError) -> RuntimeError {
    match err {
        DiscoveryError::NotFound { .. } => RuntimeError::ServerStartFailed {
            server_name: server_name.to_string(),
            message: "no startup configuration registered".to_string(),
        },
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mcprt_core::testing::{FakeConnector, FakeDiscovery};
    use mcprt_core::{RawStartupConfig, SessionError};

    fn registry_with(
        discovery: FakeDiscovery,
    ) -> (SessionRegistry, Arc<FakeDiscovery>, Arc<FakeConnector>) {
        let discovery = Arc::new(discovery);
        let connector = Arc::new(FakeConnector::new());
        let registry = SessionRegistry::new(discovery.clone(), connector.clone());
        (registry, discovery, connector)
    }

    fn svc() -> FakeDiscovery {
        FakeDiscovery::new()
            .with_config(StartupConfig::stdio("svc", "svc-server", Vec::new()).unwrap())
    }

    #[tokio::test]
    async fn test_second_start_is_idempotent() {
        let (registry, _, connector) = registry_with(svc());

        let first = registry.start("svc").await;
        let second = registry.start("svc").await;

        assert!(first.success);
        assert!(second.success);
        assert!(second.message.contains("already running"));
        assert_eq!(connector.connects(), 1);
        assert_eq!(registry.list_running().await, vec!["svc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_starts_spawn_once() {
        let (registry, _, connector) = registry_with(svc());
        connector.set_connect_delay(Some(Duration::from_millis(50)));

        let (a, b) = tokio::join!(registry.start("svc"), registry.start("svc"));

        assert!(a.success && b.success);
        assert_eq!(connector.connects(), 1);
        assert_eq!(registry.list_running().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_names_start_independently() {
        let discovery = svc()
            .with_config(StartupConfig::stdio("other", "other-server", Vec::new()).unwrap());
        let (registry, _, connector) = registry_with(discovery);
        connector.set_connect_delay(Some(Duration::from_secs(1)));

        let started = tokio::time::Instant::now();
        let (a, b) = tokio::join!(registry.start("svc"), registry.start("other"));

        assert!(a.success && b.success);
        // Both connects overlapped.
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert_eq!(registry.list_running().await, vec!["other", "svc"]);
    }

    #[tokio::test]
    async fn test_failed_start_is_recorded_and_retried() {
        let (registry, _, connector) = registry_with(svc());
        connector.fail("svc", "exec format error");

        let report = registry.start("svc").await;
        assert!(!report.success);
        assert!(report.message.contains("exec format error"));
        assert!(matches!(
            registry.status("svc").await,
            Some(SessionStatus::Failed(_))
        ));
        assert!(registry.list_running().await.is_empty());

        connector.clear_failure("svc");
        let report = registry.start("svc").await;
        assert!(report.success);
        assert_eq!(registry.status("svc").await, Some(SessionStatus::Running));
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_discovery_outage_fails_start() {
        let (registry, discovery, connector) = registry_with(svc());
        discovery.set_unavailable(true);

        let report = registry.start("svc").await;
        assert!(!report.success);
        assert!(report.message.contains("Discovery service unavailable"));
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_unknown_server_fails_start() {
        let (registry, _, _) = registry_with(FakeDiscovery::new());

        let report = registry.start("ghost").await;
        assert!(!report.success);
        assert!(report.message.contains("no startup configuration"));
    }

    #[tokio::test]
    async fn test_config_is_fetched_on_every_start() {
        let (registry, discovery, _) = registry_with(svc());

        registry.start("svc").await;
        registry.shutdown("svc").await;
        registry.start("svc").await;

        assert_eq!(discovery.startup_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let config = StartupConfig::new(RawStartupConfig {
            server_name: "slow".to_string(),
            command: Some("slow-server".to_string()),
            timeout: Some(1.0),
            ..RawStartupConfig::default()
        })
        .unwrap();
        let (registry, _, connector) = registry_with(FakeDiscovery::new().with_config(config));
        connector.set_connect_delay(Some(Duration::from_secs(5)));

        let report = registry.start("slow").await;
        assert!(!report.success);
        assert!(report.message.contains("timed out after 1s"));
    }

    #[tokio::test]
    async fn test_shutdown_closes_session() {
        let (registry, _, connector) = registry_with(svc());
        registry.start("svc").await;
        let session = connector.session("svc").unwrap();

        let report = registry.shutdown("svc").await;
        assert!(report.success);
        assert!(session.is_closed());
        assert!(registry.list_running().await.is_empty());
        assert!(registry.status("svc").await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_of_absent_server_is_noop() {
        let (registry, _, _) = registry_with(svc());

        let report = registry.shutdown("svc").await;
        assert!(report.success);
        assert!(report.message.contains("nothing to do"));
    }

    #[tokio::test]
    async fn test_session_requires_running_server() {
        let (registry, _, _) = registry_with(svc());

        let err = registry.session("svc").await.err().unwrap();
        assert!(matches!(err, RuntimeError::ServerNotRunning(ref name) if name == "svc"));

        registry.start("svc").await;
        let session = registry.session("svc").await.unwrap();
        assert_eq!(session.transport(), TransportKind::Stdio);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_calls() {
        let (registry, _, _) = registry_with(svc());
        registry.start("svc").await;
        let session = registry.session("svc").await.unwrap();

        registry.shutdown("svc").await;
        let err = session
            .call_tool("echo", serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Closed));
    }

    #[tokio::test]
    async fn test_session_that_closed_itself_is_restarted() {
        let (registry, _, connector) = registry_with(svc());
        assert!(registry.start("svc").await.success);
        connector.session("svc").unwrap().terminate();

        assert!(!registry.is_running("svc").await);
        assert!(registry.list_running().await.is_empty());
        assert_eq!(
            registry.status("svc").await,
            Some(SessionStatus::Failed("session closed".to_string()))
        );
        let err = registry.session("svc").await.err().unwrap();
        assert!(matches!(err, RuntimeError::ServerNotRunning(_)));

        let report = registry.start("svc").await;
        assert!(report.success);
        assert_eq!(report.message, "Server 'svc' started");
        assert_eq!(connector.connects(), 2);
        assert!(registry.session("svc").await.is_ok());
        assert_eq!(registry.list_running().await, vec!["svc".to_string()]);
    }

    #[tokio::test]
    async fn test_shutdown_releases_name_lock() {
        let (registry, _, _) = registry_with(svc());
        registry.start("svc").await;
        registry.shutdown("svc").await;
        registry.shutdown("never-started").await;

        let locks = registry.name_locks.lock().unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_all_and_snapshot() {
        let discovery = svc()
            .with_config(StartupConfig::stdio("other", "other-server", Vec::new()).unwrap());
        let (registry, _, _) = registry_with(discovery);
        registry.start("svc").await;
        registry.start("other").await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].server_name, "other");
        assert!(snapshot.iter().all(|s| s.started_at.is_some()));

        registry.shutdown_all().await;
        assert!(registry.snapshot().await.is_empty());
    }
}
