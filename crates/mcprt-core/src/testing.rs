//! In-memory fakes of the ports, for tests in this and downstream crates.
//!
//! Enabled with the `test-utils` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Notify;

use crate::domain::{
    ContentBlock, DiscoveryStatistics, JsonObject, Page, ServerInfo, ServerSearchQuery,
    StartupConfig, ToolInfo, ToolOutput, ToolSearchQuery, TransportKind,
};
use crate::error::{DiscoveryError, SessionError};
use crate::ports::{DiscoveryPort, DiscoveryResult, SessionConnector, ToolSession};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn to_object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// Discovery service backed by in-memory registrations.
#[derive(Default)]
pub struct FakeDiscovery {
    configs: Mutex<HashMap<String, StartupConfig>>,
    servers: Mutex<Vec<ServerInfo>>,
    tools: Mutex<Vec<ToolInfo>>,
    unavailable: AtomicBool,
    startup_calls: AtomicUsize,
}

impl FakeDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a startup config (and a matching server entry).
    #[must_use]
    pub fn with_config(self, config: StartupConfig) -> Self {
        lock(&self.servers).push(ServerInfo {
            server_name: config.server_name().to_string(),
            title: config.server_name().to_string(),
            ..ServerInfo::default()
        });
        lock(&self.configs).insert(config.server_name().to_string(), config);
        self
    }

    #[must_use]
    pub fn with_tool(self, tool: ToolInfo) -> Self {
        lock(&self.tools).push(tool);
        self
    }

    /// Make every request fail with a network error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of startup-config lookups served.
    pub fn startup_calls(&self) -> usize {
        self.startup_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> DiscoveryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Network {
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn tool_json(tool: &ToolInfo) -> Value {
        serde_json::to_value(tool).unwrap_or(Value::Null)
    }
}

#[async_trait]
impl DiscoveryPort for FakeDiscovery {
    async fn search_tools(&self, query: &ToolSearchQuery) -> DiscoveryResult<JsonObject> {
        self.check_available()?;
        let needle = query.query.to_lowercase();
        let tools: Vec<Value> = lock(&self.tools)
            .iter()
            .filter(|t| {
                t.tool_name.to_lowercase().contains(&needle)
                    || t.tool_description.to_lowercase().contains(&needle)
            })
            .filter(|t| {
                query
                    .server_names
                    .as_ref()
                    .is_none_or(|names| names.contains(&t.server_name))
            })
            .take(query.limit as usize)
            .map(Self::tool_json)
            .collect();
        Ok(to_object(json!({
            "total_results": tools.len(),
            "tools": tools,
        })))
    }

    async fn search_servers(&self, query: &ServerSearchQuery) -> DiscoveryResult<JsonObject> {
        self.check_available()?;
        let needle = query.query.to_lowercase();
        let servers: Vec<Value> = lock(&self.servers)
            .iter()
            .filter(|s| s.server_name.to_lowercase().contains(&needle))
            .take(query.limit as usize)
            .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
            .collect();
        Ok(to_object(json!({
            "total_results": servers.len(),
            "servers": servers,
        })))
    }

    async fn get_server_info(&self, server_name: &str) -> DiscoveryResult<ServerInfo> {
        self.check_available()?;
        lock(&self.servers)
            .iter()
            .find(|s| s.server_name == server_name)
            .cloned()
            .ok_or_else(|| DiscoveryError::NotFound {
                resource: format!("server '{server_name}'"),
            })
    }

    async fn get_server_tools(&self, server_name: &str, page: Page) -> DiscoveryResult<JsonObject> {
        self.check_available()?;
        let tools = lock(&self.tools);
        let matching: Vec<&ToolInfo> = tools.iter().filter(|t| t.server_name == server_name).collect();
        let slice: Vec<Value> = matching
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|t| Self::tool_json(t))
            .collect();
        Ok(to_object(json!({
            "server_name": server_name,
            "total": matching.len(),
            "tools": slice,
        })))
    }

    async fn get_tool_details(&self, server_name: &str, tool_name: &str) -> DiscoveryResult<ToolInfo> {
        self.check_available()?;
        lock(&self.tools)
            .iter()
            .find(|t| t.server_name == server_name && t.tool_name == tool_name)
            .cloned()
            .ok_or_else(|| DiscoveryError::NotFound {
                resource: format!("tool '{tool_name}' on '{server_name}'"),
            })
    }

    async fn list_servers(&self, page: Page) -> DiscoveryResult<JsonObject> {
        self.check_available()?;
        let servers = lock(&self.servers);
        let slice: Vec<Value> = servers
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|s| {
                json!({
                    "name": s.server_name,
                    "title": s.title,
                    "nbTools": s.nb_tools,
                })
            })
            .collect();
        Ok(to_object(json!({
            "total": servers.len(),
            "servers": slice,
        })))
    }

    async fn get_statistics(&self) -> DiscoveryResult<DiscoveryStatistics> {
        self.check_available()?;
        Ok(DiscoveryStatistics {
            total_servers: lock(&self.servers).len() as u64,
            total_tools: lock(&self.tools).len() as u64,
            extra: Map::new(),
        })
    }

    async fn get_startup_config(&self, server_name: &str) -> DiscoveryResult<StartupConfig> {
        self.startup_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        lock(&self.configs)
            .get(server_name)
            .cloned()
            .ok_or_else(|| DiscoveryError::NotFound {
                resource: format!("server '{server_name}'"),
            })
    }
}

/// Scripted behaviour for one tool of a [`ScriptedSession`].
#[derive(Clone)]
pub enum Script {
    /// Return this output immediately.
    Reply(ToolOutput),
    /// Fail at the transport level.
    Fail(SessionError),
    /// Sleep, then reply.
    Delay(Duration, ToolOutput),
    /// Wait until the gate is notified, then reply.
    Gated(Arc<Notify>, ToolOutput),
    /// Never return.
    Hang,
    /// Panic inside the call.
    Panic,
}

/// A session whose tools answer from a script.
///
/// Tools without a script echo their arguments back as JSON text.
pub struct ScriptedSession {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
    closed: AtomicBool,
    transport: TransportKind,
}

impl Default for ScriptedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            transport: TransportKind::Stdio,
        }
    }

    pub fn script(&self, tool_name: impl Into<String>, script: Script) {
        lock(&self.scripts).insert(tool_name.into(), script);
    }

    /// Tool calls seen so far, in start order.
    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        lock(&self.calls).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Drop the connection from the server side, as a crashed process would.
    pub fn terminate(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ToolSession for ScriptedSession {
    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        lock(&self.calls).push((tool_name.to_string(), arguments.clone()));
        let script = lock(&self.scripts).get(tool_name).cloned();

        match script {
            None => Ok(ToolOutput::success(vec![ContentBlock::text(
                Value::Object(arguments).to_string(),
            )])),
            Some(Script::Reply(output)) => Ok(output),
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Delay(delay, output)) => {
                tokio::time::sleep(delay).await;
                Ok(output)
            }
            Some(Script::Gated(gate, output)) => {
                gate.notified().await;
                Ok(output)
            }
            Some(Script::Hang) => std::future::pending().await,
            Some(Script::Panic) => panic!("scripted panic in {tool_name}"),
        }
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn transport(&self) -> TransportKind {
        self.transport
    }
}

/// Connector handing out [`ScriptedSession`]s.
#[derive(Default)]
pub struct FakeConnector {
    sessions: Mutex<HashMap<String, Arc<ScriptedSession>>>,
    failures: Mutex<HashMap<String, String>>,
    connect_delay: Mutex<Option<Duration>>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session returned when `server_name` connects.
    ///
    /// Servers without a registered session get a fresh default one.
    pub fn register(&self, server_name: impl Into<String>, session: Arc<ScriptedSession>) {
        lock(&self.sessions).insert(server_name.into(), session);
    }

    /// Make connections to `server_name` fail with `message`.
    pub fn fail(&self, server_name: impl Into<String>, message: impl Into<String>) {
        lock(&self.failures).insert(server_name.into(), message.into());
    }

    pub fn clear_failure(&self, server_name: &str) {
        lock(&self.failures).remove(server_name);
    }

    /// Delay every connection attempt.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *lock(&self.connect_delay) = delay;
    }

    /// Number of connection attempts.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn session(&self, server_name: &str) -> Option<Arc<ScriptedSession>> {
        lock(&self.sessions).get(server_name).cloned()
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect(&self, config: &StartupConfig) -> Result<Arc<dyn ToolSession>, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.connect_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let name = config.server_name();
        if let Some(message) = lock(&self.failures).get(name).cloned() {
            return Err(SessionError::Connect(message));
        }

        let session = lock(&self.sessions)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ScriptedSession::new()))
            .clone();
        session.closed.store(false, Ordering::SeqCst);
        Ok(session)
    }
}
