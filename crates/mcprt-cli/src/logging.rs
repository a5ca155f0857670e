//! Log setup for the binary.
//!
//! Everything goes to stderr: on the stdio transport stdout carries the
//! protocol.

use tracing_subscriber::EnvFilter;

/// Filter directive: `-v` forces debug, otherwise `RUST_LOG` or `info`.
pub fn filter_directive(verbose: bool, rust_log: Option<&str>) -> String {
    if verbose {
        return "debug".to_string();
    }
    match rust_log.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => "info".to_string(),
    }
}

/// Install the global subscriber. A second call is ignored.
pub fn init_tracing(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(verbose, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Ignoring invalid log filter '{directive}': {e}");
        EnvFilter::new("info")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}
