//! CLI entry point.

use std::time::Duration;

use clap::Parser;

use mcprt_cli::{Cli, Commands, handlers, init_tracing};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Serve(args) => handlers::serve::execute(&args).await,
        }
    });

    // A pending stdin read holds a blocking thread that never returns.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}
