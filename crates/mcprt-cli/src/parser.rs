//! Root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

#[derive(Debug, Parser)]
#[command(name = "mcprt")]
#[command(about = "Execution and lifecycle management for MCP tool-servers")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
