use clap::{Parser, Subcommand};

/// Telemetry Relay - real-time sensor state and fan-out server
#[derive(Parser)]
#[command(name = "telemetry-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Override the listening port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Override the bind address
    #[arg(long, global = true)]
    pub bind: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default)
    Serve,

    /// Create the durable schema and exit
    InitDb,

    /// Show recent detection events from the durable store
    Logs {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}
