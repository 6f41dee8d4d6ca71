use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `ecolesync` - offline-resilient command queue for the school client.
#[derive(Parser, Debug)]
#[command(name = "ecolesync")]
#[command(version)]
#[command(about = "Send school-management commands, queueing them while offline.", long_about = None)]
pub struct Cli {
    /// Signed-in user whose queue to use (overrides config and ECOLESYNC_PRINCIPAL)
    #[arg(long, global = true)]
    pub principal: Option<String>,

    /// Config file (default: ~/.ecolesync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at DEBUG level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Perform a command now, queueing it if the device is offline
    Send {
        /// Callable function name, e.g. createPaiement
        name: String,

        /// JSON payload
        payload: String,

        /// Treat the device as offline (transport failures are queued)
        #[arg(long)]
        offline: bool,
    },

    /// Inspect or edit the pending queue
    Queue {
        #[command(subcommand)]
        queue_command: QueueCommands,
    },

    /// Replay pending commands once and print the report
    Drain,

    /// Show connectivity, pending count and config paths
    Status,

    /// Long-running session driven by stdin lines: online, offline, retry,
    /// status, send <name> <json>, quit
    Run {
        /// Start offline instead of trusting the configured default
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// List pending commands in replay order
    List,

    /// Remove one pending command without replaying it
    Discard {
        /// Command id as shown by `queue list`
        id: String,
    },
}
