//! Command-line surface for `podcache-ctl`.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "podcache-ctl", version, about = "podcache control channel client", long_about = None)]
pub struct Cli {
    /// Gateway base URL, e.g. <http://127.0.0.1:8787>
    #[arg(long, env = "PODCACHE_URL", default_value = "http://127.0.0.1:8787")]
    pub gateway: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Activate the waiting cache version now
    SkipWaiting,
    /// Pin a media URL for offline use
    Cache {
        /// Absolute URL or path relative to the origin
        url: String,
    },
    /// Show active and waiting versions, namespaces and client count
    Status,
    /// Check whether a media URL is pinned
    Cached {
        url: String,
    },
    /// Print notifications as they arrive
    Watch {
        /// Exit after this many notifications
        #[arg(long)]
        count: Option<usize>,
    },
}
