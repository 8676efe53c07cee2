//! Node daemon: serves the ledger API, mines, and replicates with peers.

use clap::Parser;
use std::path::PathBuf;

use storychain::blockchain::DEFAULT_DIFFICULTY;
use storychain::node::{self, NodeConfig};
use storychain::storage::DEFAULT_STATE_DIR;

#[derive(Parser)]
#[command(name = "node", about = "storychain ledger node")]
struct Cli {
    /// Interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5501)]
    port: u16,

    /// Tracker base URL, e.g. http://127.0.0.1:5500
    #[arg(long)]
    tracker: String,

    /// Mine pending payloads in the background.
    #[arg(long)]
    auto_mine: bool,

    /// Seconds between auto-mining attempts.
    #[arg(long, default_value_t = 10)]
    mine_interval: u64,

    /// Leading hex zeros required of a valid block hash. All nodes in a
    /// network must agree on this.
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Seconds between peer synchronization passes.
    #[arg(long, default_value_t = 10)]
    sync_interval: u64,

    /// Directory for persisted chain snapshots.
    #[arg(long, default_value = DEFAULT_STATE_DIR)]
    state_dir: PathBuf,
}

#[actix_web::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let config = NodeConfig {
        host: cli.host,
        port: cli.port,
        tracker_url: cli.tracker,
        auto_mine: cli.auto_mine,
        mine_interval: cli.mine_interval,
        difficulty: cli.difficulty,
        sync_interval: cli.sync_interval,
        state_dir: cli.state_dir,
    };
    if let Err(e) = node::run(config).await {
        log::error!("node failed: {e}");
        std::process::exit(1);
    }
}
