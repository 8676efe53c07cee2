//! Tracker daemon: the peer directory for a storychain network.

use clap::Parser;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "tracker", about = "storychain peer directory")]
struct Cli {
    /// Interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5500)]
    port: u16,

    /// Seconds before a silent node is dropped from the directory.
    #[arg(long, default_value_t = 30)]
    ttl: u64,
}

#[actix_web::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = storychain::tracker::run(&cli.host, cli.port, Duration::from_secs(cli.ttl)).await
    {
        log::error!("tracker failed: {e}");
        std::process::exit(1);
    }
}
