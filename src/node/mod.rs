//! Node lifecycle: bootstrap, registration, workers, and shutdown.

pub mod miner;
pub mod sync;

use actix_web::{web, App, HttpServer};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

use crate::api::{self, AppState};
use crate::blockchain::Blockchain;
use crate::net::NetClient;
use crate::storage::ChainStore;

/// Runtime configuration for one node process.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Tracker base URL, e.g. `http://127.0.0.1:5500`.
    pub tracker_url: String,
    pub auto_mine: bool,
    /// Seconds between auto-mining attempts.
    pub mine_interval: u64,
    /// Leading hex zeros required of a valid block hash.
    pub difficulty: u32,
    /// Seconds between peer synchronization passes.
    pub sync_interval: u64,
    /// Directory for persisted chain snapshots.
    pub state_dir: PathBuf,
}

impl NodeConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the node's shared state: restore the persisted chain when one
/// exists and still validates, otherwise start from a fresh genesis.
pub fn bootstrap(config: &NodeConfig) -> AppState {
    let store = ChainStore::new(&config.state_dir, &config.host, config.port);
    let chain = match store.load() {
        Some(blocks) => match Blockchain::from_blocks(blocks, config.difficulty) {
            Ok(chain) => {
                info!(
                    "restored chain of {} blocks from {}",
                    chain.len(),
                    store.path().display()
                );
                chain
            }
            Err(e) => {
                warn!("persisted chain failed validation ({e}), starting from genesis");
                Blockchain::new(config.difficulty)
            }
        },
        None => {
            info!("no persisted chain, starting from genesis");
            Blockchain::new(config.difficulty)
        }
    };
    AppState::new(
        chain,
        store,
        NetClient::new(config.tracker_url.clone()),
        config.address(),
        config.auto_mine,
        config.mine_interval,
    )
}

/// Run a node to completion: bootstrap, register, serve until interrupted,
/// then unregister and persist a final snapshot.
pub async fn run(config: NodeConfig) -> std::io::Result<()> {
    let state = web::Data::new(bootstrap(&config));

    // Initial registration; a failure is retried on every sync tick.
    match state.client.register(&state.address).await {
        Ok(peers) => {
            info!("registered with tracker ({} peers)", peers.len());
            *state.peers.write().expect("lock poisoned") =
                peers.into_iter().filter(|p| p != &state.address).collect();
        }
        Err(e) => warn!("initial registration failed, will retry: {e}"),
    }

    // Catch up with the network before exposing the HTTP surface.
    sync::sync_pass(&state).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_handle = tokio::spawn(sync::sync_worker(
        state.clone(),
        Duration::from_secs(config.sync_interval.max(1)),
        shutdown_rx.clone(),
    ));
    let miner_handle = tokio::spawn(miner::auto_mine_worker(state.clone(), shutdown_rx));

    let server = {
        let state = state.clone();
        HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .configure(api::init_routes)
        })
        .bind((config.host.as_str(), config.port))?
        .run()
    };

    info!("node listening on {}", state.address);
    let result = server.await;

    // Signal the workers, then let them reach their next check point.
    let _ = shutdown_tx.send(true);
    let _ = sync_handle.await;
    let _ = miner_handle.await;

    if let Err(e) = state.client.unregister(&state.address).await {
        debug!("unregister failed: {e}");
    }
    let snapshot = {
        let ledger = state.ledger.read().expect("lock poisoned");
        ledger.chain.chain.clone()
    };
    if let Err(e) = state.store.save(&snapshot) {
        warn!("final persist failed: {e}");
    }
    info!("node {} stopped", state.address);
    result
}
