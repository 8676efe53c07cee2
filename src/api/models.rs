use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::RwLock;
use tokio::sync::Notify;

use crate::blockchain::{Block, Blockchain};
use crate::mempool::Mempool;
use crate::net::NetClient;
use crate::storage::ChainStore;

/// Chain and mempool move together: every accepted block may consume a
/// pending payload, so a single lock guards the pair.
pub struct Ledger {
    pub chain: Blockchain,
    pub mempool: Mempool,
}

/// Shared application state for one node.
pub struct AppState {
    pub ledger: RwLock<Ledger>,
    /// Incremented under the write lock on every chain mutation. Mining
    /// attempts poll it to notice the tip moving under them.
    pub tip_version: AtomicU64,
    pub auto_mine: AtomicBool,
    /// Seconds between auto-mining attempts.
    pub mine_interval: AtomicU64,
    /// Most recent peer list from the tracker (`host:port`, never self).
    pub peers: RwLock<Vec<String>>,
    /// Wakes the sync worker ahead of its next tick.
    pub sync_wakeup: Notify,
    pub client: NetClient,
    pub store: ChainStore,
    /// This node's own `host:port` address.
    pub address: String,
}

impl AppState {
    pub fn new(
        chain: Blockchain,
        store: ChainStore,
        client: NetClient,
        address: String,
        auto_mine: bool,
        mine_interval: u64,
    ) -> Self {
        Self {
            ledger: RwLock::new(Ledger {
                chain,
                mempool: Mempool::new(),
            }),
            tip_version: AtomicU64::new(0),
            auto_mine: AtomicBool::new(auto_mine),
            mine_interval: AtomicU64::new(mine_interval),
            peers: RwLock::new(Vec::new()),
            sync_wakeup: Notify::new(),
            client,
            store,
            address,
        }
    }
}

/* ---------- Request/Response Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub chain: &'a [Block],
}

#[derive(Deserialize)]
pub struct AddTransactionRequest {
    pub data: String,
}

#[derive(Serialize)]
pub struct AddTransactionResponse {
    pub accepted: bool,
    pub pool_size: usize,
}

#[derive(Deserialize)]
pub struct MineRequest {
    pub data: String,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub block: Block,
}

#[derive(Serialize)]
pub struct MineErrorResponse {
    pub error: String,
}

#[derive(Deserialize)]
pub struct ReceiveBlockRequest {
    pub block: Block,
}

#[derive(Serialize)]
pub struct ReceiveBlockResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct AutoMineRequest {
    pub enable: bool,
    #[serde(default)]
    pub interval: Option<u64>,
}

#[derive(Serialize)]
pub struct AutoMineResponse {
    pub auto_mine: bool,
    pub interval: u64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub length: usize,
    pub tip_hash: String,
    pub mempool_size: usize,
    pub auto_mine: bool,
    pub peers: usize,
}

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<String>,
}
