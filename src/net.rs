//! Outbound HTTP: tracker directory calls and peer gossip.
//!
//! All calls share one pooled client with bounded timeouts. Peer addresses
//! are bare `host:port` strings; URLs are assembled here.

use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::blockchain::Block;
use crate::error::NodeError;

/// Per-request timeout for every outbound call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection timeout, kept shorter so a dead peer fails fast.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct AddressBody<'a> {
    address: &'a str,
}

#[derive(Deserialize)]
struct PeersBody {
    peers: Vec<String>,
}

#[derive(Deserialize)]
struct ChainBody {
    #[allow(dead_code)]
    length: usize,
    chain: Vec<Block>,
}

#[derive(Serialize)]
struct BlockBody<'a> {
    block: &'a Block,
}

#[derive(Deserialize)]
struct VerdictBody {
    accepted: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP client for one node's outbound traffic.
pub struct NetClient {
    http: reqwest::Client,
    tracker_url: String,
}

impl NetClient {
    pub fn new(tracker_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            tracker_url: tracker_url.trim_end_matches('/').to_string(),
        }
    }

    async fn tracker_post(&self, endpoint: &str, address: &str) -> Result<Vec<String>, NodeError> {
        let url = format!("{}/{endpoint}", self.tracker_url);
        let response = self
            .http
            .post(&url)
            .json(&AddressBody { address })
            .send()
            .await
            .map_err(|e| NodeError::TrackerUnreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NodeError::TrackerUnreachable(format!(
                "HTTP status {}",
                response.status()
            )));
        }
        let body: PeersBody = response
            .json()
            .await
            .map_err(|e| NodeError::TrackerUnreachable(e.to_string()))?;
        Ok(body.peers)
    }

    /// Register this node; the response carries the live peer list
    /// excluding the caller.
    pub async fn register(&self, address: &str) -> Result<Vec<String>, NodeError> {
        self.tracker_post("register", address).await
    }

    /// Refresh this node's directory entry. Same semantics as `register`.
    pub async fn heartbeat(&self, address: &str) -> Result<Vec<String>, NodeError> {
        self.tracker_post("heartbeat", address).await
    }

    /// Best-effort removal from the directory on graceful shutdown.
    pub async fn unregister(&self, address: &str) -> Result<(), NodeError> {
        self.tracker_post("unregister", address).await.map(|_| ())
    }

    /// Fetch a peer's full chain.
    pub async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, NodeError> {
        let url = format!("http://{peer}/get_chain");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NodeError::PeerRequest(format!("{peer}: {e}")))?;
        if !response.status().is_success() {
            return Err(NodeError::PeerRequest(format!(
                "{peer}: HTTP status {}",
                response.status()
            )));
        }
        let body: ChainBody = response
            .json()
            .await
            .map_err(|e| NodeError::PeerRequest(format!("{peer}: {e}")))?;
        Ok(body.chain)
    }

    /// Offer a freshly mined block to a peer and return its verdict. A
    /// rejection (HTTP 409 with a reason) is a normal answer, not an error.
    pub async fn send_block(&self, peer: &str, block: &Block) -> Result<bool, NodeError> {
        let url = format!("http://{peer}/receive_block");
        let response = self
            .http
            .post(&url)
            .json(&BlockBody { block })
            .send()
            .await
            .map_err(|e| NodeError::PeerRequest(format!("{peer}: {e}")))?;
        let verdict: VerdictBody = response
            .json()
            .await
            .map_err(|e| NodeError::PeerRequest(format!("{peer}: {e}")))?;
        if let Some(reason) = &verdict.reason {
            debug!("{peer} declined block {}: {reason}", block.index);
        }
        Ok(verdict.accepted)
    }
}
