//! Peer synchronization: tracker refresh plus longest-chain adoption.

use actix_web::web;
use log::{debug, info, warn};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;

use crate::api::AppState;
use crate::blockchain::{Block, Blockchain};

/// One synchronization pass: heartbeat the tracker, refresh the peer cache,
/// then compare chains with every cached peer and adopt the single longest
/// strictly-longer valid candidate. Returns whether a chain was adopted.
pub async fn sync_pass(state: &AppState) -> bool {
    refresh_peers(state).await;

    let peers = state.peers.read().expect("lock poisoned").clone();
    if peers.is_empty() {
        debug!("no peers to sync with");
        return false;
    }

    let (local_len, difficulty) = {
        let ledger = state.ledger.read().expect("lock poisoned");
        (ledger.chain.len(), ledger.chain.difficulty)
    };

    let mut best: Option<Vec<Block>> = None;
    for peer in &peers {
        let blocks = match state.client.fetch_chain(peer).await {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!("skipping peer: {e}");
                continue;
            }
        };
        let best_len = best.as_ref().map_or(local_len, Vec::len);
        if blocks.len() <= best_len {
            debug!(
                "chain from {peer} (length {}) is not longer than {best_len}",
                blocks.len()
            );
            continue;
        }
        match Blockchain::from_blocks(blocks, difficulty) {
            Ok(candidate) => best = Some(candidate.chain),
            Err(e) => warn!("invalid chain from {peer}: {e}"),
        }
    }

    match best {
        Some(blocks) => adopt_chain(state, blocks),
        None => false,
    }
}

/// Replace the local chain with an already-validated longer candidate,
/// purging mempool entries whose payload appears in any adopted block.
/// Keeps the local chain when it has meanwhile grown to equal length or
/// beyond (ties keep local).
pub fn adopt_chain(state: &AppState, blocks: Vec<Block>) -> bool {
    let snapshot = {
        let mut ledger = state.ledger.write().expect("lock poisoned");
        if blocks.len() <= ledger.chain.len() {
            debug!("candidate no longer beats local chain, keeping ours");
            return false;
        }
        for block in &blocks {
            ledger.mempool.purge(&block.data);
        }
        let old_len = ledger.chain.len();
        ledger.chain.chain = blocks;
        state.tip_version.fetch_add(1, Ordering::SeqCst);
        info!(
            "adopted peer chain (length {} -> {})",
            old_len,
            ledger.chain.len()
        );
        ledger.chain.chain.clone()
    };
    if let Err(e) = state.store.save(&snapshot) {
        warn!("failed to persist chain: {e}");
    }
    true
}

/// Heartbeat the tracker; the response doubles as the fresh peer list. On
/// failure the cached list stays in place and registration is effectively
/// retried on the next tick.
async fn refresh_peers(state: &AppState) {
    match state.client.heartbeat(&state.address).await {
        Ok(peers) => {
            let peers: Vec<String> = peers.into_iter().filter(|p| p != &state.address).collect();
            debug!("peer cache refreshed ({} peers)", peers.len());
            *state.peers.write().expect("lock poisoned") = peers;
        }
        Err(e) => warn!("keeping cached peers: {e}"),
    }
}

/// Periodic sync worker. Runs a pass every `interval`, or sooner when an
/// orphan or linkage mismatch wakes it up.
pub async fn sync_worker(
    state: web::Data<AppState>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(interval) => {}
            _ = state.sync_wakeup.notified() => {
                debug!("sync pass triggered ahead of schedule");
            }
        }
        if *shutdown.borrow() {
            break;
        }
        sync_pass(&state).await;
    }
    debug!("sync worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NetClient;
    use crate::storage::ChainStore;

    const DIFFICULTY: u32 = 1;

    fn test_state(dir: &std::path::Path) -> AppState {
        AppState::new(
            Blockchain::new(DIFFICULTY),
            ChainStore::new(dir, "127.0.0.1", 5501),
            NetClient::new("http://127.0.0.1:5500".into()),
            "127.0.0.1:5501".into(),
            false,
            10,
        )
    }

    fn extended_chain(payloads: &[&str]) -> Vec<Block> {
        let mut bc = Blockchain::new(DIFFICULTY);
        for data in payloads {
            let mut block = Block::new(bc.tip().index + 1, data.to_string(), bc.tip().hash.clone());
            block.mine(DIFFICULTY);
            bc.append(block).expect("mined block is valid");
        }
        bc.chain
    }

    #[test]
    fn longer_chain_is_adopted_and_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(dir.path());
        let candidate = extended_chain(&["b1", "b2"]);

        assert!(adopt_chain(&state, candidate.clone()));

        let ledger = state.ledger.read().expect("lock poisoned");
        assert_eq!(ledger.chain.len(), 3);
        assert_eq!(ledger.chain.tip().data, "b2");
        assert_eq!(state.tip_version.load(Ordering::SeqCst), 1);
        assert_eq!(state.store.load().expect("persisted"), candidate);
    }

    #[test]
    fn equal_length_keeps_local_chain() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(dir.path());
        {
            let mut ledger = state.ledger.write().expect("lock poisoned");
            let tip = ledger.chain.tip();
            let mut block = Block::new(1, "a1".to_string(), tip.hash.clone());
            block.mine(DIFFICULTY);
            ledger.chain.append(block).expect("valid block");
        }
        let rival = extended_chain(&["b1"]);

        assert!(!adopt_chain(&state, rival));

        let ledger = state.ledger.read().expect("lock poisoned");
        assert_eq!(ledger.chain.tip().data, "a1");
        assert_eq!(state.tip_version.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn shorter_candidate_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(dir.path());
        {
            let mut ledger = state.ledger.write().expect("lock poisoned");
            let tip = ledger.chain.tip();
            let mut block = Block::new(1, "a1".to_string(), tip.hash.clone());
            block.mine(DIFFICULTY);
            ledger.chain.append(block).expect("valid block");
        }
        let genesis_only = Blockchain::new(DIFFICULTY).chain;
        assert!(!adopt_chain(&state, genesis_only));
    }

    #[test]
    fn adoption_purges_matching_mempool_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(dir.path());
        {
            let mut ledger = state.ledger.write().expect("lock poisoned");
            ledger.mempool.push("b1".into());
            ledger.mempool.push("pending".into());
            ledger.mempool.push("b2".into());
        }
        let candidate = extended_chain(&["b1", "b2"]);

        assert!(adopt_chain(&state, candidate));

        let mut ledger = state.ledger.write().expect("lock poisoned");
        assert_eq!(ledger.mempool.len(), 1);
        assert_eq!(ledger.mempool.pop_front().as_deref(), Some("pending"));
    }
}
