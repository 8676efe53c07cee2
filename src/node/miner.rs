//! Mining: one cancelable attempt at a time, plus the auto-mining worker.
//!
//! An attempt snapshots the tip under the read lock, searches nonces on a
//! blocking thread while polling the shared tip version, and commits under
//! the write lock only if the tip has not moved. The lock is never held
//! during the search or any network call.

use actix_web::web;
use log::{debug, error, info, warn};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;

use crate::api::AppState;
use crate::blockchain::Block;

/// Outcome of a single mining attempt.
pub enum MineOutcome {
    /// The block was mined, appended, and persisted.
    Mined(Block),
    /// Another block landed on the tip first; the payload is handed back so
    /// the caller can re-queue it.
    TipChanged(String),
}

/// Run one mining attempt for `data` against the current tip. Blocking;
/// callers dispatch this onto a blocking thread pool.
pub fn mine_once(state: &AppState, data: String) -> MineOutcome {
    let (index, prev_hash, difficulty, version) = {
        let ledger = state.ledger.read().expect("lock poisoned");
        let tip = ledger.chain.tip();
        (
            tip.index + 1,
            tip.hash.clone(),
            ledger.chain.difficulty,
            state.tip_version.load(Ordering::SeqCst),
        )
    };

    let mut block = Block::new(index, data, prev_hash);
    if !block.mine_cancelable(difficulty, &state.tip_version, version) {
        debug!("mining attempt for block {index} canceled, tip moved");
        return MineOutcome::TipChanged(block.data);
    }

    // The tip may still have moved between the last cancellation check and
    // here; the version is re-checked under the write lock.
    let snapshot = {
        let mut ledger = state.ledger.write().expect("lock poisoned");
        if state.tip_version.load(Ordering::SeqCst) != version {
            return MineOutcome::TipChanged(block.data);
        }
        if let Err(e) = ledger.chain.append(block.clone()) {
            warn!("discarding mined block {index}: {e}");
            return MineOutcome::TipChanged(block.data);
        }
        ledger.mempool.purge(&block.data);
        state.tip_version.fetch_add(1, Ordering::SeqCst);
        ledger.chain.chain.clone()
    };
    if let Err(e) = state.store.save(&snapshot) {
        warn!("failed to persist chain: {e}");
    }
    info!(
        "mined block {} (nonce {}, hash {})",
        block.index,
        block.nonce,
        &block.hash[..8]
    );
    MineOutcome::Mined(block)
}

/// Fan a locally mined block out to every cached peer. Failures are logged
/// and swallowed; the sync worker reconciles whatever the broadcast misses.
pub async fn broadcast_block(state: &AppState, block: &Block) {
    let peers = state.peers.read().expect("lock poisoned").clone();
    for peer in peers {
        match state.client.send_block(&peer, block).await {
            Ok(true) => debug!("{peer} accepted block {}", block.index),
            Ok(false) => debug!("{peer} declined block {}", block.index),
            Err(e) => warn!("broadcast to {peer} failed: {e}"),
        }
    }
}

/// Background auto-mining worker.
///
/// Pops the oldest pending payload and runs one attempt. A canceled attempt
/// re-queues its payload at the mempool front and restarts immediately
/// against the new tip; a successful one broadcasts the block, then waits
/// out the configured interval.
pub async fn auto_mine_worker(state: web::Data<AppState>, mut shutdown: watch::Receiver<bool>) {
    let idle = Duration::from_millis(500);
    loop {
        if *shutdown.borrow() {
            break;
        }
        if !state.auto_mine.load(Ordering::SeqCst) {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(idle) => {}
            }
            continue;
        }

        let payload = {
            let mut ledger = state.ledger.write().expect("lock poisoned");
            ledger.mempool.pop_front()
        };
        let Some(data) = payload else {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(idle) => {}
            }
            continue;
        };

        let worker_state = state.clone();
        let outcome = tokio::task::spawn_blocking(move || mine_once(&worker_state, data)).await;
        match outcome {
            Ok(MineOutcome::Mined(block)) => {
                broadcast_block(&state, &block).await;
                let interval =
                    Duration::from_secs(state.mine_interval.load(Ordering::SeqCst).max(1));
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            Ok(MineOutcome::TipChanged(data)) => {
                let mut ledger = state.ledger.write().expect("lock poisoned");
                ledger.mempool.requeue_front(data);
            }
            Err(e) => {
                error!("mining task failed: {e}");
            }
        }
    }
    debug!("auto-mining worker stopped");
}
