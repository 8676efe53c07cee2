use actix_web::{get, post, web, HttpResponse, Responder};
use log::{debug, info, warn};
use std::sync::atomic::Ordering;

use super::models::{
    AppState, ChainResponse, PeersResponse, ReceiveBlockRequest, ReceiveBlockResponse,
    StatusResponse,
};
use crate::blockchain::Block;
use crate::error::RejectReason;

/// Read-only snapshot of the full chain.
#[get("/get_chain")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let ledger = state.ledger.read().expect("lock poisoned");
    HttpResponse::Ok().json(ChainResponse {
        length: ledger.chain.len(),
        chain: &ledger.chain.chain,
    })
}

/// Accept a block gossiped by a peer if it extends the local tip.
///
/// Orphans and linkage mismatches additionally wake the sync worker: both
/// mean this node and the sender disagree about history, which only a
/// whole-chain comparison can settle. Accepted blocks are not re-broadcast.
#[post("/receive_block")]
pub async fn receive_block(
    state: web::Data<AppState>,
    body: web::Json<ReceiveBlockRequest>,
) -> impl Responder {
    let block = body.into_inner().block;
    let index = block.index;
    match apply_incoming_block(&state, block) {
        Ok(()) => {
            info!("accepted block {index} from peer");
            HttpResponse::Ok().json(ReceiveBlockResponse {
                accepted: true,
                reason: None,
            })
        }
        Err(reason) => {
            if matches!(reason, RejectReason::Orphan | RejectReason::LinkageMismatch) {
                state.sync_wakeup.notify_one();
            }
            debug!("rejected block {index}: {reason}");
            HttpResponse::Conflict().json(ReceiveBlockResponse {
                accepted: false,
                reason: Some(reason.to_string()),
            })
        }
    }
}

/// Diagnostic summary.
#[get("/status")]
pub async fn status(state: web::Data<AppState>) -> impl Responder {
    let (length, tip_hash, mempool_size) = {
        let ledger = state.ledger.read().expect("lock poisoned");
        (
            ledger.chain.len(),
            ledger.chain.tip().hash.clone(),
            ledger.mempool.len(),
        )
    };
    let peers = state.peers.read().expect("lock poisoned").len();
    HttpResponse::Ok().json(StatusResponse {
        length,
        tip_hash,
        mempool_size,
        auto_mine: state.auto_mine.load(Ordering::SeqCst),
        peers,
    })
}

/// This node's cached peer list.
#[get("/peers")]
pub async fn list_peers(state: web::Data<AppState>) -> impl Responder {
    let peers = state.peers.read().expect("lock poisoned").clone();
    HttpResponse::Ok().json(PeersResponse { peers })
}

/// Decide an incoming block's fate against the local tip.
///
/// Tip extensions are appended under the write lock, consume the first
/// matching mempool entry, bump the tip version (canceling any in-flight
/// mining attempt), and are persisted after the lock is released. Every
/// rejection leaves state untouched.
pub fn apply_incoming_block(state: &AppState, block: Block) -> Result<(), RejectReason> {
    let snapshot = {
        let mut ledger = state.ledger.write().expect("lock poisoned");
        let tip = ledger.chain.tip();
        if block.index <= tip.index {
            return Err(RejectReason::Stale);
        }
        if block.index > tip.index + 1 {
            return Err(RejectReason::Orphan);
        }
        if block.prev_hash != tip.hash {
            return Err(RejectReason::LinkageMismatch);
        }
        let data = block.data.clone();
        if let Err(e) = ledger.chain.append(block) {
            return Err(RejectReason::Invalid(e));
        }
        ledger.mempool.purge(&data);
        state.tip_version.fetch_add(1, Ordering::SeqCst);
        ledger.chain.chain.clone()
    };
    if let Err(e) = state.store.save(&snapshot) {
        warn!("failed to persist chain: {e}");
    }
    Ok(())
}
