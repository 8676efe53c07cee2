use actix_web::{post, web, HttpResponse, Responder};
use log::{error, info};
use std::sync::atomic::Ordering;

use super::models::{
    AppState, AutoMineRequest, AutoMineResponse, MineErrorResponse, MineRequest, MineResponse,
};
use crate::node::miner::{self, MineOutcome};

/// Mine one block with the supplied payload. Blocks until the search
/// finishes; conflicts (another block landing on the tip first) are reported
/// instead of retried.
#[post("/mine")]
pub async fn mine(state: web::Data<AppState>, body: web::Json<MineRequest>) -> impl Responder {
    let data = body.into_inner().data;
    let worker_state = state.clone();
    let outcome = web::block(move || miner::mine_once(&worker_state, data)).await;
    match outcome {
        Ok(MineOutcome::Mined(block)) => {
            miner::broadcast_block(&state, &block).await;
            HttpResponse::Ok().json(MineResponse { block })
        }
        Ok(MineOutcome::TipChanged(_)) => HttpResponse::Conflict().json(MineErrorResponse {
            error: "tip changed during mining".to_string(),
        }),
        Err(e) => {
            error!("mining task failed: {e}");
            HttpResponse::Conflict().json(MineErrorResponse {
                error: "mining task failed".to_string(),
            })
        }
    }
}

/// Toggle background mining and optionally adjust its interval.
#[post("/auto_mine")]
pub async fn auto_mine(
    state: web::Data<AppState>,
    body: web::Json<AutoMineRequest>,
) -> impl Responder {
    let req = body.into_inner();
    if let Some(interval) = req.interval {
        state.mine_interval.store(interval, Ordering::SeqCst);
    }
    state.auto_mine.store(req.enable, Ordering::SeqCst);
    let interval = state.mine_interval.load(Ordering::SeqCst);
    info!(
        "auto-mining {} (interval {interval}s)",
        if req.enable { "enabled" } else { "disabled" }
    );
    HttpResponse::Ok().json(AutoMineResponse {
        auto_mine: req.enable,
        interval,
    })
}
