use actix_web::{post, web, HttpResponse, Responder};
use log::debug;

use super::models::{AddTransactionRequest, AddTransactionResponse, AppState};

/// Queue an opaque payload for a future block.
#[post("/add_transaction")]
pub async fn add_transaction(
    state: web::Data<AppState>,
    body: web::Json<AddTransactionRequest>,
) -> impl Responder {
    let data = body.into_inner().data;
    let pool_size = {
        let mut ledger = state.ledger.write().expect("lock poisoned");
        ledger.mempool.push(data);
        ledger.mempool.len()
    };
    debug!("queued payload ({pool_size} pending)");
    HttpResponse::Ok().json(AddTransactionResponse {
        accepted: true,
        pool_size,
    })
}
