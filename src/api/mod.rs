pub mod chain;
pub mod mining;
pub mod models;
mod tx;

use actix_web::web::ServiceConfig;

pub use models::{AppState, Ledger};

/// Register the node's HTTP surface.
pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(chain::get_chain)
        .service(chain::receive_block)
        .service(chain::status)
        .service(chain::list_peers)
        .service(mining::mine)
        .service(mining::auto_mine)
        .service(tx::add_transaction);
}
