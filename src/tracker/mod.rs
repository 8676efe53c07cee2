//! Tracker: a stateless HTTP directory of live node endpoints.
//!
//! Nodes register on startup and heartbeat periodically; entries silent for
//! longer than the liveness TTL are purged whenever the directory is read.
//! The tracker holds no chain state and never initiates connections.

use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default liveness TTL for directory entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Live node directory: address -> last heartbeat.
pub struct Directory {
    entries: HashMap<String, Instant>,
    ttl: Duration,
}

impl Directory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Insert or refresh an entry. Idempotent. Returns the live peer list
    /// excluding `address`.
    pub fn register(&mut self, address: &str) -> Vec<String> {
        self.entries.insert(address.to_string(), Instant::now());
        self.purge_expired();
        self.peers_excluding(Some(address))
    }

    /// Remove an entry. Returns the remaining live peer list.
    pub fn unregister(&mut self, address: &str) -> Vec<String> {
        self.entries.remove(address);
        self.purge_expired();
        self.peers_excluding(Some(address))
    }

    /// The live peer list; expired entries are dropped on the way.
    pub fn peers(&mut self) -> Vec<String> {
        self.purge_expired();
        self.peers_excluding(None)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|address, last_seen| {
            let live = last_seen.elapsed() <= ttl;
            if !live {
                debug!("purging silent node {address}");
            }
            live
        });
    }

    fn peers_excluding(&self, skip: Option<&str>) -> Vec<String> {
        let mut peers: Vec<String> = self
            .entries
            .keys()
            .filter(|address| Some(address.as_str()) != skip)
            .cloned()
            .collect();
        peers.sort();
        peers
    }
}

pub struct TrackerState {
    pub directory: Mutex<Directory>,
}

#[derive(Deserialize)]
struct AddressRequest {
    address: String,
}

#[derive(Serialize)]
struct PeersResponse {
    peers: Vec<String>,
}

#[post("/register")]
async fn register(
    state: web::Data<TrackerState>,
    body: web::Json<AddressRequest>,
) -> impl Responder {
    let address = body.address.trim();
    if address.is_empty() {
        return HttpResponse::BadRequest().body("address required");
    }
    let peers = state
        .directory
        .lock()
        .expect("lock poisoned")
        .register(address);
    info!("registered {address} ({} other peers live)", peers.len());
    HttpResponse::Ok().json(PeersResponse { peers })
}

/// Same semantics as `register`; distinguished only for clarity. An unknown
/// address is simply registered.
#[post("/heartbeat")]
async fn heartbeat(
    state: web::Data<TrackerState>,
    body: web::Json<AddressRequest>,
) -> impl Responder {
    let address = body.address.trim();
    if address.is_empty() {
        return HttpResponse::BadRequest().body("address required");
    }
    let peers = state
        .directory
        .lock()
        .expect("lock poisoned")
        .register(address);
    debug!("heartbeat from {address}");
    HttpResponse::Ok().json(PeersResponse { peers })
}

#[get("/peers")]
async fn list_peers(state: web::Data<TrackerState>) -> impl Responder {
    let peers = state.directory.lock().expect("lock poisoned").peers();
    HttpResponse::Ok().json(PeersResponse { peers })
}

#[post("/unregister")]
async fn unregister(
    state: web::Data<TrackerState>,
    body: web::Json<AddressRequest>,
) -> impl Responder {
    let address = body.address.trim();
    if address.is_empty() {
        return HttpResponse::BadRequest().body("address required");
    }
    let peers = state
        .directory
        .lock()
        .expect("lock poisoned")
        .unregister(address);
    info!("unregistered {address}");
    HttpResponse::Ok().json(PeersResponse { peers })
}

/// Run the tracker to completion.
pub async fn run(host: &str, port: u16, ttl: Duration) -> std::io::Result<()> {
    let state = web::Data::new(TrackerState {
        directory: Mutex::new(Directory::new(ttl)),
    });
    info!("tracker listening on {host}:{port} (ttl {}s)", ttl.as_secs());
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(register)
            .service(heartbeat)
            .service(list_peers)
            .service(unregister)
    })
    .bind((host, port))?
    .run()
    .await
}
