pub mod config;
pub mod crud;
pub mod engine;
pub mod error;
pub mod handler;
pub mod matchmaking;
pub mod memory;
pub mod model;
pub mod punishment;
pub mod route;
pub mod rules;
pub mod schema;
pub mod service;
pub mod store;

use std::sync::{atomic::AtomicUsize, Arc};

use service::GameService;

pub struct AppState {
    pub service: GameService,
    pub connection_count: AtomicUsize,
}

impl AppState {
    pub fn new(service: GameService) -> Arc<Self> {
        Arc::new(Self {
            service,
            connection_count: AtomicUsize::new(0),
        })
    }
}
