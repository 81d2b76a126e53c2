pub mod access;
pub mod api;
pub mod config;
pub mod db;

pub use db::DbPool;

use config::Config;
use std::time::Instant;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        Self {
            config,
            db,
            started_at: Instant::now(),
        }
    }
}
