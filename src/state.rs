use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        Self { db, config }
    }
}
