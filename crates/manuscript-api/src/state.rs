//! Shared application state handed to every route handler.

use manuscript_infra::database::DatabaseManager;
use manuscript_infra::repository::SqliteRepository;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<SqliteRepository>,
}

impl AppState {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { repo: Arc::new(SqliteRepository::new(db)) }
    }
}
