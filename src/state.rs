use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    config::Config,
    services::{recommender::Recommender, storage::FileStorage},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub recommender: Arc<dyn Recommender>,
    pub storage: Arc<dyn FileStorage>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        recommender: Arc<dyn Recommender>,
        storage: Arc<dyn FileStorage>,
        config: Config,
    ) -> Self {
        Self {
            db,
            recommender,
            storage,
            config: Arc::new(config),
        }
    }
}
