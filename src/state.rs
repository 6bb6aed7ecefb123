use std::sync::Arc;

use anyhow::Context;

use crate::config::AppConfig;
use crate::db::{self, Gateway};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Gateway>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let db = db::connect(&config.db)
            .await
            .context("connect to database")?;
        Ok(Self::from_parts(db))
    }

    pub fn from_parts(db: Arc<dyn Gateway>) -> Self {
        Self { db }
    }

    #[cfg(test)]
    pub fn fake(gateway: crate::db::MemoryGateway) -> Self {
        Self::from_parts(Arc::new(gateway))
    }
}
