use std::time::Duration;

use axum::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tracing::{debug, info};

use super::{Gateway, Session, StoreError};
use crate::config::DbConfig;

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
"#;

#[derive(Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    fn options(config: &DbConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
    }

    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        let pool = Self::options(config)
            .connect(&config.url)
            .await
            .map_err(StoreError::Unavailable)?;
        Ok(Self { pool })
    }

    /// Builds the pool without opening a connection; failures show up on
    /// the first acquire.
    pub fn lazy(config: &DbConfig) -> Result<Self, StoreError> {
        let pool = Self::options(config)
            .connect_lazy(&config.url)
            .map_err(StoreError::Unavailable)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Gateway for PgGateway {
    async fn acquire_session(&self) -> Result<Session, StoreError> {
        let tx = self.pool.begin().await?;
        debug!("session opened");
        Ok(Box::new(PgSession {
            pool: self.pool.clone(),
            tx: Some(tx),
        }))
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_USERS).execute(&self.pool).await?;
        info!("users table ready");
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// An open transaction leased from the pool. Dropping an uncommitted
/// transaction rolls it back and hands the connection back to the pool.
pub struct PgSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    /// The current transaction, starting a fresh one if the previous was
    /// committed.
    pub(crate) async fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        Ok(self.tx.insert(tx))
    }

    pub(crate) async fn commit(&mut self) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        debug!(pending = self.tx.is_some(), "session released");
    }
}
