//! Persistence gateway: a long-lived pool plus one leased session per request.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use thiserror::Error;
use tracing::info;

use crate::config::DbConfig;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::UserStore;

pub mod memory;
pub mod postgres;

pub use memory::MemoryGateway;
pub use postgres::PgGateway;

pub const MEMORY_URL: &str = "memory://";

/// A unit of work against the store. Dropping it releases every resource it
/// holds; uncommitted work is rolled back.
pub type Session = Box<dyn UserStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database unavailable")]
    Unavailable(#[source] sqlx::Error),
    #[error("unique constraint violated")]
    Duplicate,
    #[error("query failed")]
    Query(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate,
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(e),
            other => StoreError::Query(other),
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn acquire_session(&self) -> Result<Session, StoreError>;
    async fn create_schema(&self) -> Result<(), StoreError>;
    async fn close(&self);
}

/// Picks a gateway from the connection URL. `memory://` keeps everything in
/// process; anything else is handed to the Postgres pool.
pub async fn connect(config: &DbConfig) -> Result<Arc<dyn Gateway>, StoreError> {
    if config.url.starts_with(MEMORY_URL) {
        info!("using in-memory store");
        return Ok(Arc::new(MemoryGateway::default()));
    }
    let gateway = PgGateway::connect(config).await?;
    info!(max_connections = config.max_connections, "database pool ready");
    Ok(Arc::new(gateway))
}

/// Request-scoped session. Acquired before the handler body runs and dropped
/// when the handler returns, fails or is cancelled.
pub struct DbSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for DbSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = state.db.acquire_session().await?;
        Ok(Self(session))
    }
}

impl Deref for DbSession {
    type Target = dyn UserStore;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl DerefMut for DbSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}
