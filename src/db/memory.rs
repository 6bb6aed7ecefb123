use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::async_trait;
use tracing::debug;

use super::{Gateway, Session, StoreError};
use crate::users::repo::UserStore;
use crate::users::repo_types::{NewUser, User};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    last_id: i64,
    #[cfg(test)]
    miss_email_lookups: bool,
}

/// Process-local store. Rows live as long as the gateway; ids start at 1.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    tables: Arc<Mutex<Tables>>,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryGateway {
    #[cfg(test)]
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Makes `find_by_email` report no match, so only the insert sees the
    /// existing row.
    #[cfg(test)]
    pub fn miss_email_lookups(&self) {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .miss_email_lookups = true;
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn acquire_session(&self) -> Result<Session, StoreError> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            tables: Arc::clone(&self.tables),
            open_sessions: Arc::clone(&self.open_sessions),
        }))
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) {
        debug!(
            open_sessions = self.open_sessions.load(Ordering::SeqCst),
            "memory store closed"
        );
    }
}

pub struct MemorySession {
    tables: Arc<Mutex<Tables>>,
    open_sessions: Arc<AtomicUsize>,
}

impl MemorySession {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let remaining = self.open_sessions.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(remaining, "session released");
    }
}

#[async_trait]
impl UserStore for MemorySession {
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables();
        #[cfg(test)]
        if tables.miss_email_lookups {
            return Ok(None);
        }
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<User>, StoreError> {
        let skip = usize::try_from(skip).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);
        // rows are appended with increasing ids, so insertion order is id order
        Ok(self
            .tables()
            .users
            .iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert(&mut self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        tables.last_id += 1;
        let row = User {
            id: tables.last_id,
            email: user.email,
            hashed_password: user.hashed_password,
            is_active: user.is_active,
        };
        tables.users.push(row.clone());
        Ok(row)
    }
}
