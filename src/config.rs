use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db: DbConfig,
}

/// Parses `key` when set; a present but malformed value is an error.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .parse::<T>()
            .with_context(|| format!("invalid {key} {v:?}")),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let db = DbConfig {
            url,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            acquire_timeout_secs: parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 5)?,
        };
        Ok(Self {
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "APP_PORT", 8080)?,
            db,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
