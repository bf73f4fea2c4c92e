use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::i18n::Lang;

/// A member's verification, keyed by (guild_id, user_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationRecord {
    pub guild_id: u64,
    pub user_id: u64,
    /// Username reported by the login API
    pub username: String,
    pub verified_at: DateTime<Utc>,
}

/// Persistence contract shared by every backend.
///
/// Each call is one unit of work against the backend. Writes are single
/// statements inside their own transaction, so concurrent calls for the same
/// key never produce duplicate rows.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Create tables if they do not exist. Safe to call repeatedly.
    async fn init(&self) -> Result<()>;

    async fn is_verified(&self, guild_id: u64, user_id: u64) -> Result<bool>;

    /// Insert or overwrite the record, stamping `verified_at` with now
    async fn mark_verified(&self, guild_id: u64, user_id: u64, username: &str) -> Result<()>;

    /// Delete the record. Returns whether a row was removed.
    async fn revoke_verified(&self, guild_id: u64, user_id: u64) -> Result<bool>;

    async fn get_user_info(&self, guild_id: u64, user_id: u64)
        -> Result<Option<VerificationRecord>>;

    async fn get_verified_users(&self, guild_id: u64) -> Result<BTreeMap<u64, VerificationRecord>>;

    async fn set_lang(&self, guild_id: u64, user_id: u64, lang: Lang) -> Result<()>;

    /// Stored language, or the default when unset or unreadable
    async fn get_lang(&self, guild_id: u64, user_id: u64) -> Result<Lang>;
}

/// Shared storage handle passed to managers and commands
pub type SharedStore = Arc<dyn VerificationStore>;

/// Open the configured backend and make sure its schema exists
pub async fn open_store(config: &StorageConfig) -> Result<SharedStore> {
    let store: SharedStore = match config {
        StorageConfig::Sqlite { path } => Arc::new(super::SqliteStore::open(path).await?),
        StorageConfig::MySql(settings) => Arc::new(super::MySqlStore::connect(settings).await?),
    };
    store.init().await?;
    info!("Storage ready ({})", store.backend_name());
    Ok(store)
}

// Discord snowflakes fit in 63 bits, so the signed column type is lossless.
pub(crate) fn to_db_id(id: u64) -> i64 {
    id as i64
}

pub(crate) fn from_db_id(id: i64) -> u64 {
    id as u64
}

pub(crate) fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

pub(crate) fn parse_lang(raw: Option<String>) -> Lang {
    raw.and_then(|s| s.parse().ok()).unwrap_or_default()
}
