use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::store::{
    from_db_id, parse_lang, timestamp_to_datetime, to_db_id, VerificationRecord,
    VerificationStore,
};
use crate::error::{BotError, Result};
use crate::i18n::Lang;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS verified_users (
        guild_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        username TEXT NOT NULL,
        verified_at INTEGER NOT NULL,
        PRIMARY KEY (guild_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS user_prefs (
        guild_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        lang TEXT NOT NULL,
        PRIMARY KEY (guild_id, user_id)
    )",
];

/// Embedded single-file backend
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BotError::StoragePath {
                    path: parent.display().to_string(),
                    source: e,
                })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("Opened SQLite database at {}", path.display());
        Ok(Self { pool })
    }

    /// Private in-memory database on a single connection
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl VerificationStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn init(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        debug!("SQLite schema ensured");
        Ok(())
    }

    async fn is_verified(&self, guild_id: u64, user_id: u64) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM verified_users WHERE guild_id = ? AND user_id = ?")
                .bind(to_db_id(guild_id))
                .bind(to_db_id(user_id))
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn mark_verified(&self, guild_id: u64, user_id: u64, username: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO verified_users (guild_id, user_id, username, verified_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(guild_id, user_id) DO UPDATE SET \
             username = excluded.username, verified_at = excluded.verified_at",
        )
        .bind(to_db_id(guild_id))
        .bind(to_db_id(user_id))
        .bind(username)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn revoke_verified(&self, guild_id: u64, user_id: u64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM verified_users WHERE guild_id = ? AND user_id = ?")
            .bind(to_db_id(guild_id))
            .bind(to_db_id(user_id))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user_info(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<VerificationRecord>> {
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT username, verified_at FROM verified_users WHERE guild_id = ? AND user_id = ?",
        )
        .bind(to_db_id(guild_id))
        .bind(to_db_id(user_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(username, verified_at)| VerificationRecord {
            guild_id,
            user_id,
            username,
            verified_at: timestamp_to_datetime(verified_at),
        }))
    }

    async fn get_verified_users(&self, guild_id: u64) -> Result<BTreeMap<u64, VerificationRecord>> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT user_id, username, verified_at FROM verified_users WHERE guild_id = ?",
        )
        .bind(to_db_id(guild_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, username, verified_at)| {
                let user_id = from_db_id(user_id);
                (
                    user_id,
                    VerificationRecord {
                        guild_id,
                        user_id,
                        username,
                        verified_at: timestamp_to_datetime(verified_at),
                    },
                )
            })
            .collect())
    }

    async fn set_lang(&self, guild_id: u64, user_id: u64, lang: Lang) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO user_prefs (guild_id, user_id, lang) VALUES (?, ?, ?) \
             ON CONFLICT(guild_id, user_id) DO UPDATE SET lang = excluded.lang",
        )
        .bind(to_db_id(guild_id))
        .bind(to_db_id(user_id))
        .bind(lang.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_lang(&self, guild_id: u64, user_id: u64) -> Result<Lang> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT lang FROM user_prefs WHERE guild_id = ? AND user_id = ?")
                .bind(to_db_id(guild_id))
                .bind(to_db_id(user_id))
                .fetch_optional(&self.pool)
                .await?;
        Ok(parse_lang(row.map(|(lang,)| lang)))
    }
}
