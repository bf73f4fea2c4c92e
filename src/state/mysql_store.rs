use async_trait::async_trait;
use chrono::Utc;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use super::store::{
    from_db_id, parse_lang, timestamp_to_datetime, to_db_id, VerificationRecord,
    VerificationStore,
};
use crate::config::MySqlSettings;
use crate::error::Result;
use crate::i18n::Lang;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS verified_users (
        guild_id BIGINT NOT NULL,
        user_id BIGINT NOT NULL,
        username VARCHAR(255) NOT NULL,
        verified_at BIGINT NOT NULL,
        PRIMARY KEY (guild_id, user_id)
    ) CHARACTER SET utf8mb4",
    "CREATE TABLE IF NOT EXISTS user_prefs (
        guild_id BIGINT NOT NULL,
        user_id BIGINT NOT NULL,
        lang VARCHAR(8) NOT NULL,
        PRIMARY KEY (guild_id, user_id)
    ) CHARACTER SET utf8mb4",
];

/// Networked relational backend
///
/// Upserts use the `AS new` row alias, so the server must be MySQL 8.0.19 or newer.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(settings: &MySqlSettings) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.database)
            .charset("utf8mb4");

        let pool = Self::pool_options().connect_with(options).await?;

        info!(
            "Connected to MySQL at {}:{}/{}",
            settings.host, settings.port, settings.database
        );
        Ok(Self { pool })
    }

    /// Connect with a `mysql://` URL
    #[cfg(test)]
    pub async fn connect_url(url: &str) -> Result<Self> {
        let pool = Self::pool_options().connect(url).await?;
        Ok(Self { pool })
    }

    fn pool_options() -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
    }
}

#[async_trait]
impl VerificationStore for MySqlStore {
    fn backend_name(&self) -> &'static str {
        "mysql"
    }

    async fn init(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        debug!("MySQL schema ensured");
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
             AS new ON DUPLICATE KEY UPDATE username = new.username, verified_at = new.verified_at",
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
                let record = VerificationRecord {
                    guild_id,
                    user_id,
                    username,
                    verified_at: timestamp_to_datetime(verified_at),
                };
                (user_id, record)
            })
            .collect())
    }

    async fn set_lang(&self, guild_id: u64, user_id: u64, lang: Lang) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO user_prefs (guild_id, user_id, lang) VALUES (?, ?, ?) AS new \
             ON DUPLICATE KEY UPDATE lang = new.lang",
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
