//! In-memory backend used as the fake store in tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::store::{VerificationRecord, VerificationStore};
use crate::error::{BotError, Result};
use crate::i18n::Lang;

#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<(u64, u64), VerificationRecord>,
    langs: DashMap<(u64, u64), Lang>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write return a storage error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store `record` as is, keeping its timestamp
    pub fn insert_record(&self, record: VerificationRecord) {
        self.records
            .insert((record.guild_id, record.user_id), record);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BotError::Internal {
                message: "simulated storage failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VerificationStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn is_verified(&self, guild_id: u64, user_id: u64) -> Result<bool> {
        Ok(self.records.contains_key(&(guild_id, user_id)))
    }

    async fn mark_verified(&self, guild_id: u64, user_id: u64, username: &str) -> Result<()> {
        self.check_writable()?;
        self.records.insert(
            (guild_id, user_id),
            VerificationRecord {
                guild_id,
                user_id,
                username: username.to_string(),
                verified_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn revoke_verified(&self, guild_id: u64, user_id: u64) -> Result<bool> {
        self.check_writable()?;
        Ok(self.records.remove(&(guild_id, user_id)).is_some())
    }

    async fn get_user_info(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<VerificationRecord>> {
        Ok(self
            .records
            .get(&(guild_id, user_id))
            .map(|entry| entry.value().clone()))
    }

    async fn get_verified_users(&self, guild_id: u64) -> Result<BTreeMap<u64, VerificationRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.key().0 == guild_id)
            .map(|entry| (entry.key().1, entry.value().clone()))
            .collect())
    }

    async fn set_lang(&self, guild_id: u64, user_id: u64, lang: Lang) -> Result<()> {
        self.check_writable()?;
        self.langs.insert((guild_id, user_id), lang);
        Ok(())
    }

    async fn get_lang(&self, guild_id: u64, user_id: u64) -> Result<Lang> {
        Ok(self
            .langs
            .get(&(guild_id, user_id))
            .map(|entry| *entry.value())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::contract;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_memory_contract() {
        let store = MemoryStore::new();
        contract::run_all(&store).await;
        contract::concurrent_same_key(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn test_memory_reverify_refreshes_timestamp() {
        let store = MemoryStore::new();
        store.insert_record(VerificationRecord {
            guild_id: contract::STALE_GUILD,
            user_id: contract::STALE_USER,
            username: "old".to_string(),
            verified_at: crate::state::store::timestamp_to_datetime(contract::STALE_SECS),
        });
        contract::reverify_refreshes_timestamp(&store).await;
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert!(store.mark_verified(1, 1, "x").await.is_err());
        assert!(!store.is_verified(1, 1).await.unwrap());

        store.fail_writes(false);
        store.mark_verified(1, 1, "x").await.unwrap();
        assert!(store.is_verified(1, 1).await.unwrap());
    }
}
