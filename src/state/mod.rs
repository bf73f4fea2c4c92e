pub mod legacy;
#[cfg(test)]
pub mod memory_store;
pub mod mysql_store;
pub mod sqlite_store;
pub mod store;

pub use legacy::{import_legacy, ImportSummary};
#[cfg(test)]
pub use memory_store::MemoryStore;
pub use mysql_store::MySqlStore;
pub use sqlite_store::SqliteStore;
pub use store::{open_store, SharedStore, VerificationRecord, VerificationStore};

/// Behaviour every backend must share, run from each backend's tests
#[cfg(test)]
pub(crate) mod contract {
    use super::VerificationStore;
    use crate::i18n::Lang;
    use std::sync::Arc;

    pub async fn run_all(store: &dyn VerificationStore) {
        init_is_idempotent(store).await;
        mark_then_revoke(store).await;
        upsert_keeps_single_row(store).await;
        keys_are_isolated(store).await;
        lang_defaults_and_overwrites(store).await;
    }

    async fn init_is_idempotent(store: &dyn VerificationStore) {
        store.init().await.unwrap();
        store.init().await.unwrap();
    }

    async fn mark_then_revoke(store: &dyn VerificationStore) {
        let (g, u) = (100, 1);
        assert!(!store.is_verified(g, u).await.unwrap());
        assert!(store.get_user_info(g, u).await.unwrap().is_none());

        store.mark_verified(g, u, "alice").await.unwrap();
        assert!(store.is_verified(g, u).await.unwrap());
        let record = store.get_user_info(g, u).await.unwrap().unwrap();
        assert_eq!(record.guild_id, g);
        assert_eq!(record.user_id, u);
        assert_eq!(record.username, "alice");

        assert!(store.revoke_verified(g, u).await.unwrap());
        assert!(!store.is_verified(g, u).await.unwrap());
        // Second revoke finds nothing but does not fail
        assert!(!store.revoke_verified(g, u).await.unwrap());
    }

    async fn upsert_keeps_single_row(store: &dyn VerificationStore) {
        let (g, u) = (200, 7);
        store.mark_verified(g, u, "alice").await.unwrap();
        store.mark_verified(g, u, "bob").await.unwrap();

        let users = store.get_verified_users(g).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[&u].username, "bob");
    }

    async fn keys_are_isolated(store: &dyn VerificationStore) {
        store.mark_verified(300, 1, "one").await.unwrap();
        store.mark_verified(300, 2, "two").await.unwrap();
        store.mark_verified(301, 1, "other-guild").await.unwrap();

        let users = store.get_verified_users(300).await.unwrap();
        assert_eq!(users.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(users[&1].username, "one");

        assert!(store.revoke_verified(300, 1).await.unwrap());
        assert!(store.is_verified(301, 1).await.unwrap());
        assert!(store.is_verified(300, 2).await.unwrap());
        assert!(store.get_verified_users(999).await.unwrap().is_empty());
    }

    async fn lang_defaults_and_overwrites(store: &dyn VerificationStore) {
        let (g, u) = (400, 1);
        assert_eq!(store.get_lang(g, u).await.unwrap(), Lang::Zh);

        store.set_lang(g, u, Lang::En).await.unwrap();
        assert_eq!(store.get_lang(g, u).await.unwrap(), Lang::En);

        store.set_lang(g, u, Lang::Zh).await.unwrap();
        assert_eq!(store.get_lang(g, u).await.unwrap(), Lang::Zh);

        // Preferences are per guild
        assert_eq!(store.get_lang(g + 1, u).await.unwrap(), Lang::Zh);
    }

    /// Key and timestamp of the stale row backends seed before
    /// [`reverify_refreshes_timestamp`]
    pub const STALE_GUILD: u64 = 600;
    pub const STALE_USER: u64 = 2;
    pub const STALE_SECS: i64 = 5;

    /// Re-verifying a seeded stale row replaces username and `verified_at`
    pub async fn reverify_refreshes_timestamp(store: &dyn VerificationStore) {
        let (g, u) = (STALE_GUILD, STALE_USER);
        let stale = store.get_user_info(g, u).await.unwrap().unwrap();
        assert_eq!(stale.username, "old");
        assert_eq!(stale.verified_at.timestamp(), STALE_SECS);

        store.mark_verified(g, u, "new").await.unwrap();
        let first = store.get_user_info(g, u).await.unwrap().unwrap();
        assert_eq!(first.username, "new");
        assert!(first.verified_at > stale.verified_at);

        store.mark_verified(g, u, "newer").await.unwrap();
        let second = store.get_user_info(g, u).await.unwrap().unwrap();
        assert_eq!(second.username, "newer");
        assert!(second.verified_at >= first.verified_at);
        assert_eq!(store.get_verified_users(g).await.unwrap().len(), 1);
    }

    /// Racing upserts on one key leave exactly one record
    pub async fn concurrent_same_key<S>(store: Arc<S>)
    where
        S: VerificationStore + 'static,
    {
        let (g, u) = (500, 42);
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = store.clone();
                let name = if i % 2 == 0 { "alice" } else { "bob" };
                tokio::spawn(async move { store.mark_verified(g, u, name).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        let users = store.get_verified_users(g).await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(["alice", "bob"].contains(&users[&u].username.as_str()));
    }
}
