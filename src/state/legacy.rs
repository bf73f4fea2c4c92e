//! One-shot import of the old JSON data file into a store.
//!
//! Layout:
//! `{"guilds": {"<gid>": {"verified": {"<uid>": {"username": "..."}}, "lang": {"<uid>": "zh"}}}}`

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::store::VerificationStore;
use crate::error::{BotError, Result};
use crate::i18n::Lang;

const FALLBACK_USERNAME: &str = "user";

#[derive(Debug, Default, Deserialize)]
struct LegacyFile {
    #[serde(default)]
    guilds: HashMap<String, LegacyGuild>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyGuild {
    #[serde(default)]
    verified: HashMap<String, Value>,
    #[serde(default)]
    lang: HashMap<String, String>,
}

/// Counts from an import run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub guilds: usize,
    pub verified: usize,
    pub langs: usize,
    pub skipped: usize,
}

pub async fn import_legacy(path: &Path, store: &dyn VerificationStore) -> Result<ImportSummary> {
    let display = path.display().to_string();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BotError::LegacyLoad {
            path: display.clone(),
            source: e,
        })?;
    let file: LegacyFile = serde_json::from_str(&raw).map_err(|e| BotError::LegacyParse {
        path: display.clone(),
        source: e,
    })?;

    let mut summary = ImportSummary::default();

    for (guild_key, guild) in &file.guilds {
        let Ok(guild_id) = guild_key.parse::<u64>() else {
            warn!("Skipping legacy guild with invalid id {:?}", guild_key);
            summary.skipped += guild.verified.len() + guild.lang.len();
            continue;
        };
        summary.guilds += 1;

        for (user_key, entry) in &guild.verified {
            let Ok(user_id) = user_key.parse::<u64>() else {
                warn!("Skipping legacy user with invalid id {:?}", user_key);
                summary.skipped += 1;
                continue;
            };
            let username = entry
                .get("username")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .unwrap_or(FALLBACK_USERNAME);
            store.mark_verified(guild_id, user_id, username).await?;
            summary.verified += 1;
        }

        for (user_key, lang) in &guild.lang {
            let (Ok(user_id), Ok(lang)) = (user_key.parse::<u64>(), lang.parse::<Lang>()) else {
                warn!("Skipping legacy language entry {:?} => {:?}", user_key, lang);
                summary.skipped += 1;
                continue;
            };
            store.set_lang(guild_id, user_id, lang).await?;
            summary.langs += 1;
        }
    }

    info!(
        "Imported {} verified users and {} language preferences from {} guilds in {} ({} skipped)",
        summary.verified, summary.langs, summary.guilds, path.display(), summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;
    use std::io::Write;

    #[tokio::test]
    async fn test_import_legacy_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "guilds": {{
                    "10": {{
                        "verified": {{
                            "1": {{"username": "alice"}},
                            "2": {{}},
                            "oops": {{"username": "bad"}}
                        }},
                        "lang": {{"1": "en", "2": "zh", "3": "fr"}}
                    }},
                    "20": {{"verified": {{"1": {{"username": "carol"}}}}}}
                }}
            }}"#
        )
        .unwrap();

        let store = MemoryStore::new();
        let summary = import_legacy(file.path(), &store).await.unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                guilds: 2,
                verified: 3,
                langs: 2,
                skipped: 2,
            }
        );
        assert_eq!(store.get_user_info(10, 1).await.unwrap().unwrap().username, "alice");
        assert_eq!(store.get_user_info(10, 2).await.unwrap().unwrap().username, "user");
        assert_eq!(store.get_user_info(20, 1).await.unwrap().unwrap().username, "carol");
        assert_eq!(store.get_lang(10, 1).await.unwrap(), Lang::En);
        assert_eq!(store.get_lang(10, 3).await.unwrap(), Lang::Zh);
    }

    #[tokio::test]
    async fn test_import_missing_and_malformed() {
        let store = MemoryStore::new();
        let err = import_legacy(Path::new("/nonexistent/authbot.json"), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::LegacyLoad { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = import_legacy(file.path(), &store).await.unwrap_err();
        assert!(matches!(err, BotError::LegacyParse { .. }));
    }

    #[tokio::test]
    async fn test_import_empty_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        let store = MemoryStore::new();
        let summary = import_legacy(file.path(), &store).await.unwrap();
        assert_eq!(summary, ImportSummary::default());
    }
}
