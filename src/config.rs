//! Environment-driven configuration.
//!
//! Values come from the process environment (after `.env` is loaded in
//! `main`). `LOG_LEVEL` is read by `main` before this runs so that parse
//! warnings are visible. Parsing goes through a lookup closure so it can be
//! exercised without touching the real environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BotError, Result};

/// Settings for the verification flow itself
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Role granted after a successful login
    pub success_role: String,
    /// Role handed back on revoke, if it exists in the guild
    pub unverified_role: String,
    /// Name of the text channel used for logins
    pub channel_name: String,
    /// Hide every other channel from @everyone during setup
    pub hide_other_channels: bool,
    /// Only accept /auth login inside `channel_name`
    pub login_channel_only: bool,
    /// External login API base URL
    pub api_base: Option<String>,
    pub api_timeout: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            success_role: "Verified".to_string(),
            unverified_role: "Unverified".to_string(),
            channel_name: "auth-verify".to_string(),
            hide_other_channels: true,
            login_channel_only: true,
            api_base: None,
            api_timeout: Duration::from_secs(10),
        }
    }
}

/// Connection parameters for the networked engine
#[derive(Debug, Clone, PartialEq)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Which storage backend to open
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    Sqlite { path: PathBuf },
    MySql(MySqlSettings),
}

/// Complete bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    /// Register commands in this guild only
    pub guild_id: Option<u64>,
    pub auth: AuthSettings,
    pub storage: StorageConfig,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or_else(|| BotError::ConfigMissing {
            name: "DISCORD_TOKEN".to_string(),
        })?;

        let guild_id = match get("GUILD_ID") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!("Environment var GUILD_ID is not an integer: {}", raw);
                    None
                }
            },
            None => None,
        };

        let defaults = AuthSettings::default();
        let auth = AuthSettings {
            success_role: get("AUTH_SUCCESS_ROLE").unwrap_or(defaults.success_role),
            unverified_role: get("AUTH_UNVERIFIED_ROLE").unwrap_or(defaults.unverified_role),
            channel_name: get("AUTH_CHANNEL_NAME").unwrap_or(defaults.channel_name),
            hide_other_channels: truthy(
                get("AUTH_HIDE_OTHER_CHANNELS").as_deref(),
                defaults.hide_other_channels,
            ),
            login_channel_only: truthy(
                get("AUTH_LOGIN_CHANNEL_ONLY").as_deref(),
                defaults.login_channel_only,
            ),
            api_base: get("AUTH_API_BASE"),
            api_timeout: get("AUTH_API_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.api_timeout),
        };

        let backend = get("STORAGE_BACKEND").unwrap_or_else(|| "sqlite".to_string());
        let storage = match backend.trim().to_ascii_lowercase().as_str() {
            "sqlite" => StorageConfig::Sqlite {
                path: get("SQLITE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("data/authbot.db")),
            },
            "mysql" => StorageConfig::MySql(MySqlSettings {
                host: get("MYSQL_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                port: get("MYSQL_PORT")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(3306),
                user: get("MYSQL_USER").unwrap_or_else(|| "root".to_string()),
                password: lookup("MYSQL_PASSWORD").unwrap_or_default(),
                database: get("MYSQL_DATABASE").unwrap_or_else(|| "authbot".to_string()),
            }),
            other => {
                return Err(BotError::ConfigValidation {
                    message: format!(
                        "STORAGE_BACKEND must be 'sqlite' or 'mysql', got '{}'",
                        other
                    ),
                })
            }
        };

        Ok(Self {
            discord_token,
            guild_id,
            auth,
            storage,
        })
    }
}

/// Interpret an environment flag. Unset falls back to `default`.
pub fn truthy(value: Option<&str>, default: bool) -> bool {
    match value {
        None => default,
        Some(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(Some("TRUE"), false));
        assert!(truthy(Some(" on "), false));
        assert!(truthy(Some("y"), false));
        assert!(!truthy(Some("false"), true));
        assert!(!truthy(Some("nope"), true));
        assert!(truthy(None, true));
        assert!(!truthy(None, false));
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_lookup(lookup_from(&[("DISCORD_TOKEN", "abc")])).unwrap();

        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.guild_id, None);
        assert_eq!(config.auth.success_role, "Verified");
        assert_eq!(config.auth.unverified_role, "Unverified");
        assert_eq!(config.auth.channel_name, "auth-verify");
        assert!(config.auth.hide_other_channels);
        assert!(config.auth.login_channel_only);
        assert_eq!(config.auth.api_base, None);
        assert_eq!(config.auth.api_timeout, Duration::from_secs(10));
        assert_eq!(
            config.storage,
            StorageConfig::Sqlite {
                path: PathBuf::from("data/authbot.db")
            }
        );
    }

    #[test]
    fn test_missing_token() {
        let err = BotConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, BotError::ConfigMissing { ref name } if name == "DISCORD_TOKEN"));
    }

    #[test]
    fn test_overrides() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("GUILD_ID", "1234"),
            ("AUTH_SUCCESS_ROLE", "Member"),
            ("AUTH_LOGIN_CHANNEL_ONLY", "no"),
            ("AUTH_API_BASE", "https://example.test/api"),
            ("AUTH_API_TIMEOUT_SECS", "3"),
            ("STORAGE_BACKEND", "MySQL"),
            ("MYSQL_HOST", "db"),
            ("MYSQL_PASSWORD", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.guild_id, Some(1234));
        assert_eq!(config.auth.success_role, "Member");
        assert!(!config.auth.login_channel_only);
        assert_eq!(config.auth.api_base.as_deref(), Some("https://example.test/api"));
        assert_eq!(config.auth.api_timeout, Duration::from_secs(3));
        assert_eq!(
            config.storage,
            StorageConfig::MySql(MySqlSettings {
                host: "db".to_string(),
                port: 3306,
                user: "root".to_string(),
                password: "secret".to_string(),
                database: "authbot".to_string(),
            })
        );
    }

    #[test]
    fn test_bad_guild_id_is_ignored() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("GUILD_ID", "not-a-number"),
        ]))
        .unwrap();
        assert_eq!(config.guild_id, None);
    }

    #[test]
    fn test_unknown_backend() {
        let err = BotConfig::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("STORAGE_BACKEND", "postgres"),
        ]))
        .unwrap_err();
        assert!(matches!(err, BotError::ConfigValidation { .. }));
    }
}
