use poise::serenity_prelude::{GuildId, RoleId, UserId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth_api::CredentialChecker;
use crate::config::AuthSettings;
use crate::error::Result;
use crate::platform::{GuildPlatform, PlatformError};
use crate::state::{SharedStore, VerificationRecord};

/// Nickname and record name when the API does not report one
const FALLBACK_USERNAME: &str = "user";

/// Whether `/auth login` may open the credential form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPrecheck {
    Proceed,
    NotInGuild,
    WrongChannel { expected: String },
    AlreadyVerified,
    ApiNotConfigured,
}

/// Result of a submitted login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Role granted. `persisted` is false when the record write failed.
    Verified { username: String, persisted: bool },
    BadCredentials,
    AuthFailed { status: u16 },
    RequestFailed { error: String },
    RoleUnavailable,
    RoleDenied,
    RoleAssignFailed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevokeOutcome {
    pub role_removed: bool,
    pub record_cleared: bool,
}

/// Drives a member from unverified to verified and back.
///
/// The stored record is authoritative. Role membership is consulted as a
/// secondary signal and either one counts as verified.
pub struct VerificationManager {
    store: SharedStore,
    checker: Option<Arc<dyn CredentialChecker>>,
    settings: AuthSettings,
}

impl VerificationManager {
    pub fn new(
        store: SharedStore,
        checker: Option<Arc<dyn CredentialChecker>>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            checker,
            settings,
        }
    }

    /// Check everything that can be decided before asking for credentials
    pub async fn precheck_login(
        &self,
        platform: &dyn GuildPlatform,
        guild: Option<GuildId>,
        channel_name: Option<&str>,
        user: UserId,
    ) -> Result<LoginPrecheck> {
        let Some(guild) = guild else {
            return Ok(LoginPrecheck::NotInGuild);
        };

        let expected = self.settings.channel_name.as_str();
        if self.settings.login_channel_only && channel_name != Some(expected) {
            return Ok(LoginPrecheck::WrongChannel {
                expected: self.settings.channel_name.clone(),
            });
        }

        if self.is_verified(platform, guild, user).await? {
            debug!("User {} is already verified in guild {}", user, guild);
            return Ok(LoginPrecheck::AlreadyVerified);
        }

        if self.checker.is_none() {
            return Ok(LoginPrecheck::ApiNotConfigured);
        }

        Ok(LoginPrecheck::Proceed)
    }

    /// Record or role, whichever says yes
    pub async fn is_verified(
        &self,
        platform: &dyn GuildPlatform,
        guild: GuildId,
        user: UserId,
    ) -> Result<bool> {
        if self.store.is_verified(guild.get(), user.get()).await? {
            return Ok(true);
        }
        Ok(self.holds_success_role(platform, guild, user).await.is_some())
    }

    /// The success role id if the member currently holds it
    async fn holds_success_role(
        &self,
        platform: &dyn GuildPlatform,
        guild: GuildId,
        user: UserId,
    ) -> Option<RoleId> {
        let lookup = async {
            let Some(role) = platform.find_role(guild, &self.settings.success_role).await? else {
                return Ok(None);
            };
            let held = platform.member_has_role(guild, user, role).await?;
            Ok::<_, PlatformError>(held.then_some(role))
        };
        match lookup.await {
            Ok(role) => role,
            Err(e) => {
                debug!("Role check for user {} failed, treating as unverified: {}", user, e);
                None
            }
        }
    }

    /// Check credentials, grant the role, rename, then persist
    pub async fn complete_login(
        &self,
        platform: &dyn GuildPlatform,
        guild: GuildId,
        user: UserId,
        login: &str,
        password: &str,
    ) -> LoginOutcome {
        let Some(checker) = &self.checker else {
            return LoginOutcome::RequestFailed {
                error: "login API is not configured".to_string(),
            };
        };

        let result = match checker.login(login, password).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Login request for user {} failed: {}", user, e);
                return LoginOutcome::RequestFailed {
                    error: e.to_string(),
                };
            }
        };

        if !result.is_success() {
            info!(
                "Login rejected for user {} in guild {} (status {})",
                user, guild, result.status_code
            );
            debug!("Login API payload: {}", result.raw_payload);
            return if result.is_bad_credentials() {
                LoginOutcome::BadCredentials
            } else {
                LoginOutcome::AuthFailed {
                    status: result.status_code,
                }
            };
        }

        let username = result
            .username
            .unwrap_or_else(|| FALLBACK_USERNAME.to_string());

        let role = match self.resolve_success_role(platform, guild).await {
            Some(role) => role,
            None => return LoginOutcome::RoleUnavailable,
        };

        match platform.add_role(guild, user, role).await {
            Ok(()) => {}
            Err(PlatformError::PermissionDenied(e)) => {
                error!("Missing permission to assign role to user {}: {}", user, e);
                return LoginOutcome::RoleDenied;
            }
            Err(e) => {
                error!("Failed to assign role to user {}: {}", user, e);
                return LoginOutcome::RoleAssignFailed {
                    error: e.to_string(),
                };
            }
        }

        if let Err(e) = platform.set_nickname(guild, user, &username).await {
            warn!("Failed to set nickname for user {}: {}", user, e);
        }

        let persisted = match self
            .store
            .mark_verified(guild.get(), user.get(), &username)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Role granted but verification record for user {} in guild {} was not saved: {}",
                    user, guild, e
                );
                false
            }
        };

        info!(
            "User {} verified as '{}' in guild {} (persisted: {})",
            user, username, guild, persisted
        );
        LoginOutcome::Verified {
            username,
            persisted,
        }
    }

    async fn resolve_success_role(
        &self,
        platform: &dyn GuildPlatform,
        guild: GuildId,
    ) -> Option<RoleId> {
        let name = &self.settings.success_role;
        match platform.find_role(guild, name).await {
            Ok(Some(role)) => return Some(role),
            Ok(None) => {}
            Err(e) => {
                error!("Failed to look up role '{}': {}", name, e);
                return None;
            }
        }
        match platform.create_role(guild, name).await {
            Ok(role) => Some(role),
            Err(e) => {
                error!("Failed to create role '{}': {}", name, e);
                None
            }
        }
    }

    /// Take the success role away and delete the record.
    ///
    /// Role changes are best-effort. The record delete is not.
    pub async fn revoke(
        &self,
        platform: &dyn GuildPlatform,
        guild: GuildId,
        user: UserId,
    ) -> Result<RevokeOutcome> {
        let mut role_removed = false;
        if let Some(role) = self.holds_success_role(platform, guild, user).await {
            match platform.remove_role(guild, user, role).await {
                Ok(()) => role_removed = true,
                Err(e) => warn!("Failed to remove role from user {}: {}", user, e),
            }
        }

        let record_cleared = self.store.revoke_verified(guild.get(), user.get()).await?;

        match platform
            .find_role(guild, &self.settings.unverified_role)
            .await
        {
            Ok(Some(role)) => {
                if let Err(e) = platform.add_role(guild, user, role).await {
                    warn!("Failed to restore unverified role for user {}: {}", user, e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to look up unverified role: {}", e),
        }

        info!(
            "Revoked user {} in guild {} (role removed: {}, record cleared: {})",
            user, guild, role_removed, record_cleared
        );
        Ok(RevokeOutcome {
            role_removed,
            record_cleared,
        })
    }

    pub async fn lookup(&self, guild: GuildId, user: UserId) -> Result<Option<VerificationRecord>> {
        self.store.get_user_info(guild.get(), user.get()).await
    }

    pub async fn list_verified(&self, guild: GuildId) -> Result<BTreeMap<u64, VerificationRecord>> {
        self.store.get_verified_users(guild.get()).await
    }
}

/// Shared verification manager type
pub type SharedVerificationManager = Arc<VerificationManager>;
