//! Narrow view of the guild operations the managers need.
//!
//! [`SerenityPlatform`] talks to Discord over HTTP. Tests drive the managers
//! through `fake::FakePlatform` instead.

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId, PermissionOverwrite, RoleId, UserId};
use thiserror::Error;

#[cfg(test)]
pub mod fake;
pub mod serenity_platform;

pub use serenity_platform::SerenityPlatform;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The bot lacks a permission or sits below the target in the role hierarchy
    #[error("Missing permissions: {0}")]
    PermissionDenied(String),

    #[error("Discord API error: {0}")]
    Api(String),
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Category,
    Text,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
}

#[async_trait]
pub trait GuildPlatform: Send + Sync {
    async fn find_role(&self, guild: GuildId, name: &str) -> PlatformResult<Option<RoleId>>;

    async fn create_role(&self, guild: GuildId, name: &str) -> PlatformResult<RoleId>;

    async fn member_has_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> PlatformResult<bool>;

    async fn add_role(&self, guild: GuildId, user: UserId, role: RoleId) -> PlatformResult<()>;

    async fn remove_role(&self, guild: GuildId, user: UserId, role: RoleId)
        -> PlatformResult<()>;

    async fn set_nickname(&self, guild: GuildId, user: UserId, nickname: &str)
        -> PlatformResult<()>;

    /// First text channel with exactly this name
    async fn find_text_channel(&self, guild: GuildId, name: &str)
        -> PlatformResult<Option<ChannelId>>;

    async fn create_text_channel(
        &self,
        guild: GuildId,
        name: &str,
        overwrites: Vec<PermissionOverwrite>,
    ) -> PlatformResult<ChannelId>;

    async fn list_channels(&self, guild: GuildId) -> PlatformResult<Vec<ChannelSummary>>;

    /// Create or replace one permission overwrite on a channel
    async fn set_overwrite(
        &self,
        channel: ChannelId,
        overwrite: PermissionOverwrite,
    ) -> PlatformResult<()>;

    fn bot_user_id(&self) -> UserId;

    /// Post `content` with the language switch buttons
    async fn send_language_prompt(&self, channel: ChannelId, content: &str)
        -> PlatformResult<()>;
}

/// The @everyone role shares the guild's id
pub fn everyone_role(guild: GuildId) -> RoleId {
    RoleId::new(guild.get())
}
