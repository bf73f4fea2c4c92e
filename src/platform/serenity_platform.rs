use async_trait::async_trait;
use poise::serenity_prelude::{
    self as serenity, ButtonStyle, ChannelId, ChannelType, CreateActionRow, CreateButton,
    CreateChannel, CreateMessage, EditMember, EditRole, GuildId, Http, PermissionOverwrite,
    RoleId, UserId,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ChannelKind, ChannelSummary, GuildPlatform, PlatformError, PlatformResult};

pub const LANG_ZH_BUTTON: &str = "lang_zh";
pub const LANG_EN_BUTTON: &str = "lang_en";

const AUDIT_REASON: &str = "authbot verification";

/// [`GuildPlatform`] backed by the Discord HTTP API
#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
    bot_id: UserId,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, bot_id: UserId) -> Self {
        Self { http, bot_id }
    }
}

impl From<serenity::Error> for PlatformError {
    fn from(err: serenity::Error) -> Self {
        if is_permission_error(&err) {
            PlatformError::PermissionDenied(err.to_string())
        } else {
            PlatformError::Api(err.to_string())
        }
    }
}

/// 403 responses and Discord error code 50013 mean the bot is not allowed
fn is_permission_error(err: &serenity::Error) -> bool {
    if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) = err {
        if response.status_code.as_u16() == 403 || response.error.code == 50013 {
            return true;
        }
    }
    let err_str = err.to_string();
    err_str.contains("Missing Permissions") || err_str.contains("50013")
}

fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Category => ChannelKind::Category,
        ChannelType::Text => ChannelKind::Text,
        _ => ChannelKind::Other,
    }
}

#[async_trait]
impl GuildPlatform for SerenityPlatform {
    async fn find_role(&self, guild: GuildId, name: &str) -> PlatformResult<Option<RoleId>> {
        let roles = guild.roles(&self.http).await?;
        Ok(roles
            .into_iter()
            .find(|(_, role)| role.name == name)
            .map(|(id, _)| id))
    }

    async fn create_role(&self, guild: GuildId, name: &str) -> PlatformResult<RoleId> {
        let role = guild
            .create_role(&self.http, EditRole::new().name(name).audit_log_reason(AUDIT_REASON))
            .await?;
        info!("Created role '{}' ({}) in guild {}", name, role.id, guild);
        Ok(role.id)
    }

    async fn member_has_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> PlatformResult<bool> {
        let member = guild.member(&self.http, user).await?;
        Ok(member.roles.contains(&role))
    }

    async fn add_role(&self, guild: GuildId, user: UserId, role: RoleId) -> PlatformResult<()> {
        self.http
            .add_member_role(guild, user, role, Some(AUDIT_REASON))
            .await?;
        debug!("Added role {} to user {} in guild {}", role, user, guild);
        Ok(())
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> PlatformResult<()> {
        self.http
            .remove_member_role(guild, user, role, Some(AUDIT_REASON))
            .await?;
        debug!("Removed role {} from user {} in guild {}", role, user, guild);
        Ok(())
    }

    async fn set_nickname(
        &self,
        guild: GuildId,
        user: UserId,
        nickname: &str,
    ) -> PlatformResult<()> {
        guild
            .edit_member(&self.http, user, EditMember::new().nickname(nickname))
            .await?;
        Ok(())
    }

    async fn find_text_channel(
        &self,
        guild: GuildId,
        name: &str,
    ) -> PlatformResult<Option<ChannelId>> {
        let channels = guild.channels(&self.http).await?;
        Ok(channels
            .into_iter()
            .find(|(_, channel)| channel.kind == ChannelType::Text && channel.name == name)
            .map(|(id, _)| id))
    }

    async fn create_text_channel(
        &self,
        guild: GuildId,
        name: &str,
        overwrites: Vec<PermissionOverwrite>,
    ) -> PlatformResult<ChannelId> {
        let channel = guild
            .create_channel(
                &self.http,
                CreateChannel::new(name)
                    .kind(ChannelType::Text)
                    .permissions(overwrites)
                    .audit_log_reason(AUDIT_REASON),
            )
            .await?;
        info!("Created channel #{} ({}) in guild {}", name, channel.id, guild);
        Ok(channel.id)
    }

    async fn list_channels(&self, guild: GuildId) -> PlatformResult<Vec<ChannelSummary>> {
        let channels = guild.channels(&self.http).await?;
        let mut summaries: Vec<_> = channels
            .into_values()
            .map(|channel| ChannelSummary {
                id: channel.id,
                name: channel.name,
                kind: channel_kind(channel.kind),
            })
            .collect();
        summaries.sort_by_key(|c| c.id);
        Ok(summaries)
    }

    async fn set_overwrite(
        &self,
        channel: ChannelId,
        overwrite: PermissionOverwrite,
    ) -> PlatformResult<()> {
        channel.create_permission(&self.http, overwrite).await?;
        Ok(())
    }

    fn bot_user_id(&self) -> UserId {
        self.bot_id
    }

    async fn send_language_prompt(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> PlatformResult<()> {
        let buttons = vec![
            CreateButton::new(LANG_ZH_BUTTON)
                .label("中文")
                .style(ButtonStyle::Primary),
            CreateButton::new(LANG_EN_BUTTON)
                .label("English")
                .style(ButtonStyle::Secondary),
        ];
        channel
            .send_message(
                &self.http,
                CreateMessage::new()
                    .content(content)
                    .components(vec![CreateActionRow::Buttons(buttons)]),
            )
            .await?;
        Ok(())
    }
}
