use poise::serenity_prelude::{
    ChannelId, GuildId, PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId, UserId,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AuthSettings;
use crate::error::Result;
use crate::platform::{everyone_role, ChannelKind, ChannelSummary, GuildPlatform};

/// What a setup pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSummary {
    pub role: RoleId,
    pub role_created: bool,
    pub channel: ChannelId,
    pub channel_created: bool,
    /// Channels and categories now hidden from @everyone
    pub hidden: Vec<ChannelId>,
    /// Names of channels whose overwrites could not be applied
    pub failed: Vec<String>,
}

/// Prepares a guild for verification: role, auth channel, and visibility
pub struct SetupManager {
    settings: AuthSettings,
}

impl SetupManager {
    pub fn new(settings: AuthSettings) -> Self {
        Self { settings }
    }

    /// Run the whole setup pass.
    ///
    /// Failing to resolve the role or the auth channel aborts. Individual
    /// overwrite failures are logged, collected in the summary, and skipped.
    pub async fn run(&self, platform: &dyn GuildPlatform, guild: GuildId) -> Result<SetupSummary> {
        let (role, role_created) = self.ensure_role(platform, guild).await?;

        let mut failed = Vec::new();
        let auth_overwrites = auth_channel_overwrites(guild, role, platform.bot_user_id());
        let name = &self.settings.channel_name;
        let (channel, channel_created) = match platform.find_text_channel(guild, name).await? {
            Some(channel) => {
                info!("Updating auth channel '{}' overwrites in guild {}", name, guild);
                for overwrite in auth_overwrites {
                    if let Err(e) = platform.set_overwrite(channel, overwrite).await {
                        warn!("Failed to set auth channel overwrite: channel={} err={}", channel, e);
                        push_unique(&mut failed, name);
                    }
                }
                (channel, false)
            }
            None => {
                info!("Creating auth channel '{}' in guild {}", name, guild);
                let channel = platform
                    .create_text_channel(guild, name, auth_overwrites)
                    .await?;
                (channel, true)
            }
        };

        let mut summary = SetupSummary {
            role,
            role_created,
            channel,
            channel_created,
            hidden: Vec::new(),
            failed,
        };

        if self.settings.hide_other_channels {
            self.hide_other_channels(platform, guild, &mut summary).await?;
        }

        info!(
            "Setup finished in guild {}: {} hidden, {} failed",
            guild,
            summary.hidden.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    async fn ensure_role(
        &self,
        platform: &dyn GuildPlatform,
        guild: GuildId,
    ) -> Result<(RoleId, bool)> {
        let name = &self.settings.success_role;
        if let Some(role) = platform.find_role(guild, name).await? {
            return Ok((role, false));
        }
        info!("Creating role '{}' in guild {}", name, guild);
        let role = platform.create_role(guild, name).await?;
        Ok((role, true))
    }

    async fn hide_other_channels(
        &self,
        platform: &dyn GuildPlatform,
        guild: GuildId,
        summary: &mut SetupSummary,
    ) -> Result<()> {
        let channels = platform.list_channels(guild).await?;

        // Categories first so nested channels inherit the change
        let categories = channels.iter().filter(|c| c.kind == ChannelKind::Category);
        let verify_channel = summary.channel;
        let texts = channels
            .iter()
            .filter(|c| c.kind == ChannelKind::Text && c.id != verify_channel);

        for channel in categories {
            let overwrites = [
                role_overwrite(everyone_role(guild), Permissions::empty(), Permissions::VIEW_CHANNEL),
                role_overwrite(summary.role, Permissions::VIEW_CHANNEL, Permissions::empty()),
            ];
            apply_all(platform, channel, overwrites, summary).await;
        }

        for channel in texts {
            let overwrites = [
                role_overwrite(everyone_role(guild), Permissions::empty(), Permissions::VIEW_CHANNEL),
                role_overwrite(summary.role, visible(), Permissions::empty()),
            ];
            apply_all(platform, channel, overwrites, summary).await;
        }

        Ok(())
    }
}

/// Shared setup manager type
pub type SharedSetupManager = Arc<SetupManager>;

async fn apply_all(
    platform: &dyn GuildPlatform,
    channel: &ChannelSummary,
    overwrites: [PermissionOverwrite; 2],
    summary: &mut SetupSummary,
) {
    for overwrite in overwrites {
        if let Err(e) = platform.set_overwrite(channel.id, overwrite).await {
            warn!(
                "Failed to set channel overwrite: channel={} ({}) err={}",
                channel.name, channel.id, e
            );
            push_unique(&mut summary.failed, &channel.name);
            return;
        }
    }
    summary.hidden.push(channel.id);
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

fn visible() -> Permissions {
    Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES
}

fn role_overwrite(role: RoleId, allow: Permissions, deny: Permissions) -> PermissionOverwrite {
    PermissionOverwrite {
        allow,
        deny,
        kind: PermissionOverwriteType::Role(role),
    }
}

/// Everyone, the bot, and verified members may read and write
fn auth_channel_overwrites(guild: GuildId, role: RoleId, bot: UserId) -> Vec<PermissionOverwrite> {
    vec![
        role_overwrite(everyone_role(guild), visible(), Permissions::empty()),
        PermissionOverwrite {
            allow: visible(),
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(bot),
        },
        role_overwrite(role, visible(), Permissions::empty()),
    ]
}
