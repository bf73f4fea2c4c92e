pub mod auth;
pub mod general;

pub use auth::auth;
pub use general::basic;

use tracing::warn;

use crate::i18n::Lang;
use crate::platform::SerenityPlatform;
use crate::Context;

/// Guild key used for preferences set outside a guild
const DM_GUILD: u64 = 0;

/// The invoking user's language, falling back to the default on storage errors
pub async fn user_lang(ctx: Context<'_>) -> Lang {
    let guild = ctx.guild_id().map(|g| g.get()).unwrap_or(DM_GUILD);
    match ctx.data().store.get_lang(guild, ctx.author().id.get()).await {
        Ok(lang) => lang,
        Err(e) => {
            warn!("Failed to read language for {}: {}", ctx.author().id, e);
            Lang::default()
        }
    }
}

/// Platform handle for the current command
pub fn platform(ctx: Context<'_>) -> SerenityPlatform {
    SerenityPlatform::new(ctx.serenity_context().http.clone(), ctx.framework().bot_id)
}

/// Send an ephemeral text reply
pub async fn reply(ctx: Context<'_>, content: impl Into<String>) -> Result<(), crate::Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
