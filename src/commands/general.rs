use tracing::info;

use super::{reply, user_lang};
use crate::i18n::t;
use crate::{Context, Error};

/// Basic utility commands
#[poise::command(slash_command, subcommands("ping", "echo", "help"), subcommand_required)]
pub async fn basic(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Check if the bot is running
#[poise::command(slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    let latency = ctx.ping().await;
    reply(ctx, format!("Pong! ({} ms)", latency.as_millis())).await
}

/// Echo back the given text
#[poise::command(slash_command)]
pub async fn echo(
    ctx: Context<'_>,
    #[description = "Text to echo"] text: Option<String>,
) -> Result<(), Error> {
    match text.as_deref().and_then(echo_reply) {
        Some(echoed) => {
            ctx.send(echoed).await?;
            Ok(())
        }
        None => {
            let lang = user_lang(ctx).await;
            reply(ctx, t("echo_empty", lang)).await
        }
    }
}

/// Public reply repeating `text`, or `None` when there is nothing to echo
fn echo_reply(text: &str) -> Option<poise::CreateReply> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(poise::CreateReply::default().content(text))
}

/// Show help information
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let lang = user_lang(ctx).await;
    reply(ctx, t("help_text", lang)).await
}
