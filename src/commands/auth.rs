use poise::serenity_prelude::{
    self as serenity, ActionRowComponent, CreateActionRow, CreateInputText,
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateModal, InputTextStyle,
    Mentionable, ModalInteraction, ModalInteractionCollector,
};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{platform, reply, user_lang};
use crate::error::BotError;
use crate::i18n::{t, tf, Lang};
use crate::managers::{LoginOutcome, LoginPrecheck, RevokeOutcome, SetupSummary};
use crate::platform::{GuildPlatform, PlatformError};
use crate::state::VerificationRecord;
use crate::{Context, Error};

const MODAL_TIMEOUT: Duration = Duration::from_secs(300);
const INPUT_MAX_LEN: u16 = 120;
const LIST_LIMIT: usize = 50;
/// Discord's cap on message content, in characters
const MESSAGE_LIMIT: usize = 2000;
/// Room kept free for the `... +N` tail
const OVERFLOW_RESERVE: usize = 16;

/// Account verification commands
#[poise::command(
    slash_command,
    subcommands("setup", "login", "revoke", "info", "list"),
    subcommand_required
)]
pub async fn auth(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Create the verified role and auth channel (admin only)
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn setup(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a guild")?;
    let lang = user_lang(ctx).await;
    ctx.defer_ephemeral().await?;

    let platform = platform(ctx);
    let summary = match ctx.data().setup_manager.run(&platform, guild_id).await {
        Ok(summary) => summary,
        Err(BotError::Platform(PlatformError::PermissionDenied(e))) => {
            warn!("Setup in guild {} lacked permissions: {}", guild_id, e);
            return reply(ctx, t("role_permission_denied", lang)).await;
        }
        Err(e) => return Err(e.into()),
    };

    reply(ctx, setup_message(&summary, lang)).await?;

    if let Err(e) = platform
        .send_language_prompt(summary.channel, &t("lang_prompt", lang))
        .await
    {
        warn!("Failed to post language prompt in {}: {}", summary.channel, e);
    }
    Ok(())
}

/// Log in with your account to get verified
#[poise::command(slash_command)]
pub async fn login(ctx: Context<'_>) -> Result<(), Error> {
    let lang = user_lang(ctx).await;
    let user_id = ctx.author().id;
    let manager = &ctx.data().verification_manager;
    let platform = platform(ctx);

    let channel_name = match ctx.channel_id().to_channel(ctx.serenity_context()).await {
        Ok(channel) => channel.guild().map(|c| c.name),
        Err(e) => {
            debug!("Could not resolve channel {}: {}", ctx.channel_id(), e);
            None
        }
    };
    let precheck = manager
        .precheck_login(&platform, ctx.guild_id(), channel_name.as_deref(), user_id)
        .await?;
    if precheck != LoginPrecheck::Proceed {
        debug!("Login precheck for {} stopped at {:?}", user_id, precheck);
        return reply(ctx, precheck_message(&precheck, lang)).await;
    }

    let (poise::Context::Application(app_ctx), Some(guild_id)) = (ctx, ctx.guild_id()) else {
        return reply(ctx, t("must_use_in_server", lang)).await;
    };

    let modal_id = format!("auth_login_{}", app_ctx.interaction.id);
    app_ctx
        .interaction
        .create_response(
            ctx.http(),
            CreateInteractionResponse::Modal(login_modal(&modal_id, lang)),
        )
        .await?;
    app_ctx
        .has_sent_initial_response
        .store(true, Ordering::SeqCst);

    let submitted = ModalInteractionCollector::new(ctx.serenity_context())
        .author_id(user_id)
        .filter(move |m| m.data.custom_id == modal_id)
        .timeout(MODAL_TIMEOUT)
        .await;

    let Some(submit) = submitted else {
        info!("Login form for {} timed out", user_id);
        let followup = CreateInteractionResponseFollowup::new()
            .content(t("modal_timeout", lang))
            .ephemeral(true);
        if let Err(e) = app_ctx.interaction.create_followup(ctx.http(), followup).await {
            debug!("Could not report login timeout: {}", e);
        }
        return Ok(());
    };

    submit.defer_ephemeral(ctx.http()).await?;

    let login = input_value(&submit, "login");
    let password = input_value(&submit, "password");
    let outcome = manager
        .complete_login(&platform, guild_id, user_id, login.trim(), &password)
        .await;

    submit
        .create_followup(
            ctx.http(),
            CreateInteractionResponseFollowup::new()
                .content(outcome_message(&outcome, lang))
                .ephemeral(true),
        )
        .await?;
    Ok(())
}

/// Revoke a member's verification (admin only)
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn revoke(
    ctx: Context<'_>,
    #[description = "Member to revoke"] member: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a guild")?;
    let lang = user_lang(ctx).await;
    ctx.defer_ephemeral().await?;

    let outcome = ctx
        .data()
        .verification_manager
        .revoke(&platform(ctx), guild_id, member.id)
        .await?;

    reply(ctx, revoke_message(&member.mention().to_string(), outcome, lang)).await
}

/// Show a member's verification record (admin only)
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn info(
    ctx: Context<'_>,
    #[description = "Member to look up"] member: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a guild")?;
    let lang = user_lang(ctx).await;
    let mention = member.mention().to_string();

    let text = match ctx
        .data()
        .verification_manager
        .lookup(guild_id, member.id)
        .await?
    {
        Some(record) => tf(
            "info_record",
            lang,
            &[
                ("member", mention.as_str()),
                ("username", record.username.as_str()),
                ("verified_at", format_time(&record).as_str()),
            ],
        ),
        None => tf("info_none", lang, &[("member", mention.as_str())]),
    };
    reply(ctx, text).await
}

/// List verified members of this server (admin only)
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a guild")?;
    let lang = user_lang(ctx).await;
    let users = ctx
        .data()
        .verification_manager
        .list_verified(guild_id)
        .await?;

    let records: Vec<_> = users.into_values().collect();
    reply(ctx, list_message(&records, lang)).await
}

fn login_modal(custom_id: &str, lang: Lang) -> CreateModal {
    let login = CreateInputText::new(InputTextStyle::Short, t("modal_login_label", lang), "login")
        .placeholder(t("modal_login_placeholder", lang))
        .max_length(INPUT_MAX_LEN)
        .required(true);
    let password =
        CreateInputText::new(InputTextStyle::Short, t("modal_password_label", lang), "password")
            .max_length(INPUT_MAX_LEN)
            .required(true);

    CreateModal::new(custom_id, t("modal_title", lang)).components(vec![
        CreateActionRow::InputText(login),
        CreateActionRow::InputText(password),
    ])
}

fn input_value(submit: &ModalInteraction, custom_id: &str) -> String {
    submit
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == custom_id => {
                input.value.clone()
            }
            _ => None,
        })
        .unwrap_or_default()
}

fn format_time(record: &VerificationRecord) -> String {
    record.verified_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn precheck_message(precheck: &LoginPrecheck, lang: Lang) -> String {
    match precheck {
        LoginPrecheck::Proceed => String::new(),
        LoginPrecheck::NotInGuild => t("must_use_in_server", lang),
        LoginPrecheck::WrongChannel { expected } => {
            tf("use_channel", lang, &[("channel", expected.as_str())])
        }
        LoginPrecheck::AlreadyVerified => t("already_verified", lang),
        LoginPrecheck::ApiNotConfigured => t("api_not_config", lang),
    }
}

fn outcome_message(outcome: &LoginOutcome, lang: Lang) -> String {
    match outcome {
        LoginOutcome::Verified {
            username,
            persisted: true,
        } => tf("auth_success", lang, &[("username", username.as_str())]),
        LoginOutcome::Verified {
            username,
            persisted: false,
        } => tf(
            "auth_partial_success",
            lang,
            &[
                ("username", username.as_str()),
                ("error", t("record_not_saved", lang).as_str()),
            ],
        ),
        LoginOutcome::BadCredentials => t("auth_failed_500", lang),
        LoginOutcome::AuthFailed { .. } => t("auth_failed_generic", lang),
        LoginOutcome::RequestFailed { error } => {
            tf("auth_request_failed", lang, &[("error", error.as_str())])
        }
        LoginOutcome::RoleUnavailable => t("role_create_failed", lang),
        LoginOutcome::RoleDenied => t("role_permission_denied", lang),
        LoginOutcome::RoleAssignFailed { error } => {
            tf("role_assign_failed", lang, &[("error", error.as_str())])
        }
    }
}

fn setup_message(summary: &SetupSummary, lang: Lang) -> String {
    let mut text = tf(
        "setup_complete",
        lang,
        &[
            ("role", summary.role.mention().to_string().as_str()),
            ("channel", summary.channel.mention().to_string().as_str()),
        ],
    );
    if !summary.failed.is_empty() {
        text.push('\n');
        text.push_str(&tf(
            "setup_warnings",
            lang,
            &[("channels", summary.failed.join(", ").as_str())],
        ));
    }
    text
}

fn revoke_message(member: &str, outcome: RevokeOutcome, lang: Lang) -> String {
    let mut text = tf("revoke_success", lang, &[("member", member)]);
    if outcome.role_removed {
        text.push_str(&t("revoke_role_removed", lang));
    }
    if outcome.record_cleared {
        text.push_str(&t("revoke_record_cleared", lang));
    }
    text
}

fn list_message(records: &[VerificationRecord], lang: Lang) -> String {
    if records.is_empty() {
        return t("list_empty", lang);
    }
    let mut text = tf(
        "list_header",
        lang,
        &[("count", records.len().to_string().as_str())],
    );
    let mut used = text.chars().count();
    let mut shown = 0;
    for record in records.iter().take(LIST_LIMIT) {
        let line = format!(
            "\n- <@{}>: {} ({})",
            record.user_id,
            record.username,
            format_time(record)
        );
        let len = line.chars().count();
        if used + len + OVERFLOW_RESERVE > MESSAGE_LIMIT {
            break;
        }
        text.push_str(&line);
        used += len;
        shown += 1;
    }
    if shown < records.len() {
        text.push_str(&format!("\n... +{}", records.len() - shown));
    }
    text
}
