use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord bot that verifies members against an external login API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands to every guild the bot is in
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Register commands only in this guild (overrides GUILD_ID)
    #[arg(long)]
    guild_id: Option<u64>,

    /// Import a legacy JSON data file into the configured store before starting
    #[arg(long, value_name = "PATH")]
    import_legacy: Option<PathBuf>,
}

mod auth_api;
mod commands;
mod config;
mod error;
mod events;
mod i18n;
mod logging;
mod managers;
mod platform;
mod state;

use auth_api::{AuthApi, CredentialChecker};
use commands::{auth, basic, user_lang};
use config::BotConfig;
use events::handle_interaction;
use managers::{SetupManager, SharedSetupManager, SharedVerificationManager, VerificationManager};
use state::SharedStore;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub store: SharedStore,
    pub verification_manager: SharedVerificationManager,
    pub setup_manager: SharedSetupManager,
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let Err(e) = handle_interaction(ctx, interaction, data).await {
                error!("Failed to handle interaction: {}", e);
            }
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            info!("Serving guild: {} ({})", guild.name, guild.id);
        }
        _ => {}
    }
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
            let lang = user_lang(ctx).await;
            let _ = commands::reply(ctx, i18n::t("generic_error", lang)).await;
        }
        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
            error!(
                "Argument parse error in '{}': {} (input: {:?})",
                ctx.command().qualified_name,
                error,
                input
            );
        }
        poise::FrameworkError::MissingBotPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            error!(
                "Bot missing permissions for '{}': {:?}",
                ctx.command().qualified_name,
                missing_permissions
            );
            let lang = user_lang(ctx).await;
            let _ = commands::reply(ctx, i18n::t("role_permission_denied", lang)).await;
        }
        poise::FrameworkError::MissingUserPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            warn!(
                "User {} missing permissions for '{}': {:?}",
                ctx.author().name,
                ctx.command().qualified_name,
                missing_permissions
            );
            let lang = user_lang(ctx).await;
            let _ = commands::reply(ctx, i18n::t("missing_admin", lang)).await;
        }
        poise::FrameworkError::GuildOnly { ctx, .. } => {
            warn!(
                "Command '{}' is guild-only, used in DM by {}",
                ctx.command().qualified_name,
                ctx.author().name
            );
            let lang = user_lang(ctx).await;
            let _ = commands::reply(ctx, i18n::t("must_use_in_server", lang)).await;
        }
        other => {
            error!("Other framework error: {}", other);
        }
    }
}

/// Log the application id encoded in the first token segment
fn log_bot_id(token: &str) {
    use base64::Engine;

    let Some(bot_id_b64) = token.split('.').next() else {
        return;
    };
    // Discord tokens use base64 without padding, sometimes URL-safe
    let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(bot_id_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(bot_id_b64));
    if let Some(id_str) = decoded.ok().and_then(|bytes| String::from_utf8(bytes).ok()) {
        info!(
            "Bot ID: {} (configure intents at https://discord.com/developers/applications/{}/bot)",
            id_str, id_str
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    logging::init(logging::parse_level(
        std::env::var("LOG_LEVEL").ok().as_deref(),
    ));

    let config = BotConfig::from_env()?;
    log_bot_id(&config.discord_token);

    let store = state::open_store(&config.storage).await?;

    if let Some(path) = &args.import_legacy {
        info!("--import-legacy: importing {}", path.display());
        state::import_legacy(path, store.as_ref()).await?;
    }

    let checker: Option<Arc<dyn CredentialChecker>> = match &config.auth.api_base {
        Some(base) => {
            info!("Login API: {}", base);
            let api = AuthApi::new(base, config.auth.api_timeout)?;
            Some(Arc::new(api) as Arc<dyn CredentialChecker>)
        }
        None => {
            warn!("AUTH_API_BASE is not set; /auth login will be unavailable");
            None
        }
    };

    let verification_manager: SharedVerificationManager = Arc::new(VerificationManager::new(
        store.clone(),
        checker,
        config.auth.clone(),
    ));
    let setup_manager: SharedSetupManager = Arc::new(SetupManager::new(config.auth.clone()));

    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;
    let target_guild_id = args.guild_id.or(config.guild_id);

    if sync_commands {
        info!("--sync-commands: Will force re-register slash commands");
    }
    if let Some(gid) = target_guild_id {
        info!("Registering commands in guild {} only", gid);
    } else if guild_commands {
        info!("--guild-commands: Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![auth(), basic()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id()
                            .map(|g| g.to_string())
                            .unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' completed for {}",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                let commands = &framework.options().commands;
                if let Some(gid) = target_guild_id {
                    let guild_id = serenity::GuildId::new(gid);
                    info!("Registering commands to guild: {}", guild_id);
                    if let Err(e) = poise::builtins::register_in_guild(ctx, commands, guild_id).await
                    {
                        error!("Failed to register commands for guild {}: {}", guild_id, e);
                    }
                } else if guild_commands || sync_commands {
                    for guild in &ready.guilds {
                        info!("Registering commands to guild: {}", guild.id);
                        if let Err(e) =
                            poise::builtins::register_in_guild(ctx, commands, guild.id).await
                        {
                            error!("Failed to register commands for guild {}: {}", guild.id, e);
                        }
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) = poise::builtins::register_globally(ctx, commands).await {
                        error!("Failed to register commands globally: {}", e);
                    } else {
                        info!(
                            "Successfully registered {} commands globally (may take up to 1 hour to propagate)",
                            commands.len()
                        );
                    }
                }

                Ok(Data {
                    store,
                    verification_manager,
                    setup_manager,
                })
            })
        })
        .build();

    // Member lookups for role checks need the members intent
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("Enable the GUILD_MEMBERS privileged intent in the Discord Developer Portal");
            return Err(anyhow::anyhow!(
                "Disallowed gateway intents. Enable GUILD_MEMBERS in the Discord Developer Portal"
            ));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}
