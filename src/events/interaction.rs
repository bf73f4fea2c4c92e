use poise::serenity_prelude::{
    self as serenity, CreateInteractionResponse, CreateInteractionResponseMessage,
};
use tracing::{debug, info};

use crate::i18n::{t, Lang};
use crate::platform::serenity_platform::{LANG_EN_BUTTON, LANG_ZH_BUTTON};
use crate::{Data, Error};

/// Language chosen by a prompt button, if `custom_id` is one of ours
pub fn lang_for_button(custom_id: &str) -> Option<Lang> {
    match custom_id {
        LANG_ZH_BUTTON => Some(Lang::Zh),
        LANG_EN_BUTTON => Some(Lang::En),
        _ => None,
    }
}

fn confirmation_key(lang: Lang) -> &'static str {
    match lang {
        Lang::Zh => "lang_set_zh",
        Lang::En => "lang_set_en",
    }
}

/// Handle clicks on the language prompt buttons
pub async fn handle_interaction(
    ctx: &serenity::Context,
    interaction: &serenity::Interaction,
    data: &Data,
) -> Result<(), Error> {
    let serenity::Interaction::Component(component) = interaction else {
        return Ok(());
    };
    let Some(lang) = lang_for_button(&component.data.custom_id) else {
        debug!("Ignoring component {}", component.data.custom_id);
        return Ok(());
    };

    let guild_id = component.guild_id.map(|g| g.get()).unwrap_or(0);
    data.store
        .set_lang(guild_id, component.user.id.get(), lang)
        .await?;
    info!(
        "User {} set language to {} in guild {}",
        component.user.id, lang, guild_id
    );

    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(t(confirmation_key(lang), lang))
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
