use serenity::{
    builder::CreateApplicationCommand,
    model::application::{
        command::CommandOptionType,
        interaction::{
            application_command::ApplicationCommandInteraction, InteractionResponseType,
        },
    },
    prelude::Context,
};
use tracing::info;

use super::{get_option_integer, get_option_string, required, CommandError};
use crate::discord::embeds::{session_buttons, session_embed};
use crate::error::KeymasterError;
use crate::lfg::{LfgListing, LfgSession, SessionView};
use crate::service::AppState;
use crate::storage::Storage;
use crate::types::UserId;

pub const MIN_LEVEL: u32 = 2;
pub const MAX_LEVEL: u32 = 40;

pub fn parse_level(level: i64) -> Result<u32, CommandError> {
    u32::try_from(level)
        .ok()
        .filter(|level| (MIN_LEVEL..=MAX_LEVEL).contains(level))
        .ok_or_else(|| {
            CommandError::InvalidOption(format!(
                "key level must be between {} and {}",
                MIN_LEVEL, MAX_LEVEL
            ))
        })
}

/// Only registered users may post a group
async fn ensure_registered(storage: &dyn Storage, user: UserId) -> crate::error::Result<()> {
    match storage.get_user(user).await? {
        Some(_) => Ok(()),
        None => Err(KeymasterError::NotRegistered { user_id: user }.into()),
    }
}

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    state: &AppState,
) -> Result<(), CommandError> {
    let options = &command.data.options;
    let dungeon = required(get_option_string(options, "dungeon")?, "dungeon")?.trim();
    if dungeon.is_empty() {
        return Err(CommandError::InvalidOption("dungeon must not be empty".to_string()));
    }
    let level = parse_level(*required(get_option_integer(options, "level")?, "level")?)?;
    let note = get_option_string(options, "note")?.cloned();

    let leader = command.user.id.0;
    ensure_registered(state.storage().as_ref(), leader).await?;

    let listing = LfgListing::new(dungeon, level, note);

    // The buttons carry the message id, which only exists once the post is sent
    let draft = LfgSession::new(0, command.channel_id.0, leader, listing.clone());
    let draft_view = SessionView::build(&draft, |_| None);
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.add_embed(session_embed(&draft_view)))
        })
        .await?;

    let message = command.get_interaction_response(&ctx.http).await?;
    let view = state
        .lfg()
        .open_session(message.id.0, command.channel_id.0, leader, listing)
        .await?;

    command
        .edit_original_interaction_response(&ctx.http, |response| {
            response
                .set_embed(session_embed(&view))
                .components(|components| session_buttons(components, &view))
        })
        .await?;

    info!(
        "{} posted group {} in channel {}",
        command.user.tag(),
        message.id,
        command.channel_id
    );
    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("lfg")
        .description("Post a group for a keystone")
        .create_option(|option| {
            option
                .name("dungeon")
                .description("Dungeon")
                .kind(CommandOptionType::String)
                .required(true)
                .set_autocomplete(true)
        })
        .create_option(|option| {
            option
                .name("level")
                .description("Key level")
                .kind(CommandOptionType::Integer)
                .min_int_value(MIN_LEVEL)
                .max_int_value(MAX_LEVEL)
                .required(true)
        })
        .create_option(|option| {
            option
                .name("note")
                .description("Note for applicants (lust, combat res, experience)")
                .kind(CommandOptionType::String)
                .required(false)
        })
}
