use serenity::{
    builder::CreateApplicationCommand,
    model::application::interaction::application_command::ApplicationCommandInteraction,
    prelude::Context,
};

use super::{
    character_options, defer, followup_embed, followup_ephemeral, name_option, realm_option,
    region_option, required, CommandError,
};
use crate::discord::embeds::character_card;
use crate::service::{AppState, ProfileLookup};

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    state: &AppState,
) -> Result<(), CommandError> {
    let character = required(character_options(&command.data.options)?, "name")?;

    defer(ctx, command).await?;

    match state.profiles().check(character).await? {
        ProfileLookup::Found { profile, .. } => {
            followup_embed(ctx, command, character_card(&profile)).await?
        }
        ProfileLookup::CharacterNotFound(character) => {
            let text = format!(
                "❌ Character **{}** ({}) was not found. Check the name and realm.",
                character.name, character.realm
            );
            followup_ephemeral(ctx, command, &text).await?
        }
        ProfileLookup::NotRegistered => {}
    }

    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("check")
        .description("Look up any character on Raider.IO")
        .create_option(|option| name_option(option, true))
        .create_option(|option| realm_option(option, true))
        .create_option(|option| region_option(option, true))
}
