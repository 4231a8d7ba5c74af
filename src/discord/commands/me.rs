use serenity::{
    builder::CreateApplicationCommand,
    model::application::interaction::application_command::ApplicationCommandInteraction,
    prelude::Context,
};

use super::{defer, followup_embed, followup_ephemeral, CommandError, NOT_REGISTERED};
use crate::discord::embeds::character_card;
use crate::service::{AppState, ProfileLookup};

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    state: &AppState,
) -> Result<(), CommandError> {
    defer(ctx, command).await?;

    match state.profiles().my_profile(command.user.id.0).await? {
        ProfileLookup::Found { profile, .. } => {
            followup_embed(ctx, command, character_card(&profile)).await?
        }
        ProfileLookup::NotRegistered => followup_ephemeral(ctx, command, NOT_REGISTERED).await?,
        ProfileLookup::CharacterNotFound(character) => {
            let text = format!(
                "{} was not found on Raider.IO. Check your registration.",
                character
            );
            followup_ephemeral(ctx, command, &text).await?
        }
    }

    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("me")
        .description("Show your registered character")
}
