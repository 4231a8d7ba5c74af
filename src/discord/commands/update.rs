use serenity::{
    builder::CreateApplicationCommand,
    model::application::interaction::application_command::ApplicationCommandInteraction,
    prelude::Context,
};

use super::{defer, followup_embed, followup_ephemeral, CommandError, NOT_REGISTERED};
use crate::discord::embeds::update_card;
use crate::service::{AppState, UpdateOutcome};

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    state: &AppState,
) -> Result<(), CommandError> {
    defer(ctx, command).await?;

    let outcome = state.profiles().update(command.user.id.0).await?;
    if let Some(embed) = update_card(&outcome) {
        followup_embed(ctx, command, embed).await?;
        return Ok(());
    }

    let text = match outcome {
        UpdateOutcome::NotRegistered => NOT_REGISTERED.to_string(),
        UpdateOutcome::CharacterNotFound(character) => format!(
            "❌ Could not fetch {} from Raider.IO. Check your registration or try again later.",
            character
        ),
        UpdateOutcome::Updated { .. } => return Ok(()),
    };
    followup_ephemeral(ctx, command, &text).await?;
    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("update")
        .description("Refresh your character from Raider.IO")
}
