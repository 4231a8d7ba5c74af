use serenity::{
    builder::CreateApplicationCommand,
    model::application::interaction::application_command::ApplicationCommandInteraction,
    prelude::Context,
};
use tracing::info;

use super::{
    character_options, defer, followup_embed, followup_ephemeral, name_option, realm_option,
    region_option, required, CommandError,
};
use crate::discord::embeds::registration_card;
use crate::service::{AppState, RegisterOutcome};

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    state: &AppState,
) -> Result<(), CommandError> {
    let character = required(character_options(&command.data.options)?, "name")?;

    defer(ctx, command).await?;

    match state
        .profiles()
        .register(command.user.id.0, character.clone())
        .await?
    {
        RegisterOutcome::Registered(record) => {
            info!("{} registered {}", command.user.tag(), character);
            followup_embed(ctx, command, registration_card(&record)).await?;
        }
        RegisterOutcome::CharacterNotFound => {
            let text = format!(
                "Could not find character '{}' on '{}' ({}). Check the name and realm.",
                character.name, character.realm, character.region
            );
            followup_ephemeral(ctx, command, &text).await?;
        }
    }

    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("register")
        .description("Link your Raider.IO character")
        .create_option(|option| region_option(option, true))
        .create_option(|option| realm_option(option, true))
        .create_option(|option| name_option(option, true))
}
