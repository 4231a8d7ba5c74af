use serenity::{
    builder::CreateApplicationCommand,
    model::application::interaction::application_command::ApplicationCommandInteraction,
    prelude::Context,
};

use super::{
    character_options, defer, followup_embed, followup_ephemeral, name_option, realm_option,
    region_option, CommandError, NOT_REGISTERED,
};
use crate::discord::embeds::weekly_card;
use crate::service::{AppState, ProfileLookup};

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    state: &AppState,
) -> Result<(), CommandError> {
    // Validated before deferring so a bad combination gets a private reply
    let character = character_options(&command.data.options)?;

    defer(ctx, command).await?;

    match state
        .profiles()
        .weekly(command.user.id.0, character)
        .await?
    {
        ProfileLookup::Found { character, profile } => {
            followup_embed(ctx, command, weekly_card(&character, &profile)).await?
        }
        ProfileLookup::NotRegistered => followup_ephemeral(ctx, command, NOT_REGISTERED).await?,
        ProfileLookup::CharacterNotFound(character) => {
            let text = format!(
                "❌ Character **{}** on **{}** was not found.",
                character.name, character.realm
            );
            followup_ephemeral(ctx, command, &text).await?
        }
    }

    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("weekly")
        .description("Show great vault progress for this week")
        .create_option(|option| {
            name_option(option, false).description("Character name (leave empty for your own)")
        })
        .create_option(|option| {
            realm_option(option, false).description("Character realm (required with a name)")
        })
        .create_option(|option| {
            region_option(option, false).description("Character region (required with a name)")
        })
}
