use serenity::{
    builder::CreateApplicationCommand,
    model::application::interaction::application_command::ApplicationCommandInteraction,
    prelude::Context,
};

use super::{defer, followup_embed, followup_ephemeral, CommandError};
use crate::discord::embeds::affixes_card;
use crate::service::AppState;
use crate::types::Region;

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    state: &AppState,
) -> Result<(), CommandError> {
    defer(ctx, command).await?;

    let region = Region::Eu;
    match state.profiles().affixes(region).await? {
        Some(schedule) => {
            followup_embed(ctx, command, affixes_card(&schedule, region.label())).await?
        }
        None => followup_ephemeral(ctx, command, "Could not fetch this week's affixes.").await?,
    }

    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("affixes")
        .description("Show this week's keystone affixes")
}
