use serenity::{
    builder::CreateApplicationCommand,
    model::application::interaction::application_command::ApplicationCommandInteraction,
    prelude::Context,
};

use super::{defer, followup_embed, followup_ephemeral, CommandError};
use crate::discord::embeds::leaderboard_card;
use crate::service::AppState;

const LEADERBOARD_SIZE: u32 = 10;

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    state: &AppState,
) -> Result<(), CommandError> {
    defer(ctx, command).await?;

    let records = state.profiles().leaderboard(LEADERBOARD_SIZE).await?;
    if records.is_empty() {
        followup_ephemeral(
            ctx,
            command,
            "The leaderboard is empty. Register with `/register`!",
        )
        .await?;
        return Ok(());
    }

    followup_embed(ctx, command, leaderboard_card(&records)).await?;
    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("top")
        .description("Show the highest rated registered players")
}
