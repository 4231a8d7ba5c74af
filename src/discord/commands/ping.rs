use serenity::{
    builder::CreateApplicationCommand,
    model::application::interaction::{
        application_command::ApplicationCommandInteraction, InteractionResponseType,
    },
    prelude::Context,
};
use std::time::Instant;

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<(), crate::discord::commands::CommandError> {
    let started = Instant::now();
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content("Pong!"))
        })
        .await?;

    let latency = started.elapsed().as_millis();
    command
        .edit_original_interaction_response(&ctx.http, |message| {
            message.content(format!("Pong! Latency: {} ms", latency))
        })
        .await?;

    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command.name("ping").description("Check the bot's response time")
}
