use serenity::{
    builder::CreateApplicationCommand,
    model::application::interaction::{
        application_command::ApplicationCommandInteraction, InteractionResponseType,
    },
    prelude::Context,
};
use tracing::debug;

use super::CommandError;

pub const HELP_TEXT: &str = "KeyMaster features:\n\
- /register: link your Raider.IO character\n\
- /me, /check: character card with score, item level and best runs\n\
- /update: refresh your character and see your progress\n\
- /weekly: great vault progress for this week\n\
- /top: the guild leaderboard\n\
- /affixes: this week's affixes\n\
- /lfg: post a group for a key with Tank, Healer and DPS buttons\n\
- Press your role again to leave; the leader can close the group\n\
- Groups survive bot restarts";

pub async fn run(ctx: &Context, command: &ApplicationCommandInteraction) -> Result<(), CommandError> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::DeferredChannelMessageWithSource)
                .interaction_response_data(|message| message.ephemeral(true))
        })
        .await?;

    let notice = match command
        .user
        .direct_message(ctx, |message| message.content(HELP_TEXT))
        .await
    {
        Ok(_) => "Sent you the feature list in direct messages!",
        Err(why) => {
            debug!("Cannot DM {}: {}", command.user.id, why);
            "Could not send you a direct message. Allow DMs from server members and try again."
        }
    };

    command
        .edit_original_interaction_response(&ctx.http, |message| message.content(notice))
        .await?;
    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("helpme")
        .description("Get a feature summary in your direct messages")
}
