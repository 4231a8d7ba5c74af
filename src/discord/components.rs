//! Group finder button presses

use serenity::client::Context;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::id::ChannelId;
use tracing::{debug, error, warn};

use crate::discord::embeds::{session_buttons, session_embed};
use crate::error::KeymasterError;
use crate::lfg::{ButtonAction, LfgButtonId, PressOutcome, SessionView};
use crate::service::AppState;

/// Private reply for a press that changes nothing, or `None` to redraw the post
pub fn press_notice(outcome: &PressOutcome) -> Option<String> {
    match outcome {
        PressOutcome::SlotTaken { role } => Some(format!("The {} slot is already taken.", role)),
        PressOutcome::SessionClosed => Some("This group is closed.".to_string()),
        PressOutcome::Joined { .. } | PressOutcome::Left { .. } => None,
    }
}

/// Private reply for a domain failure
pub fn failure_notice(error: &anyhow::Error) -> String {
    match error.downcast_ref::<KeymasterError>() {
        Some(KeymasterError::SessionNotFound { .. }) => {
            "This group is no longer active.".to_string()
        }
        Some(KeymasterError::NotSessionOwner { .. }) => {
            "Only the group leader can close it.".to_string()
        }
        Some(KeymasterError::SessionClosed { .. }) => "This group is already closed.".to_string(),
        _ => format!("Something went wrong: {:#}", error),
    }
}

pub async fn handle(ctx: &Context, component: &MessageComponentInteraction, state: &AppState) {
    let custom_id = component.data.custom_id.as_str();
    if !LfgButtonId::matches(custom_id) {
        debug!("Ignoring component {}", custom_id);
        return;
    }

    let button: LfgButtonId = match custom_id.parse() {
        Ok(button) => button,
        Err(e) => {
            warn!("Bad button id from {}: {}", component.user.id, e);
            return;
        }
    };
    let user = component.user.id.0;

    let result = match button.action {
        ButtonAction::Join(role) => match state.lfg().press(button.message_id, user, role).await {
            Ok(reply) => match press_notice(&reply.outcome) {
                Some(notice) => reply_ephemeral(ctx, component, &notice).await,
                None => {
                    let updated = redraw(ctx, component, &reply.view).await;
                    if let Some(text) = &reply.announcement {
                        announce(ctx, component.channel_id, text).await;
                    }
                    updated
                }
            },
            Err(e) => reply_ephemeral(ctx, component, &failure_notice(&e)).await,
        },
        ButtonAction::Close => match state.lfg().close(button.message_id, user).await {
            Ok(view) => redraw(ctx, component, &view).await,
            Err(e) => reply_ephemeral(ctx, component, &failure_notice(&e)).await,
        },
    };

    if let Err(why) = result {
        error!("Cannot respond to button {}: {}", custom_id, why);
    }
}

/// Replace the post's embed and buttons in place
async fn redraw(
    ctx: &Context,
    component: &MessageComponentInteraction,
    view: &SessionView,
) -> serenity::Result<()> {
    component
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::UpdateMessage)
                .interaction_response_data(|message| {
                    message
                        .set_embed(session_embed(view))
                        .components(|components| session_buttons(components, view))
                })
        })
        .await
}

async fn reply_ephemeral(
    ctx: &Context,
    component: &MessageComponentInteraction,
    text: &str,
) -> serenity::Result<()> {
    component
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(text).ephemeral(true))
        })
        .await
}

async fn announce(ctx: &Context, channel: ChannelId, text: &str) {
    if let Err(why) = channel.say(&ctx.http, text).await {
        warn!("Failed to announce full group in {}: {}", channel, why);
    }
}
