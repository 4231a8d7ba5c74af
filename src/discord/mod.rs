//! Discord gateway integration
//!
//! A single event handler registers the slash commands on connect and routes
//! every interaction to its command, button or autocomplete handler.

use anyhow::Context as _;
use serenity::client::{Context, EventHandler};
use serenity::model::application::command::Command;
use serenity::model::application::interaction::Interaction;
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::GatewayIntents;
use serenity::{async_trait, Client};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::service::AppState;

pub mod autocomplete;
pub mod catalog;
pub mod commands;
pub mod components;
pub mod embeds;

pub struct Handler {
    state: Arc<AppState>,
}

impl Handler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is connected", ready.user.name);

        let registered = match self.state.config().discord.guild_id {
            Some(guild) => GuildId(guild)
                .set_application_commands(&ctx.http, |commands| {
                    commands::register_all(commands)
                })
                .await
                .map(|commands| (commands.len(), format!("guild {}", guild))),
            None => Command::set_global_application_commands(&ctx.http, |commands| {
                commands::register_all(commands)
            })
            .await
            .map(|commands| (commands.len(), "all guilds".to_string())),
        };

        match registered {
            Ok((count, scope)) => info!("🔁 Registered {} slash commands for {}", count, scope),
            Err(e) => error!("❌ Failed to register slash commands: {}", e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::ApplicationCommand(command) => {
                commands::dispatch(&ctx, &command, &self.state).await
            }
            Interaction::MessageComponent(component) => {
                components::handle(&ctx, &component, &self.state).await
            }
            Interaction::Autocomplete(autocomplete) => {
                autocomplete::handle(&ctx, &autocomplete).await
            }
            other => debug!("Unhandled interaction {:?}", other.kind()),
        }
    }
}

/// Build the gateway client; only guild events are needed for interactions
pub async fn build_client(state: Arc<AppState>) -> Result<Client> {
    let token = state.config().discord.token.clone();
    let client = Client::builder(&token, GatewayIntents::GUILDS)
        .event_handler(Handler::new(state))
        .await
        .context("Failed to create Discord client")?;
    Ok(client)
}
