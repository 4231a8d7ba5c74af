//! Slash commands
//!
//! Every command module exposes `register`, which describes the command to
//! Discord, and `run`, which answers one invocation.

use serenity::builder::{CreateApplicationCommandOption, CreateApplicationCommands, CreateEmbed};
use serenity::client::Context;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandDataOption, CommandDataOptionValue,
};
use serenity::model::application::interaction::InteractionResponseType;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::error::KeymasterError;
use crate::service::AppState;
use crate::types::{CharacterRef, Region};

pub mod affixes;
pub mod check;
pub mod helpme;
pub mod lfg;
pub mod me;
pub mod ping;
pub mod register;
pub mod top;
pub mod update;
pub mod weekly;

pub const NOT_REGISTERED: &str =
    "You are not registered. Use `/register` to link your character first.";

const STORAGE_UNAVAILABLE: &str = "The bot's database is unavailable right now, please try again later.";

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Option not found: {0}")]
    OptionNotFound(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Discord error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("{0:#}")]
    Domain(#[from] anyhow::Error),

    #[error("Command not implemented: {0}")]
    NotImplemented(String),
}

impl CommandError {
    /// Text shown to the invoking user
    pub fn user_message(&self) -> String {
        match self {
            CommandError::OptionNotFound(_) | CommandError::InvalidOption(_) => self.to_string(),
            CommandError::Domain(e) => match e.downcast_ref::<KeymasterError>() {
                Some(KeymasterError::NotRegistered { .. }) => NOT_REGISTERED.to_string(),
                Some(KeymasterError::RankingUnavailable { .. }) => format!(
                    "Raider.IO is not responding right now, please try again later. ({})",
                    e
                ),
                Some(
                    KeymasterError::RankingRequestFailed { .. }
                    | KeymasterError::MalformedResponse { .. },
                ) => format!("Something went wrong while talking to Raider.IO: {:#}", e),
                Some(KeymasterError::StorageError { .. }) => STORAGE_UNAVAILABLE.to_string(),
                _ if e.downcast_ref::<sqlx::Error>().is_some() => STORAGE_UNAVAILABLE.to_string(),
                _ => format!("Something went wrong: {:#}", e),
            },
            _ => format!("Something went wrong: {}", self),
        }
    }

    /// Failures caused by how the command was used rather than by the bot
    pub fn is_user_error(&self) -> bool {
        match self {
            CommandError::OptionNotFound(_) | CommandError::InvalidOption(_) => true,
            CommandError::Domain(e) => matches!(
                e.downcast_ref::<KeymasterError>(),
                Some(KeymasterError::NotRegistered { .. } | KeymasterError::InvalidInput { .. })
            ),
            _ => false,
        }
    }
}

macro_rules! get_option {
    ($kind:ident, $rt:ty, $name:ident) => {
        pub fn $name<'a>(
            options: &'a [CommandDataOption],
            name: &str,
        ) -> Result<Option<&'a $rt>, CommandError> {
            let Some(option) = options.iter().find(|option| option.name == name) else {
                return Ok(None);
            };

            match option.resolved.as_ref() {
                Some(CommandDataOptionValue::$kind(value)) => Ok(Some(value)),
                Some(_) => Err(CommandError::InvalidOption(format!(
                    "'{}' has the wrong type",
                    name
                ))),
                None => Ok(None),
            }
        }
    };
}

get_option!(String, String, get_option_string);

get_option!(Integer, i64, get_option_integer);

pub fn required<T>(value: Option<T>, name: &str) -> Result<T, CommandError> {
    value.ok_or_else(|| CommandError::OptionNotFound(format!("'{}' was not provided", name)))
}

/// Build a character reference from name, realm and region options.
///
/// All three must be given together; none at all yields `None`.
pub fn parse_character(
    name: Option<&str>,
    realm: Option<&str>,
    region: Option<&str>,
) -> Result<Option<CharacterRef>, CommandError> {
    fn clean(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|value| !value.is_empty())
    }

    match (clean(name), clean(realm), clean(region)) {
        (None, None, None) => Ok(None),
        (Some(name), Some(realm), Some(region)) => {
            let region: Region = region
                .parse()
                .map_err(|_| CommandError::InvalidOption(format!("unknown region '{}'", region)))?;
            Ok(Some(CharacterRef::new(name, realm.to_lowercase(), region)))
        }
        _ => Err(CommandError::InvalidOption(
            "name, realm and region must be given together".to_string(),
        )),
    }
}

/// Read the name/realm/region triple from an invocation
pub fn character_options(options: &[CommandDataOption]) -> Result<Option<CharacterRef>, CommandError> {
    parse_character(
        get_option_string(options, "name")?.map(String::as_str),
        get_option_string(options, "realm")?.map(String::as_str),
        get_option_string(options, "region")?.map(String::as_str),
    )
}

pub fn name_option(
    option: &mut CreateApplicationCommandOption,
    required: bool,
) -> &mut CreateApplicationCommandOption {
    option
        .name("name")
        .description("Character name")
        .kind(CommandOptionType::String)
        .required(required)
}

/// Realm slug, completed from the realm table
pub fn realm_option(
    option: &mut CreateApplicationCommandOption,
    required: bool,
) -> &mut CreateApplicationCommandOption {
    option
        .name("realm")
        .description("Character realm")
        .kind(CommandOptionType::String)
        .required(required)
        .set_autocomplete(true)
}

pub fn region_option(
    option: &mut CreateApplicationCommandOption,
    required: bool,
) -> &mut CreateApplicationCommandOption {
    option
        .name("region")
        .description("Character region")
        .kind(CommandOptionType::String)
        .required(required);
    for region in Region::ALL {
        option.add_string_choice(region.label(), region.slug());
    }
    option
}

pub fn register_all(commands: &mut CreateApplicationCommands) -> &mut CreateApplicationCommands {
    commands
        .create_application_command(|command| ping::register(command))
        .create_application_command(|command| register::register(command))
        .create_application_command(|command| me::register(command))
        .create_application_command(|command| check::register(command))
        .create_application_command(|command| top::register(command))
        .create_application_command(|command| update::register(command))
        .create_application_command(|command| weekly::register(command))
        .create_application_command(|command| lfg::register(command))
        .create_application_command(|command| affixes::register(command))
        .create_application_command(|command| helpme::register(command))
}

pub async fn dispatch(ctx: &Context, command: &ApplicationCommandInteraction, state: &AppState) {
    let name = command.data.name.as_str();
    debug!("/{} invoked by {}", name, command.user.id);

    let timer = state.metrics().start_timer();
    let result = match name {
        "ping" => ping::run(ctx, command).await,
        "register" => register::run(ctx, command, state).await,
        "me" => me::run(ctx, command, state).await,
        "check" => check::run(ctx, command, state).await,
        "top" => top::run(ctx, command, state).await,
        "update" => update::run(ctx, command, state).await,
        "weekly" => weekly::run(ctx, command, state).await,
        "lfg" => lfg::run(ctx, command, state).await,
        "affixes" => affixes::run(ctx, command, state).await,
        "helpme" => helpme::run(ctx, command).await,
        other => Err(CommandError::NotImplemented(other.to_string())),
    };
    state
        .metrics()
        .record_command(name, result.is_ok(), timer.stop());

    if let Err(err) = result {
        if err.is_user_error() {
            debug!("/{} rejected: {}", name, err);
        } else {
            error!("/{} failed: {}", name, err);
        }
        report_error(ctx, command, &err.user_message()).await;
    }
}

/// Tell the user about a failure, whether or not the interaction was acknowledged
async fn report_error(ctx: &Context, command: &ApplicationCommandInteraction, text: &str) {
    if send_ephemeral(ctx, command, text).await.is_ok() {
        return;
    }
    if let Err(why) = followup_ephemeral(ctx, command, text).await {
        warn!("Cannot respond to slash command: {}", why);
    }
}

pub async fn send_ephemeral(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    text: &str,
) -> serenity::Result<()> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(text).ephemeral(true))
        })
        .await
}

pub async fn send_embed(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    embed: CreateEmbed,
) -> serenity::Result<()> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.add_embed(embed))
        })
        .await
}

/// Acknowledge now and answer with a followup once the slow work is done
pub async fn defer(ctx: &Context, command: &ApplicationCommandInteraction) -> serenity::Result<()> {
    command.defer(&ctx.http).await
}

/// Replace the public "thinking" placeholder with a private notice
pub async fn followup_ephemeral(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    text: &str,
) -> serenity::Result<()> {
    if let Err(why) = command.delete_original_interaction_response(&ctx.http).await {
        debug!("No deferred response to remove: {}", why);
    }
    command
        .create_followup_message(&ctx.http, |message| message.content(text).ephemeral(true))
        .await?;
    Ok(())
}

pub async fn followup_embed(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    embed: CreateEmbed,
) -> serenity::Result<()> {
    command
        .create_followup_message(&ctx.http, |message| message.add_embed(embed))
        .await?;
    Ok(())
}
