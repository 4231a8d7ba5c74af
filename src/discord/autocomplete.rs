//! Autocomplete for realm and dungeon options

use serenity::client::Context;
use serenity::model::application::interaction::autocomplete::AutocompleteInteraction;
use tracing::warn;

use crate::discord::catalog::{dungeon_choices, realm_choices};

/// (name, value) choices for the focused option
pub fn choices_for(option: &str, query: &str) -> Vec<(String, String)> {
    match option {
        "realm" => realm_choices(query)
            .into_iter()
            .map(|(name, slug)| (name.to_string(), slug.to_string()))
            .collect(),
        "dungeon" => dungeon_choices(query)
            .into_iter()
            .map(|dungeon| (dungeon.to_string(), dungeon.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

pub async fn handle(ctx: &Context, interaction: &AutocompleteInteraction) {
    let Some(focused) = interaction.data.options.iter().find(|option| option.focused) else {
        return;
    };
    let query = focused
        .value
        .as_ref()
        .and_then(|value| value.as_str())
        .unwrap_or_default();
    let choices = choices_for(&focused.name, query);

    let result = interaction
        .create_autocomplete_response(&ctx.http, |response| {
            for (name, value) in &choices {
                response.add_string_choice(name, value);
            }
            response
        })
        .await;

    if let Err(why) = result {
        warn!(
            "Autocomplete for /{} failed: {}",
            interaction.data.name, why
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choices_for_options() {
        let realms = choices_for("realm", "fjord");
        assert_eq!(
            realms,
            vec![("Ревущий фьорд".to_string(), "howling-fjord".to_string())]
        );

        let dungeons = choices_for("dungeon", "halls");
        assert_eq!(dungeons[0].1, "Halls of Atonement");

        assert!(choices_for("note", "x").is_empty());
    }
}
