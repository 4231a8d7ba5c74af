//! Embed and button construction for command replies and group posts

use serenity::builder::{CreateComponents, CreateEmbed};
use serenity::model::application::component::ButtonStyle;
use serenity::model::channel::ReactionType;

use crate::discord::catalog::{class_color, realm_name};
use crate::lfg::{LfgButtonId, SessionView};
use crate::ranking::{AffixSchedule, CharacterProfile};
use crate::service::UpdateOutcome;
use crate::storage::UserRecord;
use crate::types::{CharacterRef, Role};
use crate::utils::{format_score, medal, score_emoji};

pub const COLOR_SUCCESS: u32 = 0x2ECC71;
pub const COLOR_INFO: u32 = 0x3498DB;
pub const COLOR_GOLD: u32 = 0xF1C40F;

/// Runs shown on a character card
const CARD_RUNS: usize = 5;
/// Weekly runs that count towards the vault
pub const VAULT_RUNS: usize = 8;

pub fn best_runs_text(profile: &CharacterProfile) -> String {
    let runs = profile.top_runs(CARD_RUNS);
    if runs.is_empty() {
        return "No runs recorded this season.".to_string();
    }
    runs.iter()
        .map(|run| {
            format!(
                "+{} {} ({})",
                run.mythic_level,
                run.dungeon,
                run.upgrade_stars()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn weekly_text(profile: &CharacterProfile) -> String {
    let runs = profile.weekly_runs(VAULT_RUNS);
    if runs.is_empty() {
        return "No keys completed this week yet.".to_string();
    }
    runs.iter()
        .enumerate()
        .map(|(i, run)| format!("{}. +{} {}", i + 1, run.mythic_level, run.dungeon))
        .collect::<Vec<_>>()
        .join("\n")
}

/// "x/8" style vault progress
pub fn vault_footer(profile: &CharacterProfile) -> String {
    let done = profile.mythic_plus_weekly_highest_level_runs.len();
    format!("Keys completed: {}/{}", done.min(VAULT_RUNS), VAULT_RUNS)
}

pub fn leaderboard_line(position: usize, record: &UserRecord) -> (String, String) {
    let class = record.character_class.as_deref().unwrap_or("Unknown");
    (
        format!("{} {} {}", medal(position), class, record.character_name),
        format!(
            "Realm: {}, Score: {}",
            realm_name(&record.realm_slug),
            format_score(record.rio_score)
        ),
    )
}

/// Score field text; a profile without a season score shows a dash
fn score_text(score: Option<f64>) -> String {
    match score {
        Some(score) => format!("{} **{}**", score_emoji(score), format_score(score)),
        None => "—".to_string(),
    }
}

pub fn character_card(profile: &CharacterProfile) -> CreateEmbed {
    let mut embed = CreateEmbed::default();
    let class = profile.class.as_deref().unwrap_or("Unknown");
    let guild = profile.guild_name().unwrap_or("No guild");

    embed
        .title(format!("{} ({}) - {}", profile.name, class, guild))
        .color(class_color(profile.class.as_deref()))
        .field("Raider.IO Score", score_text(profile.current_score()), true)
        .field(
            "Item Level",
            profile
                .item_level()
                .map(|ilvl| format!("{:.0}", ilvl))
                .unwrap_or_else(|| "—".to_string()),
            true,
        )
        .field("🏆 Best runs", best_runs_text(profile), false);

    if let Some(url) = &profile.profile_url {
        embed.description(format!("[Raider.IO profile]({})", url)).url(url);
    }
    if let Some(thumbnail) = &profile.thumbnail_url {
        embed.thumbnail(thumbnail);
    }
    embed
}

pub fn registration_card(record: &UserRecord) -> CreateEmbed {
    let mut embed = CreateEmbed::default();
    embed
        .title("Registration complete!")
        .color(COLOR_SUCCESS)
        .field("Character", record.character().to_string(), false)
        .field(
            "Score",
            format!(
                "{} {}",
                score_emoji(record.rio_score),
                format_score(record.rio_score)
            ),
            true,
        );
    if let Some(ilvl) = record.item_level {
        embed.field("Item Level", format!("{:.0}", ilvl), true);
    }
    if let Some(thumbnail) = &record.thumbnail_url {
        embed.thumbnail(thumbnail);
    }
    embed
}

/// Card for a successful `/update`; `None` for the other outcomes
pub fn update_card(outcome: &UpdateOutcome) -> Option<CreateEmbed> {
    let UpdateOutcome::Updated { previous, current } = outcome else {
        return None;
    };

    let mut embed = CreateEmbed::default();
    embed
        .title("✅ Profile updated!")
        .color(COLOR_SUCCESS)
        .field(
            "Score",
            format!(
                "{} ➡️ {}",
                format_score(previous.rio_score),
                format_score(current.rio_score)
            ),
            false,
        );
    if outcome.improved() {
        embed.field("Progress", "📈 Congratulations on the progress!", false);
    }
    Some(embed)
}

pub fn weekly_card(character: &CharacterRef, profile: &CharacterProfile) -> CreateEmbed {
    let mut embed = CreateEmbed::default();
    embed
        .title(format!("🎁 Weekly progress for {}", character.name))
        .color(COLOR_INFO)
        .description(weekly_text(profile));
    if !profile.mythic_plus_weekly_highest_level_runs.is_empty() {
        embed.footer(|footer| footer.text(vault_footer(profile)));
    }
    embed
}

pub fn leaderboard_card(records: &[UserRecord]) -> CreateEmbed {
    let mut embed = CreateEmbed::default();
    embed.title("🏆 Top players").color(COLOR_GOLD);
    for (position, record) in records.iter().enumerate() {
        let (name, value) = leaderboard_line(position, record);
        embed.field(name, value, false);
    }
    embed
}

pub fn affixes_card(schedule: &AffixSchedule, region_label: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::default();
    embed
        .title(&schedule.title)
        .color(COLOR_INFO)
        .description(format!("Affixes active for region {}", region_label));
    for affix in &schedule.affix_details {
        let description = affix
            .description
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or("—");
        embed.field(&affix.name, description, false);
    }
    embed.footer(|footer| footer.text("Source: Raider.IO"));
    embed
}

pub fn session_embed(view: &SessionView) -> CreateEmbed {
    let mut embed = CreateEmbed::default();
    embed
        .title(view.title())
        .description(view.description())
        .color(view.color());
    for (name, value) in view.fields() {
        embed.field(name, value, true);
    }
    embed.footer(|footer| footer.text(view.footer()));
    embed
}

fn role_style(role: Role) -> ButtonStyle {
    match role {
        Role::Tank => ButtonStyle::Primary,
        Role::Healer => ButtonStyle::Success,
        Role::Dps => ButtonStyle::Danger,
    }
}

/// Role buttons on the first row, the leader's close button on the second
pub fn session_buttons<'a>(
    components: &'a mut CreateComponents,
    view: &SessionView,
) -> &'a mut CreateComponents {
    let disabled = !view.buttons_enabled();
    let message_id = view.message_id;

    components
        .create_action_row(|row| {
            for role in Role::ALL {
                row.create_button(|button| {
                    button
                        .custom_id(LfgButtonId::join(message_id, role))
                        .label(role.label())
                        .emoji(ReactionType::Unicode(role.icon().to_string()))
                        .style(role_style(role))
                        .disabled(disabled)
                });
            }
            row
        })
        .create_action_row(|row| {
            row.create_button(|button| {
                button
                    .custom_id(LfgButtonId::close(message_id))
                    .label("Close group")
                    .style(ButtonStyle::Secondary)
                    .disabled(disabled)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::DungeonRun;
    use crate::types::Region;
    use chrono::Utc;

    fn run(dungeon: &str, level: u32, upgrades: u32, score: f64) -> DungeonRun {
        DungeonRun {
            dungeon: dungeon.to_string(),
            short_name: None,
            mythic_level: level,
            num_keystone_upgrades: upgrades,
            score,
            completed_at: None,
            url: None,
        }
    }

    fn profile(best: Vec<DungeonRun>, weekly: Vec<DungeonRun>) -> CharacterProfile {
        CharacterProfile {
            name: "Thrall".to_string(),
            class: Some("Shaman".to_string()),
            active_spec_name: None,
            race: None,
            region: None,
            realm: None,
            thumbnail_url: None,
            profile_url: None,
            gear: None,
            guild: None,
            mythic_plus_scores_by_season: Vec::new(),
            mythic_plus_best_runs: best,
            mythic_plus_weekly_highest_level_runs: weekly,
        }
    }

    #[test]
    fn test_best_runs_sorted_and_capped() {
        let runs = (0..7)
            .map(|i| run("The Dawnbreaker", 10 + i, i % 4, 300.0 + i as f64))
            .collect();
        let text = best_runs_text(&profile(runs, Vec::new()));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "+16 The Dawnbreaker (⭐⭐)");
        assert_eq!(lines[4], "+12 The Dawnbreaker (⭐⭐)");

        assert_eq!(
            best_runs_text(&profile(Vec::new(), Vec::new())),
            "No runs recorded this season."
        );
    }

    #[test]
    fn test_weekly_text_and_footer() {
        let weekly: Vec<_> = (0..10)
            .map(|i| run("Halls of Atonement", 15 - i, 1, 0.0))
            .collect();
        let p = profile(Vec::new(), weekly);
        let text = weekly_text(&p);
        assert_eq!(text.lines().count(), 8);
        assert!(text.starts_with("1. +15 Halls of Atonement"));
        assert_eq!(vault_footer(&p), "Keys completed: 8/8");

        let p = profile(Vec::new(), vec![run("Halls of Atonement", 12, 1, 0.0)]);
        assert_eq!(vault_footer(&p), "Keys completed: 1/8");
        assert_eq!(
            weekly_text(&profile(Vec::new(), Vec::new())),
            "No keys completed this week yet."
        );
    }

    #[test]
    fn test_leaderboard_line() {
        let record = UserRecord {
            user_id: 1,
            character_name: "Thrall".to_string(),
            realm_slug: "gordunni".to_string(),
            region: Region::Eu,
            rio_score: 3200.0,
            character_class: Some("Shaman".to_string()),
            thumbnail_url: None,
            item_level: Some(620.0),
            last_updated: Utc::now(),
        };
        let (name, value) = leaderboard_line(0, &record);
        assert_eq!(name, "🥇 Shaman Thrall");
        assert_eq!(value, "Realm: Гордунни, Score: 3200");

        let (name, _) = leaderboard_line(4, &record);
        assert!(name.starts_with("5."));
    }

    #[test]
    fn test_score_text() {
        assert_eq!(score_text(Some(2750.0)), "🟠 **2750**");
        assert_eq!(score_text(None), "—");
    }
}
