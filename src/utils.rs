//! Utility functions shared by the command handlers and services

use chrono::{DateTime, Utc};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Tier marker for a Raider.IO score
pub fn score_emoji(score: f64) -> &'static str {
    if score < 1500.0 {
        "🟢"
    } else if score < 2000.0 {
        "🔵"
    } else if score < 2500.0 {
        "🟣"
    } else {
        "🟠"
    }
}

/// Format a score the way Raider.IO shows it (one decimal, trailing zero dropped)
pub fn format_score(score: f64) -> String {
    let rounded = (score * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded)
    }
}

/// Discord mention markup for a user
pub fn mention(user_id: u64) -> String {
    format!("<@{}>", user_id)
}

/// Medal prefix for a leaderboard position (0-based)
pub fn medal(position: usize) -> String {
    match position {
        0 => "🥇".to_string(),
        1 => "🥈".to_string(),
        2 => "🥉".to_string(),
        n => format!("{}.", n + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_emoji_tiers() {
        assert_eq!(score_emoji(0.0), "🟢");
        assert_eq!(score_emoji(1499.9), "🟢");
        assert_eq!(score_emoji(1500.0), "🔵");
        assert_eq!(score_emoji(2000.0), "🟣");
        assert_eq!(score_emoji(2500.0), "🟠");
        assert_eq!(score_emoji(3200.0), "🟠");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(3200.0), "3200");
        assert_eq!(format_score(3212.46), "3212.5");
        assert_eq!(format_score(0.0), "0");
    }

    #[test]
    fn test_medals() {
        assert_eq!(medal(0), "🥇");
        assert_eq!(medal(2), "🥉");
        assert_eq!(medal(3), "4.");
        assert_eq!(mention(42), "<@42>");
    }
}
