//! Fixed game data offered through autocomplete and used for embed colors

/// Autocomplete never offers more than Discord accepts
pub const MAX_CHOICES: usize = 25;

/// Popular realms as (display name, Raider.IO slug)
pub const REALMS: &[(&str, &str)] = &[
    ("Гордунни", "gordunni"),
    ("Ревущий фьорд", "howling-fjord"),
    ("Свежеватель Душ", "soulflayer"),
    ("Азурегос", "azuregos"),
    ("Борейская тундра", "borean-tundra"),
    ("Вечная Песня", "eversong"),
    ("Галакронд", "galakrond"),
    ("Голдринн", "goldrinn"),
    ("Гром", "grom"),
    ("Король-лич", "lich-king"),
    ("Пиратская Бухта", "booty-bay"),
    ("Подземье", "deepholm"),
    ("Страж Смерти", "deathguard"),
    ("Термоштепсель", "thermaplugg"),
    ("Фордрагон", "fordragon"),
    ("Черный Шрам", "blackscar"),
    ("Draenor", "draenor"),
    ("Kazzak", "kazzak"),
    ("Tarren Mill", "tarren-mill"),
    ("Silvermoon", "silvermoon"),
    ("Twisting Nether", "twisting-nether"),
    ("Ravencrest", "ravencrest"),
    ("Area 52", "area-52"),
    ("Illidan", "illidan"),
    ("Stormrage", "stormrage"),
];

/// Dungeons in the current keystone rotation
pub const DUNGEONS: &[&str] = &[
    "Ara-Kara, City of Echoes",
    "Priory of the Sacred Flame",
    "The Dawnbreaker",
    "Halls of Atonement",
    "Tazavesh: Streets of Wonder",
    "Tazavesh: So'leah's Gambit",
    "Operation: Floodgate",
    "Eco-Dome Al'dani",
];

const CLASS_COLORS: &[(&str, u32)] = &[
    ("Death Knight", 0xC41E3A),
    ("Demon Hunter", 0xA330C9),
    ("Druid", 0xFF7C0A),
    ("Evoker", 0x33937F),
    ("Hunter", 0xAAD372),
    ("Mage", 0x3FC7EB),
    ("Monk", 0x00FF98),
    ("Paladin", 0xF48CBA),
    ("Priest", 0xFFFFFF),
    ("Rogue", 0xFFF468),
    ("Shaman", 0x0070DE),
    ("Warlock", 0x8788EE),
    ("Warrior", 0xC69B6D),
];

pub const DEFAULT_CLASS_COLOR: u32 = 0x808080;

/// Realms whose display name or slug contains `query`, case-insensitively
pub fn realm_choices(query: &str) -> Vec<(&'static str, &'static str)> {
    let query = query.trim().to_lowercase();
    REALMS
        .iter()
        .filter(|(name, slug)| name.to_lowercase().contains(&query) || slug.contains(&query))
        .take(MAX_CHOICES)
        .copied()
        .collect()
}

pub fn dungeon_choices(query: &str) -> Vec<&'static str> {
    let query = query.trim().to_lowercase();
    DUNGEONS
        .iter()
        .filter(|dungeon| dungeon.to_lowercase().contains(&query))
        .take(MAX_CHOICES)
        .copied()
        .collect()
}

/// Display name for a realm slug, falling back to the slug itself
pub fn realm_name(slug: &str) -> &str {
    REALMS
        .iter()
        .find(|(_, known)| *known == slug)
        .map(|(name, _)| *name)
        .unwrap_or(slug)
}

pub fn class_color(class: Option<&str>) -> u32 {
    class
        .and_then(|class| CLASS_COLORS.iter().find(|(name, _)| *name == class))
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_CLASS_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realm_choices_match_name_or_slug() {
        let by_slug = realm_choices("gord");
        assert_eq!(by_slug, vec![("Гордунни", "gordunni")]);

        let by_name = realm_choices("гордун");
        assert_eq!(by_name, vec![("Гордунни", "gordunni")]);

        let mixed_case = realm_choices("TARREN");
        assert_eq!(mixed_case, vec![("Tarren Mill", "tarren-mill")]);
    }

    #[test]
    fn test_empty_query_is_capped() {
        assert_eq!(realm_choices("").len(), REALMS.len().min(MAX_CHOICES));
        assert_eq!(dungeon_choices("").len(), DUNGEONS.len());
    }

    #[test]
    fn test_dungeon_choices() {
        assert_eq!(
            dungeon_choices("tazavesh"),
            vec!["Tazavesh: Streets of Wonder", "Tazavesh: So'leah's Gambit"]
        );
        assert!(dungeon_choices("molten core").is_empty());
    }

    #[test]
    fn test_lookups() {
        assert_eq!(realm_name("howling-fjord"), "Ревущий фьорд");
        assert_eq!(realm_name("unknown-realm"), "unknown-realm");
        assert_eq!(class_color(Some("Shaman")), 0x0070DE);
        assert_eq!(class_color(Some("Bard")), DEFAULT_CLASS_COLOR);
        assert_eq!(class_color(None), DEFAULT_CLASS_COLOR);
    }
}
