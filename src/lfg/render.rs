//! Platform-neutral rendering of a session
//!
//! The Discord layer turns a [`SessionView`] into an embed; keeping the text
//! here lets it be tested without a gateway connection.

use crate::lfg::session::{LfgListing, LfgSession, SessionState};
use crate::types::{CharacterStats, ChannelId, MessageId, Role, UserId};
use crate::utils::{format_score, mention, score_emoji};

pub const COLOR_OPEN: u32 = 0xF1C40F;
pub const COLOR_COMPLETE: u32 = 0x2ECC71;
pub const COLOR_CLOSED: u32 = 0x95A5A6;

/// An occupant and whatever stats are known for them
#[derive(Debug, Clone, PartialEq)]
pub struct RosterLine {
    pub user_id: UserId,
    pub stats: Option<CharacterStats>,
}

impl RosterLine {
    pub fn render(&self) -> String {
        match self.stats {
            Some(stats) => {
                let mut line = format!(
                    "{} · {} {}",
                    mention(self.user_id),
                    score_emoji(stats.score),
                    format_score(stats.score)
                );
                if let Some(ilvl) = stats.item_level {
                    line.push_str(&format!(" · ilvl {:.0}", ilvl));
                }
                line
            }
            None => mention(self.user_id),
        }
    }
}

/// Everything needed to draw a session message
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub owner_id: UserId,
    pub listing: LfgListing,
    pub state: SessionState,
    pub tank: Option<RosterLine>,
    pub healer: Option<RosterLine>,
    pub dps: Vec<RosterLine>,
}

impl SessionView {
    /// Build a view, looking up stats for each occupant with `stats_for`
    pub fn build<F>(session: &LfgSession, mut stats_for: F) -> Self
    where
        F: FnMut(UserId) -> Option<CharacterStats>,
    {
        let slots = session.slots();
        let mut line = |user_id: UserId| RosterLine {
            user_id,
            stats: stats_for(user_id),
        };

        Self {
            message_id: session.message_id,
            channel_id: session.channel_id,
            owner_id: session.owner_id,
            listing: session.listing.clone(),
            state: session.state(),
            tank: slots.tank().map(&mut line),
            healer: slots.healer().map(&mut line),
            dps: slots.dps().iter().copied().map(&mut line).collect(),
        }
    }

    pub fn color(&self) -> u32 {
        match self.state {
            SessionState::Open => COLOR_OPEN,
            SessionState::Complete => COLOR_COMPLETE,
            SessionState::Closed => COLOR_CLOSED,
        }
    }

    pub fn title(&self) -> String {
        match self.state {
            SessionState::Closed => format!("{} (closed)", self.listing.title()),
            _ => self.listing.title(),
        }
    }

    pub fn description(&self) -> String {
        let mut text = format!("Leader: {}", mention(self.owner_id));
        if let Some(note) = &self.listing.note {
            text.push_str(&format!("\n{}", note));
        }
        text
    }

    pub fn lines(&self, role: Role) -> Vec<&RosterLine> {
        match role {
            Role::Tank => self.tank.iter().collect(),
            Role::Healer => self.healer.iter().collect(),
            Role::Dps => self.dps.iter().collect(),
        }
    }

    /// One (name, value) pair per role, ready for embed fields
    pub fn fields(&self) -> Vec<(String, String)> {
        Role::ALL
            .iter()
            .map(|role| {
                let lines = self.lines(*role);
                let name = format!(
                    "{} {} ({}/{})",
                    role.icon(),
                    role.label(),
                    lines.len(),
                    role.capacity()
                );
                let value = if lines.is_empty() {
                    "Empty".to_string()
                } else {
                    lines
                        .iter()
                        .map(|line| line.render())
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                (name, value)
            })
            .collect()
    }

    pub fn filled(&self) -> usize {
        self.tank.is_some() as usize + self.healer.is_some() as usize + self.dps.len()
    }

    pub fn footer(&self) -> String {
        match self.state {
            SessionState::Open => format!("{}/5 players", self.filled()),
            SessionState::Complete => "Group is full".to_string(),
            SessionState::Closed => "Group closed by the leader".to_string(),
        }
    }

    /// Controls stay live until the leader closes the group
    pub fn buttons_enabled(&self) -> bool {
        self.state != SessionState::Closed
    }

    /// One-time message posted when the roster fills
    pub fn announcement(&self) -> String {
        let mut text = format!("🎉 Group for **{}** is full!", self.listing.title());
        for role in Role::ALL {
            for line in self.lines(role) {
                text.push_str(&format!("\n{} {}", role.icon(), mention(line.user_id)));
            }
        }
        text
    }
}
