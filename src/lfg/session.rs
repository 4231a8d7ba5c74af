//! Group finder session state machine
//!
//! One session per listing message. Presses toggle and move users between
//! roles; a full roster triggers a single announcement until a slot is
//! vacated again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KeymasterError, Result};
use crate::lfg::slots::RoleSlots;
use crate::storage::LfgRecord;
use crate::types::{ChannelId, MessageId, Role, UserId};

/// What the group is for; stored as the session snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfgListing {
    pub dungeon: String,
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LfgListing {
    pub fn new(dungeon: impl Into<String>, level: u32, note: Option<String>) -> Self {
        Self {
            dungeon: dungeon.into(),
            level,
            note: note.filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn title(&self) -> String {
        format!("+{} {}", self.level, self.dungeon)
    }

    pub fn to_snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_snapshot(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            KeymasterError::StorageError {
                message: format!("unreadable group snapshot: {}", e),
            }
            .into()
        })
    }
}

/// Visual state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Complete,
    Closed,
}

/// Result of one role button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// The user now holds `role`, having left `previous` if they held one
    Joined { role: Role, previous: Option<Role> },
    /// The user pressed the role they held and gave it up
    Left { role: Role },
    /// The role is full; nothing changed
    SlotTaken { role: Role },
    /// Presses on a closed session are ignored
    SessionClosed,
}

impl PressOutcome {
    /// Whether the slots changed and need persisting
    pub fn changed(&self) -> bool {
        matches!(self, PressOutcome::Joined { .. } | PressOutcome::Left { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            PressOutcome::Joined { .. } => "joined",
            PressOutcome::Left { .. } => "left",
            PressOutcome::SlotTaken { .. } => "slot_taken",
            PressOutcome::SessionClosed => "closed",
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            PressOutcome::Joined { role, .. }
            | PressOutcome::Left { role }
            | PressOutcome::SlotTaken { role } => Some(*role),
            PressOutcome::SessionClosed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressResult {
    pub outcome: PressOutcome,
    /// True exactly when this press completed the roster for a fresh fill
    pub announce: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LfgSession {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub owner_id: UserId,
    pub listing: LfgListing,
    pub created_at: DateTime<Utc>,
    slots: RoleSlots,
    announced: bool,
    closed: bool,
}

impl LfgSession {
    pub fn new(
        message_id: MessageId,
        channel_id: ChannelId,
        owner_id: UserId,
        listing: LfgListing,
    ) -> Self {
        Self {
            message_id,
            channel_id,
            owner_id,
            listing,
            created_at: Utc::now(),
            slots: RoleSlots::new(),
            announced: false,
            closed: false,
        }
    }

    /// Rebuild a session from its stored row.
    ///
    /// A roster that was already full when stored counts as announced, so a
    /// restart never repeats the announcement.
    pub fn from_record(record: &LfgRecord) -> Result<Self> {
        let listing = LfgListing::from_snapshot(&record.snapshot)?;
        Ok(Self {
            message_id: record.message_id,
            channel_id: record.channel_id,
            owner_id: record.owner_id,
            listing,
            created_at: record.created_at,
            announced: record.slots.is_full(),
            slots: record.slots.clone(),
            closed: false,
        })
    }

    pub fn to_record(&self) -> Result<LfgRecord> {
        Ok(LfgRecord {
            message_id: self.message_id,
            channel_id: self.channel_id,
            owner_id: self.owner_id,
            slots: self.slots.clone(),
            snapshot: self.listing.to_snapshot()?,
            created_at: self.created_at,
        })
    }

    pub fn slots(&self) -> &RoleSlots {
        &self.slots
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.slots.is_full() {
            SessionState::Complete
        } else {
            SessionState::Open
        }
    }

    /// Apply a role button press by `user`
    pub fn press(&mut self, user: UserId, role: Role) -> PressResult {
        if self.closed {
            return PressResult {
                outcome: PressOutcome::SessionClosed,
                announce: false,
            };
        }

        let outcome = match self.slots.role_of(user) {
            Some(current) if current == role => {
                self.slots.remove(user);
                PressOutcome::Left { role }
            }
            _ if !self.slots.has_capacity(role) => PressOutcome::SlotTaken { role },
            _ => {
                let previous = self.slots.remove(user);
                self.slots.insert(role, user);
                PressOutcome::Joined { role, previous }
            }
        };

        let announce = if self.slots.is_full() {
            let fresh = !self.announced;
            self.announced = true;
            fresh
        } else {
            self.announced = false;
            false
        };

        PressResult { outcome, announce }
    }

    /// Close the session; only the owner may do this
    pub fn close(&mut self, user: UserId) -> Result<()> {
        if user != self.owner_id {
            return Err(KeymasterError::NotSessionOwner {
                message_id: self.message_id,
                user_id: user,
            }
            .into());
        }
        if self.closed {
            return Err(KeymasterError::SessionClosed {
                message_id: self.message_id,
            }
            .into());
        }
        self.closed = true;
        Ok(())
    }
}
