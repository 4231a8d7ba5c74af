//! Button identifiers of the form `lfg:<message-id>:<tank|healer|dps|close>`
//!
//! The message id is embedded so a press can be routed to its session even
//! after a restart, when nothing about the button is held in memory.

use std::fmt;
use std::str::FromStr;

use crate::error::KeymasterError;
use crate::types::{MessageId, Role};

const PREFIX: &str = "lfg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Join(Role),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LfgButtonId {
    pub message_id: MessageId,
    pub action: ButtonAction,
}

impl LfgButtonId {
    pub fn join(message_id: MessageId, role: Role) -> Self {
        Self {
            message_id,
            action: ButtonAction::Join(role),
        }
    }

    pub fn close(message_id: MessageId) -> Self {
        Self {
            message_id,
            action: ButtonAction::Close,
        }
    }

    /// Whether a component id belongs to the group finder at all
    pub fn matches(custom_id: &str) -> bool {
        custom_id.starts_with("lfg:")
    }
}

impl fmt::Display for LfgButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            ButtonAction::Join(role) => role.slug(),
            ButtonAction::Close => "close",
        };
        write!(f, "{}:{}:{}", PREFIX, self.message_id, action)
    }
}

impl FromStr for LfgButtonId {
    type Err = KeymasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KeymasterError::InvalidInput {
            reason: format!("unrecognised button id '{}'", s),
        };

        let mut parts = s.splitn(3, ':');
        let (prefix, id, action) = match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(id), Some(action)) => (prefix, id, action),
            _ => return Err(invalid()),
        };
        if prefix != PREFIX {
            return Err(invalid());
        }

        let message_id: MessageId = id.parse().map_err(|_| invalid())?;
        let action = match action {
            "close" => ButtonAction::Close,
            role => ButtonAction::Join(role.parse().map_err(|_| invalid())?),
        };

        Ok(Self { message_id, action })
    }
}
