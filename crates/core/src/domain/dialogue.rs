use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ChannelId, DialogueId, GuildId, MessageId, RoleId, UserId};
use crate::errors::DomainError;

/// The step a configuration dialogue is waiting on. Derived from which
/// fields of the progress record are populated, never stored as a tag, so
/// it stays consistent with the durable data across restarts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogueStep {
    RoleSelect,
    EmojiSelect,
    Confirm,
}

/// One in-flight attempt to bind a reaction emoji to a role. Persisted as
/// JSON in the binding store; the live emoji-watch handle that goes with it
/// is process-local and deliberately not part of this record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueProgress {
    pub id: DialogueId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub invoked_by: UserId,
    #[serde(default)]
    pub role_id: Option<RoleId>,
    #[serde(default)]
    pub emoji: Option<String>,
    /// Set by the idle-expiry sweep. An abandoned dialogue is kept as an
    /// audit trail but must no longer be treated as active.
    #[serde(default)]
    pub abandoned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DialogueProgress {
    /// A fresh record as created by the command invocation. The store
    /// assigns the real id on insert.
    pub fn started(
        guild_id: GuildId,
        channel_id: ChannelId,
        message_id: MessageId,
        invoked_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DialogueId(String::new()),
            guild_id,
            channel_id,
            message_id,
            invoked_by,
            role_id: None,
            emoji: None,
            abandoned: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn step(&self) -> DialogueStep {
        if self.role_id.is_none() {
            DialogueStep::RoleSelect
        } else if self.emoji.is_none() {
            DialogueStep::EmojiSelect
        } else {
            DialogueStep::Confirm
        }
    }

    /// Guards against a write that would move the dialogue backwards: a
    /// populated role or emoji must never be cleared by a later step.
    pub fn ensure_advances(&self, next: &DialogueProgress) -> Result<(), DomainError> {
        if self.role_id.is_some() && next.role_id.is_none() {
            return Err(DomainError::InvariantViolation(
                "role cleared after selection".to_owned(),
            ));
        }
        if self.emoji.is_some() && next.emoji.is_none() {
            return Err(DomainError::InvariantViolation(
                "emoji cleared after capture".to_owned(),
            ));
        }
        Ok(())
    }
}
