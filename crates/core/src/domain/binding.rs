use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ChannelId, GuildId, MessageId, RoleId};

/// A finalized reaction-to-role association. `(guild, channel, message,
/// emoji)` is the unique key: one message may carry several bound emoji,
/// but the same emoji on the same message maps to exactly one role.
/// Re-binding upserts the row, so the newest role wins on lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    /// Canonical API-usable emoji form: the Unicode string itself, or
    /// `name:id` for a guild custom emoji.
    pub emoji: String,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
}

impl Binding {
    pub fn matches_emoji(&self, canonical: &str) -> bool {
        self.emoji == canonical
    }
}
