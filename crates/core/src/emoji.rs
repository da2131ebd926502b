use serde::{Deserialize, Serialize};

use crate::errors::ReactionRoleError;

/// A custom emoji as exposed by the guild, used to confirm that a custom
/// reference actually belongs to this server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildEmoji {
    pub id: String,
    pub name: String,
    pub animated: bool,
}

impl GuildEmoji {
    /// The canonical API-usable identifier for a custom emoji.
    pub fn api_name(&self) -> String {
        format!("{}:{}", self.name, self.id)
    }
}

/// Custom-emoji references arrive as `<:name:id>` (or `<a:name:id>` when
/// animated); everything else is treated as a platform-standard Unicode
/// emoji and used verbatim.
pub fn is_unicode_emoji(raw: &str) -> bool {
    !raw.starts_with('<')
}

/// Resolves a user-typed emoji argument to its canonical form. Unicode
/// emoji pass through; custom references are parsed and confirmed against
/// the guild's emoji list.
pub fn resolve_emoji_argument(
    raw: &str,
    guild_emojis: &[GuildEmoji],
) -> Result<String, ReactionRoleError> {
    if is_unicode_emoji(raw) {
        return Ok(raw.to_owned());
    }

    let id = parse_custom_reference(raw)
        .ok_or_else(|| ReactionRoleError::EmojiNotFound(raw.to_owned()))?;

    guild_emojis
        .iter()
        .find(|emoji| emoji.id == id)
        .map(GuildEmoji::api_name)
        .ok_or_else(|| ReactionRoleError::EmojiNotFound(raw.to_owned()))
}

/// Resolves the emoji carried by a reaction event. The gateway delivers a
/// name plus an id when the emoji is custom; a custom emoji must belong to
/// the guild to be bindable.
pub fn resolve_reaction_emoji(
    name: &str,
    id: Option<&str>,
    guild_emojis: &[GuildEmoji],
) -> Result<String, ReactionRoleError> {
    match id {
        None => Ok(name.to_owned()),
        Some(id) => guild_emojis
            .iter()
            .find(|emoji| emoji.id == id)
            .map(GuildEmoji::api_name)
            .ok_or_else(|| ReactionRoleError::EmojiNotFound(format!("{name}:{id}"))),
    }
}

fn parse_custom_reference(raw: &str) -> Option<&str> {
    let inner = raw.strip_prefix('<')?.strip_suffix('>')?;
    let mut parts = inner.split(':');
    let flag = parts.next()?;
    if !flag.is_empty() && flag != "a" {
        return None;
    }
    let name = parts.next()?;
    let id = parts.next()?;
    if name.is_empty() || id.is_empty() || parts.next().is_some() {
        return None;
    }
    id.bytes().all(|b| b.is_ascii_digit()).then_some(id)
}
