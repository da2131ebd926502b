use serde::{Deserialize, Serialize};

use crate::domain::ids::RoleId;
use crate::errors::ReactionRoleError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRole {
    pub id: RoleId,
    pub name: String,
}

/// Resolves a raw role argument within a guild's role list. An all-digit
/// argument is treated as a role id; anything else falls back to a
/// case-insensitive name lookup.
pub fn resolve_role(raw: &str, roles: &[GuildRole]) -> Result<RoleId, ReactionRoleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReactionRoleError::RoleNotFound(raw.to_owned()));
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return roles
            .iter()
            .find(|role| role.id.0 == trimmed)
            .map(|role| role.id.clone())
            .ok_or_else(|| ReactionRoleError::RoleNotFound(raw.to_owned()));
    }

    roles
        .iter()
        .find(|role| role.name.eq_ignore_ascii_case(trimmed))
        .map(|role| role.id.clone())
        .ok_or_else(|| ReactionRoleError::RoleNotFound(raw.to_owned()))
}
