pub mod config;
pub mod domain;
pub mod emoji;
pub mod errors;
pub mod roles;

pub use domain::binding::Binding;
pub use domain::dialogue::{DialogueProgress, DialogueStep};
pub use domain::ids::{ChannelId, DialogueId, GuildId, MessageId, RoleId, UserId};
pub use emoji::{is_unicode_emoji, resolve_emoji_argument, resolve_reaction_emoji, GuildEmoji};
pub use errors::{DomainError, PermissionActor, ReactionRoleError};
pub use roles::{resolve_role, GuildRole};
