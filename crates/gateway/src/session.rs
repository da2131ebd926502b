use async_trait::async_trait;
use thiserror::Error;

use rolecall_core::domain::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use rolecall_core::errors::{PermissionActor, ReactionRoleError};
use rolecall_core::{GuildEmoji, GuildRole};

use crate::replies::InteractionReply;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("gateway call failed: {0}")]
    Transport(String),
    #[error("missing permission for {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<SessionError> for ReactionRoleError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Transport(message) => ReactionRoleError::Gateway(message),
            SessionError::PermissionDenied(_) => {
                ReactionRoleError::PermissionDenied { actor: PermissionActor::Bot }
            }
            SessionError::NotFound(message) => ReactionRoleError::NotFound(message),
        }
    }
}

/// Guild permission bitfield as carried on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const MANAGE_ROLES: Permissions = Permissions(1 << 28);

    pub fn contains(self, required: Permissions) -> bool {
        self.0 & required.0 == required.0
    }
}

/// Everything the services need from the connected chat platform. One
/// implementation talks to the real API; tests script their own.
#[async_trait]
pub trait GatewaySession: Send + Sync {
    fn bot_user_id(&self) -> UserId;

    /// Sends the initial reply for an interaction token.
    async fn respond(&self, token: &str, reply: InteractionReply) -> Result<(), SessionError>;

    /// Edits the reply previously sent for an interaction token.
    async fn edit_response(&self, token: &str, reply: InteractionReply)
        -> Result<(), SessionError>;

    async fn add_reaction(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<(), SessionError>;

    async fn remove_reaction(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
        emoji: &str,
        user_id: &UserId,
    ) -> Result<(), SessionError>;

    /// Removes every reaction of one emoji from a message.
    async fn clear_reaction_emoji(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<(), SessionError>;

    /// One page of users who reacted with `emoji`, ordered by user id,
    /// starting after the given cursor. The platform caps `limit` at 100.
    async fn message_reactions(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
        emoji: &str,
        after: Option<&UserId>,
        limit: u16,
    ) -> Result<Vec<UserId>, SessionError>;

    async fn guild_roles(&self, guild_id: &GuildId) -> Result<Vec<GuildRole>, SessionError>;

    async fn guild_emojis(&self, guild_id: &GuildId) -> Result<Vec<GuildEmoji>, SessionError>;

    async fn add_member_role(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
        role_id: &RoleId,
    ) -> Result<(), SessionError>;

    async fn remove_member_role(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
        role_id: &RoleId,
    ) -> Result<(), SessionError>;

    async fn member_permissions(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
    ) -> Result<Permissions, SessionError>;

    /// Asks the gateway to stream the guild's member roster as chunk
    /// events.
    async fn request_members(&self, guild_id: &GuildId) -> Result<(), SessionError>;
}

#[derive(Default)]
pub struct NoopGatewaySession;

#[async_trait]
impl GatewaySession for NoopGatewaySession {
    fn bot_user_id(&self) -> UserId {
        UserId("bot".to_string())
    }

    async fn respond(&self, _token: &str, _reply: InteractionReply) -> Result<(), SessionError> {
        Ok(())
    }

    async fn edit_response(
        &self,
        _token: &str,
        _reply: InteractionReply,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn add_reaction(
        &self,
        _channel_id: &ChannelId,
        _message_id: &MessageId,
        _emoji: &str,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn remove_reaction(
        &self,
        _channel_id: &ChannelId,
        _message_id: &MessageId,
        _emoji: &str,
        _user_id: &UserId,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn clear_reaction_emoji(
        &self,
        _channel_id: &ChannelId,
        _message_id: &MessageId,
        _emoji: &str,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn message_reactions(
        &self,
        _channel_id: &ChannelId,
        _message_id: &MessageId,
        _emoji: &str,
        _after: Option<&UserId>,
        _limit: u16,
    ) -> Result<Vec<UserId>, SessionError> {
        Ok(Vec::new())
    }

    async fn guild_roles(&self, _guild_id: &GuildId) -> Result<Vec<GuildRole>, SessionError> {
        Ok(Vec::new())
    }

    async fn guild_emojis(&self, _guild_id: &GuildId) -> Result<Vec<GuildEmoji>, SessionError> {
        Ok(Vec::new())
    }

    async fn add_member_role(
        &self,
        _guild_id: &GuildId,
        _user_id: &UserId,
        _role_id: &RoleId,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn remove_member_role(
        &self,
        _guild_id: &GuildId,
        _user_id: &UserId,
        _role_id: &RoleId,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn member_permissions(
        &self,
        _guild_id: &GuildId,
        _user_id: &UserId,
    ) -> Result<Permissions, SessionError> {
        Ok(Permissions::MANAGE_ROLES)
    }

    async fn request_members(&self, _guild_id: &GuildId) -> Result<(), SessionError> {
        Ok(())
    }
}
