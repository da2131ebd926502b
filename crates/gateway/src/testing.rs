use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use rolecall_core::domain::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use rolecall_core::{GuildEmoji, GuildRole};

use crate::replies::InteractionReply;
use crate::session::{GatewaySession, Permissions, SessionError};

/// Scripted platform session for service tests: seeded with guild state,
/// records every outbound call.
pub(crate) struct RecordingSession {
    bot: UserId,
    state: Mutex<SessionState>,
}

#[derive(Default)]
pub(crate) struct SessionState {
    pub roles: Vec<GuildRole>,
    pub emojis: Vec<GuildEmoji>,
    pub permissions: HashMap<UserId, Permissions>,
    pub default_permissions: Permissions,
    /// Reactors per canonical emoji, in fetch order.
    pub reactors: HashMap<String, Vec<UserId>>,
    /// When set, reaction pages never advance past the first full page.
    pub stuck_reaction_cursor: bool,
    pub failing_grants: Vec<UserId>,
    /// Messages whose reaction pages fail to fetch, as if deleted.
    pub failing_reaction_fetches: Vec<MessageId>,

    pub responses: Vec<(String, InteractionReply)>,
    pub edits: Vec<(String, InteractionReply)>,
    pub added_reactions: Vec<(ChannelId, MessageId, String)>,
    pub removed_reactions: Vec<(ChannelId, MessageId, String, UserId)>,
    pub cleared_emoji: Vec<(ChannelId, MessageId, String)>,
    pub role_grants: Vec<(UserId, RoleId)>,
    pub role_revokes: Vec<(UserId, RoleId)>,
    pub reaction_fetches: usize,
    pub member_requests: usize,
}

impl RecordingSession {
    pub(crate) fn new(bot: &str) -> Self {
        Self {
            bot: UserId(bot.to_string()),
            state: Mutex::new(SessionState {
                default_permissions: Permissions::MANAGE_ROLES,
                ..SessionState::default()
            }),
        }
    }

    pub(crate) fn with_state(bot: &str, state: SessionState) -> Self {
        Self { bot: UserId(bot.to_string()), state: Mutex::new(state) }
    }

    pub(crate) fn inspect<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        f(&self.lock())
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut SessionState)) {
        f(&mut self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl GatewaySession for RecordingSession {
    fn bot_user_id(&self) -> UserId {
        self.bot.clone()
    }

    async fn respond(&self, token: &str, reply: InteractionReply) -> Result<(), SessionError> {
        self.lock().responses.push((token.to_string(), reply));
        Ok(())
    }

    async fn edit_response(
        &self,
        token: &str,
        reply: InteractionReply,
    ) -> Result<(), SessionError> {
        self.lock().edits.push((token.to_string(), reply));
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<(), SessionError> {
        self.lock().added_reactions.push((
            channel_id.clone(),
            message_id.clone(),
            emoji.to_string(),
        ));
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
        emoji: &str,
        user_id: &UserId,
    ) -> Result<(), SessionError> {
        self.lock().removed_reactions.push((
            channel_id.clone(),
            message_id.clone(),
            emoji.to_string(),
            user_id.clone(),
        ));
        Ok(())
    }

    async fn clear_reaction_emoji(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<(), SessionError> {
        self.lock().cleared_emoji.push((
            channel_id.clone(),
            message_id.clone(),
            emoji.to_string(),
        ));
        Ok(())
    }

    async fn message_reactions(
        &self,
        _channel_id: &ChannelId,
        message_id: &MessageId,
        emoji: &str,
        after: Option<&UserId>,
        limit: u16,
    ) -> Result<Vec<UserId>, SessionError> {
        let mut state = self.lock();
        state.reaction_fetches += 1;

        if state.failing_reaction_fetches.contains(message_id) {
            return Err(SessionError::NotFound(format!("message {}", message_id.0)));
        }

        let reactors = state.reactors.get(emoji).cloned().unwrap_or_default();
        let limit = limit as usize;

        if state.stuck_reaction_cursor {
            return Ok(reactors.into_iter().take(limit).collect());
        }

        let start = match after {
            Some(cursor) => reactors
                .iter()
                .position(|user| user == cursor)
                .map_or(reactors.len(), |pos| pos + 1),
            None => 0,
        };

        Ok(reactors.into_iter().skip(start).take(limit).collect())
    }

    async fn guild_roles(&self, _guild_id: &GuildId) -> Result<Vec<GuildRole>, SessionError> {
        Ok(self.lock().roles.clone())
    }

    async fn guild_emojis(&self, _guild_id: &GuildId) -> Result<Vec<GuildEmoji>, SessionError> {
        Ok(self.lock().emojis.clone())
    }

    async fn add_member_role(
        &self,
        _guild_id: &GuildId,
        user_id: &UserId,
        role_id: &RoleId,
    ) -> Result<(), SessionError> {
        let mut state = self.lock();
        if state.failing_grants.contains(user_id) {
            return Err(SessionError::Transport(format!("grant failed for {}", user_id.0)));
        }
        state.role_grants.push((user_id.clone(), role_id.clone()));
        Ok(())
    }

    async fn remove_member_role(
        &self,
        _guild_id: &GuildId,
        user_id: &UserId,
        role_id: &RoleId,
    ) -> Result<(), SessionError> {
        self.lock().role_revokes.push((user_id.clone(), role_id.clone()));
        Ok(())
    }

    async fn member_permissions(
        &self,
        _guild_id: &GuildId,
        user_id: &UserId,
    ) -> Result<Permissions, SessionError> {
        let state = self.lock();
        Ok(state.permissions.get(user_id).copied().unwrap_or(state.default_permissions))
    }

    async fn request_members(&self, _guild_id: &GuildId) -> Result<(), SessionError> {
        self.lock().member_requests += 1;
        Ok(())
    }
}
