use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use rolecall_core::domain::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub event_id: String,
    pub event: GatewayEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    CommandInvocation(CommandInvocationEvent),
    ComponentInteraction(ComponentInteractionEvent),
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
    MemberChunk(MemberChunkEvent),
    GuildReady(GuildReadyEvent),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::CommandInvocation(_) => GatewayEventType::CommandInvocation,
            Self::ComponentInteraction(_) => GatewayEventType::ComponentInteraction,
            Self::ReactionAdded(_) => GatewayEventType::ReactionAdded,
            Self::ReactionRemoved(_) => GatewayEventType::ReactionRemoved,
            Self::MemberChunk(_) => GatewayEventType::MemberChunk,
            Self::GuildReady(_) => GatewayEventType::GuildReady,
            Self::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    CommandInvocation,
    ComponentInteraction,
    ReactionAdded,
    ReactionRemoved,
    MemberChunk,
    GuildReady,
    Unsupported,
}

/// A message command invoked on a target message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocationEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub command_id: String,
    pub interaction_token: String,
}

/// A click or selection on one of the bot's own reply components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentInteractionEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub custom_id: String,
    pub values: Vec<String>,
    pub interaction_token: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub emoji: EmojiRef,
}

/// The emoji carried by a reaction event: a bare name for Unicode emoji,
/// name plus id for a custom one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmojiRef {
    pub name: String,
    pub id: Option<String>,
    pub animated: bool,
}

impl EmojiRef {
    pub fn unicode(name: &str) -> Self {
        Self { name: name.to_string(), id: None, animated: false }
    }

    pub fn custom(name: &str, id: &str) -> Self {
        Self { name: name.to_string(), id: Some(id.to_string()), animated: false }
    }

    /// Canonical API-usable form, matching how bindings store their emoji.
    pub fn canonical(&self) -> String {
        match &self.id {
            Some(id) => format!("{}:{}", self.name, id),
            None => self.name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRecord {
    pub user_id: UserId,
    pub role_ids: Vec<RoleId>,
}

/// One page of a guild's member roster, streamed in response to a member
/// request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberChunkEvent {
    pub guild_id: GuildId,
    pub members: Vec<MemberRecord>,
    pub chunk_index: u32,
    pub chunk_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildReadyEvent {
    pub guild_id: GuildId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error("dialogue handler failure: {0}")]
    Dialogue(String),
    #[error("reaction handler failure: {0}")]
    Reaction(String),
    #[error("membership handler failure: {0}")]
    Membership(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> GatewayEventType;
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
