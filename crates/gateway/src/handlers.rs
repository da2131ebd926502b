use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::dialogue::DialogueService;
use crate::events::{
    EventContext, EventDispatcher, EventHandler, EventHandlerError, GatewayEnvelope, GatewayEvent,
    GatewayEventType, HandlerResult,
};
use crate::grants::GrantService;
use crate::members::MembershipIndex;
use crate::reconcile::ReconciliationEngine;

/// Wires every service into a dispatcher keyed by event type.
pub fn build_dispatcher(
    dialogue: Arc<DialogueService>,
    grants: Arc<GrantService>,
    index: Arc<MembershipIndex>,
    engine: Arc<ReconciliationEngine>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler { dialogue: dialogue.clone() });
    dispatcher.register(ComponentHandler { dialogue: dialogue.clone() });
    dispatcher.register(ReactionAddedHandler { dialogue, grants: grants.clone() });
    dispatcher.register(ReactionRemovedHandler { grants });
    dispatcher.register(MemberChunkHandler { index });
    dispatcher.register(GuildReadyHandler { engine });
    dispatcher
}

pub struct CommandHandler {
    pub dialogue: Arc<DialogueService>,
}

#[async_trait]
impl EventHandler for CommandHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::CommandInvocation
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::CommandInvocation(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.dialogue
            .handle_command(event)
            .await
            .map_err(|e| EventHandlerError::Dialogue(e.to_string()))?;
        Ok(HandlerResult::Processed)
    }
}

pub struct ComponentHandler {
    pub dialogue: Arc<DialogueService>,
}

#[async_trait]
impl EventHandler for ComponentHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ComponentInteraction
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ComponentInteraction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.dialogue
            .handle_component(event)
            .await
            .map_err(|e| EventHandlerError::Dialogue(e.to_string()))?;
        Ok(HandlerResult::Processed)
    }
}

/// A reaction added feeds two consumers: a dialogue waiting for its emoji
/// capture, and the live grant path for existing bindings.
pub struct ReactionAddedHandler {
    pub dialogue: Arc<DialogueService>,
    pub grants: Arc<GrantService>,
}

#[async_trait]
impl EventHandler for ReactionAddedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ReactionAdded
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ReactionAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.dialogue
            .observe_reaction(event)
            .await
            .map_err(|e| EventHandlerError::Dialogue(e.to_string()))?;
        self.grants
            .apply_reaction_added(event)
            .await
            .map_err(|e| EventHandlerError::Reaction(e.to_string()))?;
        Ok(HandlerResult::Processed)
    }
}

pub struct ReactionRemovedHandler {
    pub grants: Arc<GrantService>,
}

#[async_trait]
impl EventHandler for ReactionRemovedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ReactionRemoved
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ReactionRemoved(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.grants
            .apply_reaction_removed(event)
            .await
            .map_err(|e| EventHandlerError::Reaction(e.to_string()))?;
        Ok(HandlerResult::Processed)
    }
}

pub struct MemberChunkHandler {
    pub index: Arc<MembershipIndex>,
}

#[async_trait]
impl EventHandler for MemberChunkHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::MemberChunk
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::MemberChunk(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.index.ingest_chunk(event);
        Ok(HandlerResult::Processed)
    }
}

/// Kicks off reconciliation in the background so the event loop keeps
/// serving live reactions while history is replayed.
pub struct GuildReadyHandler {
    pub engine: Arc<ReconciliationEngine>,
}

#[async_trait]
impl EventHandler for GuildReadyHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::GuildReady
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::GuildReady(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let engine = self.engine.clone();
        let guild_id = event.guild_id.clone();
        tokio::spawn(async move {
            match engine.run_guild(&guild_id).await {
                Ok(stats) => {
                    info!(
                        guild_id = %guild_id.0,
                        grants = stats.grants_applied,
                        "startup reconciliation finished"
                    );
                }
                Err(err) => {
                    error!(guild_id = %guild_id.0, error = %err, "startup reconciliation failed");
                }
            }
        });

        Ok(HandlerResult::Processed)
    }
}
