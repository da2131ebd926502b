pub mod dialogue;
pub mod events;
pub mod grants;
pub mod handlers;
pub mod members;
pub mod reconcile;
pub mod registry;
pub mod replies;
pub mod runner;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use dialogue::DialogueService;
pub use events::{
    EventContext, EventDispatcher, EventHandler, GatewayEnvelope, GatewayEvent, GatewayEventType,
};
pub use grants::GrantService;
pub use members::MembershipIndex;
pub use reconcile::{ReconcileConfig, ReconcileStats, ReconciliationEngine};
pub use registry::{EmojiWatch, SubscriptionRegistry};
pub use replies::{InteractionReply, ReplyControl};
pub use runner::{EventSource, GatewayRunner, NoopEventSource, ReconnectPolicy, TransportError};
pub use session::{GatewaySession, NoopGatewaySession, Permissions, SessionError};
