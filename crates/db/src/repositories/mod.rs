use async_trait::async_trait;
use thiserror::Error;

use rolecall_core::domain::binding::Binding;
use rolecall_core::domain::dialogue::DialogueProgress;
use rolecall_core::domain::ids::{ChannelId, DialogueId, MessageId};

pub mod binding;
pub mod memory;

pub use binding::SqlBindingRepository;
pub use memory::InMemoryBindingRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Durable storage for dialogue progress and finalized bindings. Dialogue
/// records are written after every transition so a restart resumes where
/// the invoker left off.
#[async_trait]
pub trait BindingRepository: Send + Sync {
    /// Inserts a fresh dialogue record and returns its store-assigned id.
    async fn create_dialogue(
        &self,
        progress: DialogueProgress,
    ) -> Result<DialogueId, RepositoryError>;

    async fn get_dialogue(
        &self,
        id: &DialogueId,
    ) -> Result<Option<DialogueProgress>, RepositoryError>;

    /// Overwrites an existing dialogue record. Fails if the id is unknown.
    async fn put_dialogue(&self, progress: DialogueProgress) -> Result<(), RepositoryError>;

    /// Upserts on `(guild, channel, message, emoji)` so re-binding the same
    /// emoji replaces the previous role.
    async fn create_binding(&self, binding: Binding) -> Result<(), RepositoryError>;

    async fn get_bindings(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<Vec<Binding>, RepositoryError>;

    async fn get_all_bindings(&self) -> Result<Vec<Binding>, RepositoryError>;
}
