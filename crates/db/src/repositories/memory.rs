use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use rolecall_core::domain::binding::Binding;
use rolecall_core::domain::dialogue::DialogueProgress;
use rolecall_core::domain::ids::{ChannelId, DialogueId, MessageId};

use super::{BindingRepository, RepositoryError};

/// Map-backed store used by service tests. Mirrors the SQL repository's
/// contract, including upsert-on-rebind and store-assigned dialogue ids.
#[derive(Default)]
pub struct InMemoryBindingRepository {
    dialogues: RwLock<HashMap<DialogueId, DialogueProgress>>,
    bindings: RwLock<HashMap<(String, String, String, String), Binding>>,
    next_id: AtomicU64,
}

impl InMemoryBindingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn binding_key(binding: &Binding) -> (String, String, String, String) {
        (
            binding.guild_id.0.clone(),
            binding.channel_id.0.clone(),
            binding.message_id.0.clone(),
            binding.emoji.clone(),
        )
    }
}

#[async_trait::async_trait]
impl BindingRepository for InMemoryBindingRepository {
    async fn create_dialogue(
        &self,
        progress: DialogueProgress,
    ) -> Result<DialogueId, RepositoryError> {
        let id = DialogueId(format!("dlg-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        let mut stored = progress;
        stored.id = id.clone();
        self.dialogues.write().await.insert(id.clone(), stored);
        Ok(id)
    }

    async fn get_dialogue(
        &self,
        id: &DialogueId,
    ) -> Result<Option<DialogueProgress>, RepositoryError> {
        Ok(self.dialogues.read().await.get(id).cloned())
    }

    async fn put_dialogue(&self, progress: DialogueProgress) -> Result<(), RepositoryError> {
        let mut dialogues = self.dialogues.write().await;
        if !dialogues.contains_key(&progress.id) {
            return Err(RepositoryError::NotFound(format!("dialogue {}", progress.id.0)));
        }
        dialogues.insert(progress.id.clone(), progress);
        Ok(())
    }

    async fn create_binding(&self, binding: Binding) -> Result<(), RepositoryError> {
        let key = Self::binding_key(&binding);
        self.bindings.write().await.insert(key, binding);
        Ok(())
    }

    async fn get_bindings(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<Vec<Binding>, RepositoryError> {
        let bindings = self.bindings.read().await;
        let mut matched: Vec<Binding> = bindings
            .values()
            .filter(|binding| {
                binding.channel_id == *channel_id && binding.message_id == *message_id
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched)
    }

    async fn get_all_bindings(&self) -> Result<Vec<Binding>, RepositoryError> {
        let bindings = self.bindings.read().await;
        let mut all: Vec<Binding> = bindings.values().cloned().collect();
        all.sort_by(|a, b| {
            (&a.guild_id.0, &a.channel_id.0, &a.message_id.0, &a.created_at)
                .cmp(&(&b.guild_id.0, &b.channel_id.0, &b.message_id.0, &b.created_at))
        });
        Ok(all)
    }
}
