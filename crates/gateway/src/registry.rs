use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use rolecall_core::domain::ids::{ChannelId, DialogueId, MessageId};

/// A live watch on one target message, waiting for the invoker's emoji
/// reaction. Process-local: the durable dialogue record is the source of
/// truth, the watch only routes reactions and holds the staged emoji.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmojiWatch {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub interaction_token: String,
    pub registered_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub staged: Option<String>,
}

/// Explicit registry of dialogues currently capturing an emoji. Replaces
/// what would otherwise be closures hidden in a handler map, so tests and
/// the expiry sweep can inspect it directly.
#[derive(Default)]
pub struct SubscriptionRegistry {
    watches: Mutex<HashMap<DialogueId, EmojiWatch>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        dialogue_id: DialogueId,
        channel_id: ChannelId,
        message_id: MessageId,
        interaction_token: String,
        now: DateTime<Utc>,
    ) {
        let watch = EmojiWatch {
            channel_id,
            message_id,
            interaction_token,
            registered_at: now,
            last_activity: now,
            staged: None,
        };
        self.lock().insert(dialogue_id, watch);
    }

    pub fn unregister(&self, dialogue_id: &DialogueId) -> Option<EmojiWatch> {
        self.lock().remove(dialogue_id)
    }

    /// The dialogue watching this message, if any. At most one dialogue
    /// watches a given message at a time; a later registration for the
    /// same message would have replaced the earlier dialogue's watch via
    /// its own id, so first match wins.
    pub fn match_target(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Option<DialogueId> {
        self.lock()
            .iter()
            .find(|(_, watch)| {
                watch.channel_id == *channel_id && watch.message_id == *message_id
            })
            .map(|(id, _)| id.clone())
    }

    pub fn watch(&self, dialogue_id: &DialogueId) -> Option<EmojiWatch> {
        self.lock().get(dialogue_id).cloned()
    }

    /// Stages a captured emoji, replacing any earlier capture. Returns
    /// false when the watch is gone.
    pub fn stage_emoji(&self, dialogue_id: &DialogueId, emoji: String, now: DateTime<Utc>) -> bool {
        let mut watches = self.lock();
        match watches.get_mut(dialogue_id) {
            Some(watch) => {
                watch.staged = Some(emoji);
                watch.last_activity = now;
                true
            }
            None => false,
        }
    }

    pub fn staged_emoji(&self, dialogue_id: &DialogueId) -> Option<String> {
        self.lock().get(dialogue_id).and_then(|watch| watch.staged.clone())
    }

    /// Removes and returns every watch idle since before the cutoff.
    pub fn drain_idle(&self, cutoff: DateTime<Utc>) -> Vec<(DialogueId, EmojiWatch)> {
        let mut watches = self.lock();
        let idle: Vec<DialogueId> = watches
            .iter()
            .filter(|(_, watch)| watch.last_activity < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        idle.into_iter()
            .filter_map(|id| watches.remove(&id).map(|watch| (id, watch)))
            .collect()
    }

    pub fn watch_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DialogueId, EmojiWatch>> {
        match self.watches.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
