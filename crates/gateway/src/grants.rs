use std::sync::Arc;

use tracing::{debug, info};

use rolecall_core::errors::ReactionRoleError;
use rolecall_db::repositories::RepositoryError;
use rolecall_db::BindingRepository;

use crate::events::ReactionEvent;
use crate::members::MembershipIndex;
use crate::session::GatewaySession;

/// Applies the live half of a binding: a reaction added grants the role, a
/// reaction removed revokes it. Both directions look up bindings the same
/// way and ignore the bot's own reactions.
pub struct GrantService {
    store: Arc<dyn BindingRepository>,
    session: Arc<dyn GatewaySession>,
    index: Arc<MembershipIndex>,
}

impl GrantService {
    pub fn new(
        store: Arc<dyn BindingRepository>,
        session: Arc<dyn GatewaySession>,
        index: Arc<MembershipIndex>,
    ) -> Self {
        Self { store, session, index }
    }

    pub async fn apply_reaction_added(
        &self,
        event: &ReactionEvent,
    ) -> Result<(), ReactionRoleError> {
        let Some(role_id) = self.bound_role(event).await? else {
            return Ok(());
        };

        if self.index.is_known_absent(&event.guild_id, &event.user_id) {
            debug!(user_id = %event.user_id.0, "skipping grant for departed member");
            return Ok(());
        }

        self.session.add_member_role(&event.guild_id, &event.user_id, &role_id).await?;
        self.index.record_role_granted(&event.guild_id, &event.user_id, &role_id);

        info!(
            guild_id = %event.guild_id.0,
            user_id = %event.user_id.0,
            role_id = %role_id.0,
            emoji = %event.emoji.canonical(),
            "granted role for reaction"
        );
        Ok(())
    }

    pub async fn apply_reaction_removed(
        &self,
        event: &ReactionEvent,
    ) -> Result<(), ReactionRoleError> {
        let Some(role_id) = self.bound_role(event).await? else {
            return Ok(());
        };

        if self.index.is_known_absent(&event.guild_id, &event.user_id) {
            return Ok(());
        }

        self.session.remove_member_role(&event.guild_id, &event.user_id, &role_id).await?;
        self.index.record_role_revoked(&event.guild_id, &event.user_id, &role_id);

        info!(
            guild_id = %event.guild_id.0,
            user_id = %event.user_id.0,
            role_id = %role_id.0,
            emoji = %event.emoji.canonical(),
            "revoked role for reaction removal"
        );
        Ok(())
    }

    async fn bound_role(
        &self,
        event: &ReactionEvent,
    ) -> Result<Option<rolecall_core::domain::ids::RoleId>, ReactionRoleError> {
        if event.user_id == self.session.bot_user_id() {
            return Ok(None);
        }

        let bindings = self
            .store
            .get_bindings(&event.channel_id, &event.message_id)
            .await
            .map_err(storage)?;

        let canonical = event.emoji.canonical();
        Ok(bindings
            .iter()
            .find(|binding| binding.matches_emoji(&canonical))
            .map(|binding| binding.role_id.clone()))
    }
}

fn storage(error: RepositoryError) -> ReactionRoleError {
    ReactionRoleError::StorageUnavailable(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use rolecall_core::domain::binding::Binding;
    use rolecall_core::domain::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
    use rolecall_db::repositories::BindingRepository;
    use rolecall_db::InMemoryBindingRepository;

    use crate::events::{EmojiRef, MemberChunkEvent, MemberRecord, ReactionEvent};
    use crate::members::MembershipIndex;
    use crate::testing::RecordingSession;

    use super::GrantService;

    struct Fixture {
        session: Arc<RecordingSession>,
        index: Arc<MembershipIndex>,
        service: GrantService,
    }

    async fn fixture_with_binding(emoji: &str) -> Fixture {
        let store = Arc::new(InMemoryBindingRepository::new());
        store
            .create_binding(Binding {
                guild_id: GuildId("g1".to_string()),
                channel_id: ChannelId("c1".to_string()),
                message_id: MessageId("m1".to_string()),
                emoji: emoji.to_string(),
                role_id: RoleId("r1".to_string()),
                created_at: Utc::now(),
            })
            .await
            .expect("seed binding");

        let session = Arc::new(RecordingSession::new("bot"));
        let index = Arc::new(MembershipIndex::new());
        index.ingest_chunk(&MemberChunkEvent {
            guild_id: GuildId("g1".to_string()),
            members: vec![MemberRecord { user_id: UserId("u1".to_string()), role_ids: vec![] }],
            chunk_index: 0,
            chunk_count: 1,
        });

        let service = GrantService::new(store, session.clone(), index.clone());
        Fixture { session, index, service }
    }

    fn reaction(user: &str, emoji: EmojiRef) -> ReactionEvent {
        ReactionEvent {
            guild_id: GuildId("g1".to_string()),
            channel_id: ChannelId("c1".to_string()),
            message_id: MessageId("m1".to_string()),
            user_id: UserId(user.to_string()),
            emoji,
        }
    }

    #[tokio::test]
    async fn reaction_on_a_bound_emoji_grants_the_role() {
        let fx = fixture_with_binding("🎉").await;
        fx.service.apply_reaction_added(&reaction("u1", EmojiRef::unicode("🎉"))).await.expect("apply");

        fx.session.inspect(|state| {
            assert_eq!(
                state.role_grants,
                vec![(UserId("u1".to_string()), RoleId("r1".to_string()))]
            );
        });
        assert!(fx.index.has_role(
            &GuildId("g1".to_string()),
            &UserId("u1".to_string()),
            &RoleId("r1".to_string())
        ));
    }

    #[tokio::test]
    async fn removing_the_reaction_revokes_the_role() {
        let fx = fixture_with_binding("🎉").await;
        fx.service.apply_reaction_added(&reaction("u1", EmojiRef::unicode("🎉"))).await.expect("grant");
        fx.service
            .apply_reaction_removed(&reaction("u1", EmojiRef::unicode("🎉")))
            .await
            .expect("revoke");

        fx.session.inspect(|state| {
            assert_eq!(
                state.role_revokes,
                vec![(UserId("u1".to_string()), RoleId("r1".to_string()))]
            );
        });
    }

    #[tokio::test]
    async fn unbound_emoji_and_unbound_messages_are_ignored() {
        let fx = fixture_with_binding("🎉").await;

        fx.service.apply_reaction_added(&reaction("u1", EmojiRef::unicode("👍"))).await.expect("apply");

        let mut other_message = reaction("u1", EmojiRef::unicode("🎉"));
        other_message.message_id = MessageId("other".to_string());
        fx.service.apply_reaction_added(&other_message).await.expect("apply");

        fx.session.inspect(|state| assert!(state.role_grants.is_empty()));
    }

    #[tokio::test]
    async fn custom_emoji_matches_by_canonical_form() {
        let fx = fixture_with_binding("party:1234").await;

        fx.service
            .apply_reaction_added(&reaction("u1", EmojiRef::custom("party", "1234")))
            .await
            .expect("apply");
        fx.service
            .apply_reaction_added(&reaction("u1", EmojiRef::custom("party", "9999")))
            .await
            .expect("apply");

        fx.session.inspect(|state| assert_eq!(state.role_grants.len(), 1));
    }

    #[tokio::test]
    async fn the_bots_own_reactions_never_grant() {
        let fx = fixture_with_binding("🎉").await;
        fx.service.apply_reaction_added(&reaction("bot", EmojiRef::unicode("🎉"))).await.expect("apply");
        fx.service
            .apply_reaction_removed(&reaction("bot", EmojiRef::unicode("🎉")))
            .await
            .expect("apply");

        fx.session.inspect(|state| {
            assert!(state.role_grants.is_empty());
            assert!(state.role_revokes.is_empty());
        });
    }

    #[tokio::test]
    async fn departed_members_are_skipped() {
        let fx = fixture_with_binding("🎉").await;
        fx.service.apply_reaction_added(&reaction("u9", EmojiRef::unicode("🎉"))).await.expect("apply");

        fx.session.inspect(|state| assert!(state.role_grants.is_empty()));
    }
}
