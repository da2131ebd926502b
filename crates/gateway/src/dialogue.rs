use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use rolecall_core::domain::dialogue::{DialogueProgress, DialogueStep};
use rolecall_core::domain::ids::DialogueId;
use rolecall_core::errors::{PermissionActor, ReactionRoleError};
use rolecall_core::{resolve_reaction_emoji, resolve_role, Binding};
use rolecall_db::repositories::RepositoryError;
use rolecall_db::BindingRepository;

use crate::events::{CommandInvocationEvent, ComponentInteractionEvent, ReactionEvent};
use crate::registry::SubscriptionRegistry;
use crate::replies;
use crate::session::{GatewaySession, Permissions};

/// Drives the role-binding configuration dialogue. Every transition
/// re-reads the durable record and writes it back before replying, so a
/// restart resumes from whatever step was last persisted.
pub struct DialogueService {
    store: Arc<dyn BindingRepository>,
    session: Arc<dyn GatewaySession>,
    registry: Arc<SubscriptionRegistry>,
    command_id: String,
}

impl DialogueService {
    pub fn new(
        store: Arc<dyn BindingRepository>,
        session: Arc<dyn GatewaySession>,
        registry: Arc<SubscriptionRegistry>,
        command_id: String,
    ) -> Self {
        Self { store, session, registry, command_id }
    }

    /// The message command that opens a dialogue on a target message.
    pub async fn handle_command(
        &self,
        event: &CommandInvocationEvent,
    ) -> Result<(), ReactionRoleError> {
        if event.command_id != self.command_id {
            debug!(command_id = %event.command_id, "ignoring unrelated command invocation");
            return Ok(());
        }

        for (user, actor) in [
            (&event.user_id, PermissionActor::Invoker),
            (&self.session.bot_user_id(), PermissionActor::Bot),
        ] {
            let permissions = self.session.member_permissions(&event.guild_id, user).await?;
            if !permissions.contains(Permissions::MANAGE_ROLES) {
                let denied = ReactionRoleError::PermissionDenied { actor };
                self.session
                    .respond(&event.interaction_token, replies::failure(&denied.user_message()))
                    .await?;
                return Ok(());
            }
        }

        let progress = DialogueProgress::started(
            event.guild_id.clone(),
            event.channel_id.clone(),
            event.message_id.clone(),
            event.user_id.clone(),
            Utc::now(),
        );
        let dialogue_id = self.store.create_dialogue(progress).await.map_err(storage)?;

        info!(
            dialogue_id = %dialogue_id.0,
            guild_id = %event.guild_id.0,
            message_id = %event.message_id.0,
            "opened role-binding dialogue"
        );

        let token = self.component_token(&dialogue_id);
        self.session.respond(&event.interaction_token, replies::role_select_prompt(&token)).await?;
        Ok(())
    }

    /// A selection or button click on one of the dialogue's replies. The
    /// custom id routes back to the dialogue; the persisted record, not
    /// the component, decides which step runs.
    pub async fn handle_component(
        &self,
        event: &ComponentInteractionEvent,
    ) -> Result<(), ReactionRoleError> {
        let Some(dialogue_id) = self.parse_component_token(&event.custom_id) else {
            debug!(custom_id = %event.custom_id, "ignoring unrelated component interaction");
            return Ok(());
        };

        let Some(progress) = self.store.get_dialogue(&dialogue_id).await.map_err(storage)? else {
            self.session
                .respond(
                    &event.interaction_token,
                    replies::failure("I can't find that setup session. Run the command again."),
                )
                .await?;
            return Ok(());
        };

        if progress.abandoned {
            self.session
                .respond(
                    &event.interaction_token,
                    replies::failure("That setup session timed out. Run the command again."),
                )
                .await?;
            return Ok(());
        }

        match progress.step() {
            DialogueStep::RoleSelect => self.apply_role_selection(progress, event).await,
            DialogueStep::EmojiSelect => self.commit_staged_emoji(progress, event).await,
            DialogueStep::Confirm => self.finalize(progress, &event.interaction_token).await,
        }
    }

    async fn apply_role_selection(
        &self,
        progress: DialogueProgress,
        event: &ComponentInteractionEvent,
    ) -> Result<(), ReactionRoleError> {
        let Some(raw) = event.values.first() else {
            self.session
                .respond(
                    &event.interaction_token,
                    replies::failure("Pick a role from the list first."),
                )
                .await?;
            return Ok(());
        };

        let roles = self.session.guild_roles(&progress.guild_id).await?;
        let role_id = match resolve_role(raw, &roles) {
            Ok(role_id) => role_id,
            Err(error) => {
                self.session
                    .respond(&event.interaction_token, replies::failure(&error.user_message()))
                    .await?;
                return Ok(());
            }
        };

        let mut next = progress.clone();
        next.role_id = Some(role_id);
        next.updated_at = Utc::now();
        progress.ensure_advances(&next)?;
        self.store.put_dialogue(next.clone()).await.map_err(storage)?;

        self.registry.register(
            next.id.clone(),
            next.channel_id.clone(),
            next.message_id.clone(),
            event.interaction_token.clone(),
            Utc::now(),
        );

        let token = self.component_token(&next.id);
        self.session.respond(&event.interaction_token, replies::emoji_prompt(&token)).await?;
        Ok(())
    }

    async fn commit_staged_emoji(
        &self,
        progress: DialogueProgress,
        event: &ComponentInteractionEvent,
    ) -> Result<(), ReactionRoleError> {
        let token = self.component_token(&progress.id);
        let Some(emoji) = self.registry.staged_emoji(&progress.id) else {
            self.session.respond(&event.interaction_token, replies::emoji_retry(&token)).await?;
            return Ok(());
        };

        let mut next = progress.clone();
        next.emoji = Some(emoji);
        next.updated_at = Utc::now();
        progress.ensure_advances(&next)?;
        self.store.put_dialogue(next.clone()).await.map_err(storage)?;

        self.finalize(next, &event.interaction_token).await
    }

    /// Persists the binding, seeds the message with the bot's own reaction
    /// and closes the dialogue. Authorization is re-checked here because
    /// permissions may have changed since the command was invoked.
    async fn finalize(
        &self,
        progress: DialogueProgress,
        interaction_token: &str,
    ) -> Result<(), ReactionRoleError> {
        let emoji = progress
            .emoji
            .clone()
            .ok_or_else(|| ReactionRoleError::NotFound("dialogue emoji".to_string()))?;
        let role_id = progress
            .role_id
            .clone()
            .ok_or_else(|| ReactionRoleError::NotFound("dialogue role".to_string()))?;

        for (user, actor) in [
            (&progress.invoked_by, PermissionActor::Invoker),
            (&self.session.bot_user_id(), PermissionActor::Bot),
        ] {
            let permissions = self.session.member_permissions(&progress.guild_id, user).await?;
            if !permissions.contains(Permissions::MANAGE_ROLES) {
                let denied = ReactionRoleError::PermissionDenied { actor };
                self.session
                    .respond(interaction_token, replies::failure(&denied.user_message()))
                    .await?;
                return Ok(());
            }
        }

        let already_bound = self
            .store
            .get_bindings(&progress.channel_id, &progress.message_id)
            .await
            .map_err(storage)?
            .iter()
            .any(|binding| binding.matches_emoji(&emoji));

        self.store
            .create_binding(Binding {
                guild_id: progress.guild_id.clone(),
                channel_id: progress.channel_id.clone(),
                message_id: progress.message_id.clone(),
                emoji: emoji.clone(),
                role_id: role_id.clone(),
                created_at: Utc::now(),
            })
            .await
            .map_err(storage)?;

        info!(
            dialogue_id = %progress.id.0,
            guild_id = %progress.guild_id.0,
            message_id = %progress.message_id.0,
            role_id = %role_id.0,
            "reaction binding stored"
        );

        self.registry.unregister(&progress.id);

        // Cleanup and the bot's canonical reaction run once per binding.
        // The stored row is the marker: a repeated confirm click sees it
        // and skips them, a confirm resumed after a restart does not.
        if !already_bound {
            if let Err(error) = self
                .session
                .clear_reaction_emoji(&progress.channel_id, &progress.message_id, &emoji)
                .await
            {
                warn!(dialogue_id = %progress.id.0, error = %error, "failed to clear setup reactions");
            }
            if let Err(error) =
                self.session.add_reaction(&progress.channel_id, &progress.message_id, &emoji).await
            {
                warn!(dialogue_id = %progress.id.0, error = %error, "failed to seed bound reaction");
            }
        }

        self.session
            .respond(interaction_token, replies::bound_confirmation(&emoji, &role_id))
            .await?;
        Ok(())
    }

    /// Routes a live reaction into the dialogue that is watching its
    /// message, staging the emoji for confirmation.
    pub async fn observe_reaction(&self, event: &ReactionEvent) -> Result<(), ReactionRoleError> {
        if event.user_id == self.session.bot_user_id() {
            return Ok(());
        }

        let Some(dialogue_id) = self.registry.match_target(&event.channel_id, &event.message_id)
        else {
            return Ok(());
        };

        let Some(progress) = self.store.get_dialogue(&dialogue_id).await.map_err(storage)? else {
            self.registry.unregister(&dialogue_id);
            return Ok(());
        };

        if progress.abandoned
            || progress.step() != DialogueStep::EmojiSelect
            || event.user_id != progress.invoked_by
        {
            return Ok(());
        }

        let Some(watch) = self.registry.watch(&dialogue_id) else {
            return Ok(());
        };
        let token = self.component_token(&dialogue_id);

        let guild_emojis = self.session.guild_emojis(&event.guild_id).await?;
        match resolve_reaction_emoji(&event.emoji.name, event.emoji.id.as_deref(), &guild_emojis) {
            Ok(canonical) => {
                self.registry.stage_emoji(&dialogue_id, canonical.clone(), Utc::now());
                self.session
                    .edit_response(&watch.interaction_token, replies::emoji_staged(&token, &canonical))
                    .await?;
            }
            Err(_) => {
                self.session
                    .edit_response(&watch.interaction_token, replies::emoji_invalid(&token))
                    .await?;
            }
        }

        Ok(())
    }

    /// Sweeps watches idle past the TTL, marking their dialogues
    /// abandoned. Returns the number of dialogues expired.
    pub async fn expire_idle(&self, idle_ttl: Duration) -> usize {
        let now = Utc::now();
        let drained = self.registry.drain_idle(now - idle_ttl);
        let mut expired = 0;

        for (dialogue_id, _watch) in drained {
            match self.store.get_dialogue(&dialogue_id).await {
                Ok(Some(mut progress)) if !progress.abandoned => {
                    progress.abandoned = true;
                    progress.updated_at = now;
                    if let Err(error) = self.store.put_dialogue(progress).await {
                        warn!(dialogue_id = %dialogue_id.0, error = %error, "failed to mark dialogue abandoned");
                        continue;
                    }
                    info!(dialogue_id = %dialogue_id.0, "expired idle dialogue");
                    expired += 1;
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(dialogue_id = %dialogue_id.0, error = %error, "failed to load dialogue for expiry");
                }
            }
        }

        expired
    }

    pub fn command_id(&self) -> &str {
        &self.command_id
    }

    fn component_token(&self, dialogue_id: &DialogueId) -> String {
        format!("{};{}", self.command_id, dialogue_id.0)
    }

    fn parse_component_token(&self, custom_id: &str) -> Option<DialogueId> {
        let (command_id, dialogue_id) = custom_id.split_once(';')?;
        if command_id != self.command_id || dialogue_id.is_empty() {
            return None;
        }
        Some(DialogueId(dialogue_id.to_string()))
    }
}

fn storage(error: RepositoryError) -> ReactionRoleError {
    ReactionRoleError::StorageUnavailable(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use rolecall_core::domain::dialogue::{DialogueProgress, DialogueStep};
    use rolecall_core::domain::ids::{ChannelId, DialogueId, GuildId, MessageId, RoleId, UserId};
    use rolecall_core::{GuildEmoji, GuildRole};
    use rolecall_db::repositories::BindingRepository;
    use rolecall_db::InMemoryBindingRepository;

    use crate::events::{CommandInvocationEvent, ComponentInteractionEvent, EmojiRef, ReactionEvent};
    use crate::registry::SubscriptionRegistry;
    use crate::replies::ReplyControl;
    use crate::session::Permissions;
    use crate::testing::RecordingSession;

    use super::DialogueService;

    const COMMAND: &str = "reactionroleregister";

    struct Fixture {
        store: Arc<InMemoryBindingRepository>,
        session: Arc<RecordingSession>,
        registry: Arc<SubscriptionRegistry>,
        service: DialogueService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryBindingRepository::new());
        let session = Arc::new(RecordingSession::new("bot"));
        session.update(|state| {
            state.roles = vec![
                GuildRole { id: RoleId("100".to_string()), name: "Raider".to_string() },
                GuildRole { id: RoleId("200".to_string()), name: "Healer".to_string() },
            ];
            state.emojis = vec![GuildEmoji {
                id: "1234".to_string(),
                name: "party".to_string(),
                animated: false,
            }];
        });
        let registry = Arc::new(SubscriptionRegistry::new());
        let service = DialogueService::new(
            store.clone(),
            session.clone(),
            registry.clone(),
            COMMAND.to_string(),
        );
        Fixture { store, session, registry, service }
    }

    fn command_event() -> CommandInvocationEvent {
        CommandInvocationEvent {
            guild_id: GuildId("g1".to_string()),
            channel_id: ChannelId("c1".to_string()),
            message_id: MessageId("m1".to_string()),
            user_id: UserId("u1".to_string()),
            command_id: COMMAND.to_string(),
            interaction_token: "tok-cmd".to_string(),
        }
    }

    fn component_event(custom_id: &str, values: Vec<&str>, token: &str) -> ComponentInteractionEvent {
        ComponentInteractionEvent {
            guild_id: GuildId("g1".to_string()),
            channel_id: ChannelId("c1".to_string()),
            user_id: UserId("u1".to_string()),
            custom_id: custom_id.to_string(),
            values: values.into_iter().map(str::to_string).collect(),
            interaction_token: token.to_string(),
        }
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

    async fn start_dialogue(fx: &Fixture) -> String {
        fx.service.handle_command(&command_event()).await.expect("command");
        fx.session.inspect(|state| {
            let (_, reply) = state.responses.last().expect("role prompt");
            match &reply.control {
                Some(ReplyControl::RoleSelect { token }) => token.clone(),
                other => panic!("expected role select control, got {other:?}"),
            }
        })
    }

    #[tokio::test]
    async fn full_dialogue_binds_emoji_to_role() {
        let fx = fixture();
        let token = start_dialogue(&fx).await;

        fx.service
            .handle_component(&component_event(&token, vec!["Raider"], "tok-role"))
            .await
            .expect("role selection");
        assert_eq!(fx.registry.watch_count(), 1);

        fx.service
            .observe_reaction(&reaction("u1", EmojiRef::unicode("🎉")))
            .await
            .expect("observe");

        fx.service
            .handle_component(&component_event(&token, vec![], "tok-done"))
            .await
            .expect("confirm");

        let bindings = fx
            .store
            .get_bindings(&ChannelId("c1".to_string()), &MessageId("m1".to_string()))
            .await
            .expect("bindings");
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].emoji, "🎉");
        assert_eq!(bindings[0].role_id, RoleId("100".to_string()));

        fx.session.inspect(|state| {
            assert_eq!(state.cleared_emoji.len(), 1);
            assert_eq!(state.added_reactions.len(), 1);
            assert_eq!(state.added_reactions[0].2, "🎉");
            let (_, confirmation) = state.responses.last().expect("confirmation");
            assert!(confirmation.content.contains("<@&100>"));
        });
        assert_eq!(fx.registry.watch_count(), 0);
    }

    #[tokio::test]
    async fn dialogue_survives_a_registry_loss_between_steps() {
        // A restart drops the in-memory watch but keeps the durable record;
        // the confirm click after re-staging must still work off storage.
        let fx = fixture();
        let token = start_dialogue(&fx).await;

        fx.service
            .handle_component(&component_event(&token, vec!["healer"], "tok-role"))
            .await
            .expect("role selection");

        let dialogue_id = DialogueId(token.split_once(';').expect("token").1.to_string());
        let stored = fx.store.get_dialogue(&dialogue_id).await.expect("get").expect("present");
        assert_eq!(stored.step(), DialogueStep::EmojiSelect);
        assert_eq!(stored.role_id, Some(RoleId("200".to_string())));
    }

    #[tokio::test]
    async fn done_without_a_staged_emoji_asks_again() {
        let fx = fixture();
        let token = start_dialogue(&fx).await;
        fx.service
            .handle_component(&component_event(&token, vec!["Raider"], "tok-role"))
            .await
            .expect("role selection");

        fx.service
            .handle_component(&component_event(&token, vec![], "tok-done"))
            .await
            .expect("premature confirm");

        fx.session.inspect(|state| {
            let (_, reply) = state.responses.last().expect("retry prompt");
            assert!(reply.content.contains("haven't seen a reaction"));
        });

        let bindings = fx.store.get_all_bindings().await.expect("bindings");
        assert!(bindings.is_empty());
    }

    #[tokio::test]
    async fn foreign_custom_emoji_keeps_the_dialogue_waiting() {
        let fx = fixture();
        let token = start_dialogue(&fx).await;
        fx.service
            .handle_component(&component_event(&token, vec!["Raider"], "tok-role"))
            .await
            .expect("role selection");

        fx.service
            .observe_reaction(&reaction("u1", EmojiRef::custom("stolen", "9999")))
            .await
            .expect("observe");

        fx.session.inspect(|state| {
            let (_, edit) = state.edits.last().expect("invalid-emoji edit");
            assert!(edit.content.contains("has to be from this server"));
        });

        let dialogue_id = DialogueId(token.split_once(';').expect("token").1.to_string());
        let stored = fx.store.get_dialogue(&dialogue_id).await.expect("get").expect("present");
        assert_eq!(stored.step(), DialogueStep::EmojiSelect);
        assert!(fx.registry.staged_emoji(&dialogue_id).is_none());
        assert!(fx.store.get_all_bindings().await.expect("bindings").is_empty());
    }

    #[tokio::test]
    async fn guild_custom_emoji_is_staged_in_canonical_form() {
        let fx = fixture();
        let token = start_dialogue(&fx).await;
        fx.service
            .handle_component(&component_event(&token, vec!["Raider"], "tok-role"))
            .await
            .expect("role selection");

        fx.service
            .observe_reaction(&reaction("u1", EmojiRef::custom("party", "1234")))
            .await
            .expect("observe");

        let dialogue_id = DialogueId(token.split_once(';').expect("token").1.to_string());
        assert_eq!(fx.registry.staged_emoji(&dialogue_id), Some("party:1234".to_string()));
    }

    #[tokio::test]
    async fn reactions_from_other_users_and_the_bot_are_ignored() {
        let fx = fixture();
        let token = start_dialogue(&fx).await;
        fx.service
            .handle_component(&component_event(&token, vec!["Raider"], "tok-role"))
            .await
            .expect("role selection");

        fx.service
            .observe_reaction(&reaction("bot", EmojiRef::unicode("🎉")))
            .await
            .expect("bot reaction");
        fx.service
            .observe_reaction(&reaction("u2", EmojiRef::unicode("🎉")))
            .await
            .expect("bystander reaction");

        let dialogue_id = DialogueId(token.split_once(';').expect("token").1.to_string());
        assert!(fx.registry.staged_emoji(&dialogue_id).is_none());
    }

    #[tokio::test]
    async fn invoker_without_manage_roles_is_turned_away() {
        let fx = fixture();
        fx.session.update(|state| {
            state.permissions.insert(UserId("u1".to_string()), Permissions::default());
        });

        fx.service.handle_command(&command_event()).await.expect("command");

        fx.session.inspect(|state| {
            let (_, reply) = state.responses.last().expect("denial");
            assert!(reply.content.contains("Manage Roles"));
        });
        assert!(fx.store.get_dialogue(&DialogueId("any".to_string())).await.expect("get").is_none());
        assert_eq!(fx.registry.watch_count(), 0);
    }

    #[tokio::test]
    async fn bot_permission_loss_is_caught_again_at_confirm() {
        let fx = fixture();
        let token = start_dialogue(&fx).await;
        fx.service
            .handle_component(&component_event(&token, vec!["Raider"], "tok-role"))
            .await
            .expect("role selection");
        fx.service
            .observe_reaction(&reaction("u1", EmojiRef::unicode("🎉")))
            .await
            .expect("observe");

        fx.session.update(|state| {
            state.permissions.insert(UserId("bot".to_string()), Permissions::default());
        });

        fx.service
            .handle_component(&component_event(&token, vec![], "tok-done"))
            .await
            .expect("confirm");

        fx.session.inspect(|state| {
            let (_, reply) = state.responses.last().expect("denial");
            assert!(reply.content.contains("correct permissions"));
            assert!(state.added_reactions.is_empty());
        });
        assert!(fx.store.get_all_bindings().await.expect("bindings").is_empty());
    }

    #[tokio::test]
    async fn repeated_confirm_does_not_reseed_the_reaction() {
        let fx = fixture();
        let token = start_dialogue(&fx).await;
        fx.service
            .handle_component(&component_event(&token, vec!["Raider"], "tok-role"))
            .await
            .expect("role selection");
        fx.service
            .observe_reaction(&reaction("u1", EmojiRef::unicode("🎉")))
            .await
            .expect("observe");
        fx.service
            .handle_component(&component_event(&token, vec![], "tok-done"))
            .await
            .expect("first confirm");
        fx.service
            .handle_component(&component_event(&token, vec![], "tok-done-again"))
            .await
            .expect("second confirm");

        assert_eq!(fx.store.get_all_bindings().await.expect("bindings").len(), 1);
        fx.session.inspect(|state| {
            assert_eq!(state.added_reactions.len(), 1);
            assert_eq!(state.cleared_emoji.len(), 1);
        });
    }

    #[tokio::test]
    async fn confirm_after_a_restart_still_clears_and_seeds() {
        // A restart between the emoji commit and the confirm reply leaves
        // the durable record at the confirm step with no live watch.
        let fx = fixture();
        let created = fx
            .store
            .create_dialogue(DialogueProgress::started(
                GuildId("g1".to_string()),
                ChannelId("c1".to_string()),
                MessageId("m1".to_string()),
                UserId("u1".to_string()),
                Utc::now(),
            ))
            .await
            .expect("create");
        let mut progress = fx.store.get_dialogue(&created).await.expect("get").expect("present");
        progress.role_id = Some(RoleId("100".to_string()));
        progress.emoji = Some("🎉".to_string());
        fx.store.put_dialogue(progress).await.expect("put");
        assert_eq!(fx.registry.watch_count(), 0);

        let token = format!("{COMMAND};{}", created.0);
        fx.service
            .handle_component(&component_event(&token, vec![], "tok-resume"))
            .await
            .expect("confirm");

        assert_eq!(fx.store.get_all_bindings().await.expect("bindings").len(), 1);
        fx.session.inspect(|state| {
            assert_eq!(state.cleared_emoji.len(), 1);
            assert_eq!(state.added_reactions.len(), 1);
            assert_eq!(state.added_reactions[0].2, "🎉");
        });
    }

    #[tokio::test]
    async fn unknown_dialogue_token_gets_a_fresh_start_hint() {
        let fx = fixture();
        fx.service
            .handle_component(&component_event("reactionroleregister;missing", vec![], "tok"))
            .await
            .expect("component");

        fx.session.inspect(|state| {
            let (_, reply) = state.responses.last().expect("reply");
            assert!(reply.content.contains("Run the command again"));
        });
    }

    #[tokio::test]
    async fn unrelated_tokens_and_commands_are_ignored() {
        let fx = fixture();

        let mut other_command = command_event();
        other_command.command_id = "othercommand".to_string();
        fx.service.handle_command(&other_command).await.expect("command");

        fx.service
            .handle_component(&component_event("othercommand;dlg-1", vec![], "tok"))
            .await
            .expect("component");
        fx.service
            .handle_component(&component_event("garbage", vec![], "tok"))
            .await
            .expect("component");

        fx.session.inspect(|state| assert!(state.responses.is_empty()));
    }

    #[tokio::test]
    async fn idle_dialogues_expire_and_are_marked_abandoned() {
        let fx = fixture();
        let token = start_dialogue(&fx).await;
        fx.service
            .handle_component(&component_event(&token, vec!["Raider"], "tok-role"))
            .await
            .expect("role selection");

        let expired = fx.service.expire_idle(Duration::seconds(-1)).await;
        assert_eq!(expired, 1);
        assert_eq!(fx.registry.watch_count(), 0);

        let dialogue_id = DialogueId(token.split_once(';').expect("token").1.to_string());
        let stored = fx.store.get_dialogue(&dialogue_id).await.expect("get").expect("present");
        assert!(stored.abandoned);

        // A later click on the stale component gets the timeout reply.
        fx.service
            .handle_component(&component_event(&token, vec![], "tok-late"))
            .await
            .expect("late click");
        fx.session.inspect(|state| {
            let (_, reply) = state.responses.last().expect("reply");
            assert!(reply.content.contains("timed out"));
        });
    }

    #[tokio::test]
    async fn fresh_watches_survive_the_expiry_sweep() {
        let fx = fixture();
        let token = start_dialogue(&fx).await;
        fx.service
            .handle_component(&component_event(&token, vec!["Raider"], "tok-role"))
            .await
            .expect("role selection");

        let expired = fx.service.expire_idle(Duration::minutes(15)).await;
        assert_eq!(expired, 0);
        assert_eq!(fx.registry.watch_count(), 1);
    }
}
