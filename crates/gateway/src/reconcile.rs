use std::sync::Arc;

use tracing::{info, warn};

use rolecall_core::domain::ids::{GuildId, UserId};
use rolecall_core::errors::ReactionRoleError;
use rolecall_core::Binding;
use rolecall_db::repositories::RepositoryError;
use rolecall_db::BindingRepository;

use crate::members::MembershipIndex;
use crate::session::GatewaySession;

#[derive(Clone, Debug)]
pub struct ReconcileConfig {
    pub page_size: u16,
    /// Remove reactions left behind by users who are no longer guild
    /// members. Off by default; stale reactions are otherwise harmless.
    pub remove_departed: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { page_size: 100, remove_departed: false }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub bindings_scanned: usize,
    pub pages_fetched: usize,
    pub grants_applied: usize,
    pub already_held: usize,
    pub departed_skipped: usize,
    pub departed_removed: usize,
    pub failures: usize,
}

/// Startup catch-up: walks the reaction history of every binding in a
/// guild and grants roles that were earned while the process was down.
/// Revokes are deliberately not replayed; a reaction that disappeared
/// offline leaves the role in place.
pub struct ReconciliationEngine {
    store: Arc<dyn BindingRepository>,
    session: Arc<dyn GatewaySession>,
    index: Arc<MembershipIndex>,
    config: ReconcileConfig,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn BindingRepository>,
        session: Arc<dyn GatewaySession>,
        index: Arc<MembershipIndex>,
        config: ReconcileConfig,
    ) -> Self {
        Self { store, session, index, config }
    }

    pub async fn run_guild(&self, guild_id: &GuildId) -> Result<ReconcileStats, ReactionRoleError> {
        self.session.request_members(guild_id).await?;
        self.index.wait_complete(guild_id).await;

        let bindings: Vec<Binding> = self
            .store
            .get_all_bindings()
            .await
            .map_err(storage)?
            .into_iter()
            .filter(|binding| binding.guild_id == *guild_id)
            .collect();

        let mut stats = ReconcileStats::default();
        for binding in &bindings {
            stats.bindings_scanned += 1;
            // A binding whose message is gone must not abort the rest of
            // the guild; the failure is counted and the scan moves on.
            if let Err(error) = self.reconcile_binding(binding, &mut stats).await {
                warn!(
                    message_id = %binding.message_id.0,
                    emoji = %binding.emoji,
                    error = %error,
                    "skipping binding after reconciliation failure"
                );
                stats.failures += 1;
            }
        }

        info!(
            guild_id = %guild_id.0,
            bindings = stats.bindings_scanned,
            pages = stats.pages_fetched,
            grants = stats.grants_applied,
            already_held = stats.already_held,
            failures = stats.failures,
            "guild reconciliation complete"
        );
        Ok(stats)
    }

    async fn reconcile_binding(
        &self,
        binding: &Binding,
        stats: &mut ReconcileStats,
    ) -> Result<(), ReactionRoleError> {
        let page_size = self.config.page_size.clamp(1, 100);
        let mut cursor: Option<UserId> = None;

        loop {
            let page = self
                .session
                .message_reactions(
                    &binding.channel_id,
                    &binding.message_id,
                    &binding.emoji,
                    cursor.as_ref(),
                    page_size,
                )
                .await?;
            stats.pages_fetched += 1;

            for user_id in &page {
                self.reconcile_reactor(binding, user_id, stats).await;
            }

            if page.len() < page_size as usize {
                return Ok(());
            }

            let next_cursor = page.last().cloned();
            if next_cursor == cursor {
                warn!(
                    message_id = %binding.message_id.0,
                    emoji = %binding.emoji,
                    "reaction page cursor did not advance, stopping scan"
                );
                return Ok(());
            }
            cursor = next_cursor;
        }
    }

    async fn reconcile_reactor(
        &self,
        binding: &Binding,
        user_id: &UserId,
        stats: &mut ReconcileStats,
    ) {
        if *user_id == self.session.bot_user_id() {
            return;
        }

        if !self.index.has_member(&binding.guild_id, user_id) {
            if self.config.remove_departed {
                match self
                    .session
                    .remove_reaction(&binding.channel_id, &binding.message_id, &binding.emoji, user_id)
                    .await
                {
                    Ok(()) => stats.departed_removed += 1,
                    Err(error) => {
                        warn!(user_id = %user_id.0, error = %error, "failed to remove departed member's reaction");
                        stats.failures += 1;
                    }
                }
            } else {
                stats.departed_skipped += 1;
            }
            return;
        }

        if self.index.has_role(&binding.guild_id, user_id, &binding.role_id) {
            stats.already_held += 1;
            return;
        }

        match self
            .session
            .add_member_role(&binding.guild_id, user_id, &binding.role_id)
            .await
        {
            Ok(()) => {
                self.index.record_role_granted(&binding.guild_id, user_id, &binding.role_id);
                stats.grants_applied += 1;
            }
            Err(error) => {
                warn!(
                    user_id = %user_id.0,
                    role_id = %binding.role_id.0,
                    error = %error,
                    "failed to grant role during reconciliation"
                );
                stats.failures += 1;
            }
        }
    }
}

fn storage(error: RepositoryError) -> ReactionRoleError {
    ReactionRoleError::StorageUnavailable(error.to_string())
}
