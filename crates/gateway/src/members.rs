use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::Notify;
use tracing::debug;

use rolecall_core::domain::ids::{GuildId, RoleId, UserId};

use crate::events::MemberChunkEvent;

#[derive(Default)]
struct GuildMembers {
    members: HashMap<UserId, HashSet<RoleId>>,
    complete: bool,
}

/// In-memory roster of guild members and their roles, filled from member
/// chunk events. Reconciliation waits for a guild's roster to complete
/// before walking reaction history.
#[derive(Default)]
pub struct MembershipIndex {
    guilds: RwLock<HashMap<GuildId, GuildMembers>>,
    notifiers: Mutex<HashMap<GuildId, Arc<Notify>>>,
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_chunk(&self, chunk: &MemberChunkEvent) {
        {
            let mut guilds = write_lock(&self.guilds);
            let guild = guilds.entry(chunk.guild_id.clone()).or_default();

            for member in &chunk.members {
                guild
                    .members
                    .insert(member.user_id.clone(), member.role_ids.iter().cloned().collect());
            }

            if chunk.chunk_index + 1 >= chunk.chunk_count {
                guild.complete = true;
                debug!(
                    guild_id = %chunk.guild_id.0,
                    members = guild.members.len(),
                    "guild member roster complete"
                );
            }
        }

        self.notifier(&chunk.guild_id).notify_waiters();
    }

    /// Waits until every member chunk for the guild has arrived.
    pub async fn wait_complete(&self, guild_id: &GuildId) {
        loop {
            // The notified future must exist before the flag re-check, or a
            // chunk landing in between would be missed.
            let notify = self.notifier(guild_id);
            let notified = notify.notified();

            if self.is_complete(guild_id) {
                return;
            }

            notified.await;
        }
    }

    pub fn is_complete(&self, guild_id: &GuildId) -> bool {
        read_lock(&self.guilds).get(guild_id).is_some_and(|guild| guild.complete)
    }

    pub fn has_member(&self, guild_id: &GuildId, user_id: &UserId) -> bool {
        read_lock(&self.guilds)
            .get(guild_id)
            .is_some_and(|guild| guild.members.contains_key(user_id))
    }

    /// True only when the roster is complete and the user is absent from
    /// it. An incomplete roster never vouches for anyone's absence.
    pub fn is_known_absent(&self, guild_id: &GuildId, user_id: &UserId) -> bool {
        read_lock(&self.guilds)
            .get(guild_id)
            .is_some_and(|guild| guild.complete && !guild.members.contains_key(user_id))
    }

    pub fn has_role(&self, guild_id: &GuildId, user_id: &UserId, role_id: &RoleId) -> bool {
        read_lock(&self.guilds).get(guild_id).is_some_and(|guild| {
            guild.members.get(user_id).is_some_and(|roles| roles.contains(role_id))
        })
    }

    pub fn record_role_granted(&self, guild_id: &GuildId, user_id: &UserId, role_id: &RoleId) {
        let mut guilds = write_lock(&self.guilds);
        if let Some(roles) =
            guilds.get_mut(guild_id).and_then(|guild| guild.members.get_mut(user_id))
        {
            roles.insert(role_id.clone());
        }
    }

    pub fn record_role_revoked(&self, guild_id: &GuildId, user_id: &UserId, role_id: &RoleId) {
        let mut guilds = write_lock(&self.guilds);
        if let Some(roles) =
            guilds.get_mut(guild_id).and_then(|guild| guild.members.get_mut(user_id))
        {
            roles.remove(role_id);
        }
    }

    pub fn member_count(&self, guild_id: &GuildId) -> usize {
        read_lock(&self.guilds).get(guild_id).map_or(0, |guild| guild.members.len())
    }

    fn notifier(&self, guild_id: &GuildId) -> Arc<Notify> {
        let mut notifiers = match self.notifiers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        notifiers.entry(guild_id.clone()).or_default().clone()
    }
}

fn read_lock(
    lock: &RwLock<HashMap<GuildId, GuildMembers>>,
) -> std::sync::RwLockReadGuard<'_, HashMap<GuildId, GuildMembers>> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock(
    lock: &RwLock<HashMap<GuildId, GuildMembers>>,
) -> std::sync::RwLockWriteGuard<'_, HashMap<GuildId, GuildMembers>> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
