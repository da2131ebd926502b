use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use rolecall_core::domain::binding::Binding;
use rolecall_core::domain::dialogue::DialogueProgress;
use rolecall_core::domain::ids::{ChannelId, DialogueId, GuildId, MessageId, RoleId};

use super::{BindingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBindingRepository {
    pool: DbPool,
}

impl SqlBindingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_binding(row: &sqlx::sqlite::SqliteRow) -> Result<Binding, RepositoryError> {
    let guild_id: String =
        row.try_get("guild_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let channel_id: String =
        row.try_get("channel_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let message_id: String =
        row.try_get("message_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let emoji: String = row.try_get("emoji").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_id: String =
        row.try_get("role_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;

    Ok(Binding {
        guild_id: GuildId(guild_id),
        channel_id: ChannelId(channel_id),
        message_id: MessageId(message_id),
        emoji,
        role_id: RoleId(role_id),
        created_at,
    })
}

fn decode_progress(data: &str) -> Result<DialogueProgress, RepositoryError> {
    serde_json::from_str(data).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn encode_progress(progress: &DialogueProgress) -> Result<String, RepositoryError> {
    serde_json::to_string(progress).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl BindingRepository for SqlBindingRepository {
    async fn create_dialogue(
        &self,
        progress: DialogueProgress,
    ) -> Result<DialogueId, RepositoryError> {
        let id = DialogueId(Uuid::new_v4().to_string());
        let mut stored = progress;
        stored.id = id.clone();

        let data = encode_progress(&stored)?;

        sqlx::query("INSERT INTO dialogues (id, data, updated_at) VALUES (?, ?, ?)")
            .bind(&id.0)
            .bind(&data)
            .bind(stored.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    async fn get_dialogue(
        &self,
        id: &DialogueId,
    ) -> Result<Option<DialogueProgress>, RepositoryError> {
        let row = sqlx::query("SELECT data FROM dialogues WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let data: String =
                    row.try_get("data").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(Some(decode_progress(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn put_dialogue(&self, progress: DialogueProgress) -> Result<(), RepositoryError> {
        let data = encode_progress(&progress)?;

        let result = sqlx::query("UPDATE dialogues SET data = ?, updated_at = ? WHERE id = ?")
            .bind(&data)
            .bind(progress.updated_at.to_rfc3339())
            .bind(&progress.id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("dialogue {}", progress.id.0)));
        }

        Ok(())
    }

    async fn create_binding(&self, binding: Binding) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO reaction_bindings (guild_id, channel_id, message_id, emoji, role_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(guild_id, channel_id, message_id, emoji) DO UPDATE SET
                 role_id = excluded.role_id,
                 created_at = excluded.created_at",
        )
        .bind(&binding.guild_id.0)
        .bind(&binding.channel_id.0)
        .bind(&binding.message_id.0)
        .bind(&binding.emoji)
        .bind(&binding.role_id.0)
        .bind(binding.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_bindings(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<Vec<Binding>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT guild_id, channel_id, message_id, emoji, role_id, created_at
             FROM reaction_bindings
             WHERE channel_id = ? AND message_id = ?
             ORDER BY created_at ASC",
        )
        .bind(&channel_id.0)
        .bind(&message_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_binding).collect::<Result<Vec<_>, _>>()
    }

    async fn get_all_bindings(&self) -> Result<Vec<Binding>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT guild_id, channel_id, message_id, emoji, role_id, created_at
             FROM reaction_bindings
             ORDER BY guild_id, channel_id, message_id, created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_binding).collect::<Result<Vec<_>, _>>()
    }
}
