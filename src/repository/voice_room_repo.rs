//! 语音房仓库 - PostgreSQL 实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::{Result, ServerError};
use crate::model::{RoomRef, VoiceRoom};
use crate::repository::VoiceRoomDirectory;

#[derive(sqlx::FromRow)]
struct VoiceRoomRow {
    room_id: i64,
    room_code: String,
    name: String,
    channel_name: String,
    is_active: bool,
    max_participants: Option<i32>,
}

impl From<VoiceRoomRow> for VoiceRoom {
    fn from(row: VoiceRoomRow) -> Self {
        Self {
            room_id: row.room_id as u64,
            room_code: row.room_code,
            name: row.name,
            channel_name: row.channel_name,
            is_active: row.is_active,
            max_participants: row.max_participants.filter(|m| *m > 0).map(|m| m as u32),
        }
    }
}

/// 语音房仓库 (PostgreSQL 实现)
#[derive(Clone)]
pub struct PgVoiceRoomRepository {
    pool: Arc<PgPool>,
}

impl PgVoiceRoomRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoiceRoomDirectory for PgVoiceRoomRepository {
    async fn find_room(&self, room: &RoomRef) -> Result<Option<VoiceRoom>> {
        let query = match room {
            RoomRef::Id(id) => sqlx::query_as::<_, VoiceRoomRow>(
                r#"
                SELECT room_id, room_code, name, channel_name, is_active, max_participants
                FROM privchat_voice_rooms WHERE room_id = $1
                "#,
            )
            .bind(*id as i64),
            RoomRef::Code(code) => sqlx::query_as::<_, VoiceRoomRow>(
                r#"
                SELECT room_id, room_code, name, channel_name, is_active, max_participants
                FROM privchat_voice_rooms WHERE room_code = $1
                "#,
            )
            .bind(code.clone()),
        };

        let row = query
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| ServerError::dependency(format!("查询语音房失败: {}", e)))?;
        Ok(row.map(VoiceRoom::from))
    }

    async fn count_participants(&self, room_id: u64) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM privchat_voice_participants WHERE room_id = $1")
                .bind(room_id as i64)
                .fetch_one(self.pool.as_ref())
                .await
                .map_err(|e| ServerError::dependency(format!("统计语音房人数失败: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    async fn is_participant(&self, room_id: u64, user_id: u64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM privchat_voice_participants WHERE room_id = $1 AND user_id = $2)",
        )
        .bind(room_id as i64)
        .bind(user_id as i64)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("查询语音房成员失败: {}", e)))?;
        Ok(exists)
    }

    async fn add_participant(&self, room_id: u64, user_id: u64, joined_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO privchat_voice_participants (room_id, user_id, joined_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (room_id, user_id) DO UPDATE SET joined_at = EXCLUDED.joined_at
            "#,
        )
        .bind(room_id as i64)
        .bind(user_id as i64)
        .bind(joined_at.timestamp_millis())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("登记语音房成员失败: {}", e)))?;
        Ok(())
    }
}
