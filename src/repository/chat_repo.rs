//! 快捷聊天事件与群消息仓库 - PostgreSQL 实现
//!
//! 同时充当限流用的动作日志：窗口内的计数直接从这两张表统计。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::{Result, ServerError};
use crate::model::{GroupMessage, QuickChatEvent};
use crate::repository::{ActionLog, ChannelKey, ChatRepository};

/// 聊天仓库 (PostgreSQL 实现)
#[derive(Clone)]
pub struct PgChatRepository {
    pool: Arc<PgPool>,
}

impl PgChatRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionLog for PgChatRepository {
    async fn count_actions_since(&self, user_id: u64, channel: &ChannelKey, since: DateTime<Utc>) -> Result<u64> {
        let count: i64 = match channel {
            ChannelKey::QuickChat => sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM privchat_quick_chat_events
                WHERE from_user_id = $1 AND created_at >= $2
                "#,
            )
            .bind(user_id as i64)
            .bind(since.timestamp_millis())
            .fetch_one(self.pool.as_ref())
            .await,
            ChannelKey::Group(group_id) => sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM privchat_group_messages
                WHERE group_id = $1 AND sender_id = $2 AND created_at >= $3
                "#,
            )
            .bind(*group_id as i64)
            .bind(user_id as i64)
            .bind(since.timestamp_millis())
            .fetch_one(self.pool.as_ref())
            .await,
        }
        .map_err(|e| ServerError::dependency(format!("统计 {} 动作数失败: {}", channel, e)))?;

        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn insert_quick_chat_event(&self, event: &QuickChatEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO privchat_quick_chat_events
                (id, from_user_id, to_user_id, quick_message_id, context, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.from_user_id as i64)
        .bind(event.to_user_id as i64)
        .bind(event.quick_message_id as i64)
        .bind(event.context.as_deref())
        .bind(event.created_at.timestamp_millis())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("写入快捷聊天事件失败: {}", e)))?;
        Ok(())
    }

    async fn insert_group_message(&self, message: &GroupMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO privchat_group_messages
                (id, group_id, sender_id, message_type, quick_message_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id)
        .bind(message.group_id as i64)
        .bind(message.sender_id as i64)
        .bind(message.kind.as_str())
        .bind(message.quick_message_id.map(|id| id as i64))
        .bind(&message.content)
        .bind(message.created_at.timestamp_millis())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("写入群消息失败: {}", e)))?;
        Ok(())
    }
}
