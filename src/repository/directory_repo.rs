//! 外部事实查询 - PostgreSQL 实现
//!
//! 用户、好友、黑名单、群组、预设消息这些表由主服务维护，这里只读。

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::error::{Result, ServerError};
use crate::model::{
    AccountModeration, GroupInfo, GroupMembership, QuickMessage, QuickMessageCategory,
};
use crate::repository::{
    EngagementCounter, GroupDirectory, ModerationDirectory, ProfileDirectory, QuickMessageCatalog,
    RelationshipDirectory,
};

/// 好友关系已接受状态（与 privchat_friendships.status 一致）
const FRIENDSHIP_ACCEPTED: i16 = 1;

/// 外部目录 (PostgreSQL 实现)
#[derive(Clone)]
pub struct PgDirectory {
    pool: Arc<PgPool>,
}

impl PgDirectory {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EngagementCounter for PgDirectory {
    async fn total_ads_viewed(&self, user_id: u64) -> Result<Option<i64>> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT ads_watched FROM privchat_users WHERE user_id = $1")
                .bind(user_id as i64)
                .fetch_optional(self.pool.as_ref())
                .await
                .map_err(|e| ServerError::dependency(format!("查询广告观看数失败: {}", e)))?;
        Ok(row.and_then(|(ads,)| ads))
    }
}

#[async_trait]
impl ProfileDirectory for PgDirectory {
    async fn user_exists(&self, user_id: u64) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM privchat_users WHERE user_id = $1)")
                .bind(user_id as i64)
                .fetch_one(self.pool.as_ref())
                .await
                .map_err(|e| ServerError::dependency(format!("查询用户失败: {}", e)))?;
        Ok(exists)
    }
}

#[async_trait]
impl RelationshipDirectory for PgDirectory {
    async fn are_friends(&self, user_a: u64, user_b: u64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM privchat_friendships
                WHERE user_id = $1 AND friend_id = $2 AND status = $3
            )
            "#,
        )
        .bind(user_a as i64)
        .bind(user_b as i64)
        .bind(FRIENDSHIP_ACCEPTED)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("查询好友关系失败: {}", e)))?;
        Ok(exists)
    }

    async fn is_blocked_between(&self, user_a: u64, user_b: u64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM privchat_user_blacklist
                WHERE (user_id = $1 AND blocked_user_id = $2)
                   OR (user_id = $2 AND blocked_user_id = $1)
            )
            "#,
        )
        .bind(user_a as i64)
        .bind(user_b as i64)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("查询黑名单失败: {}", e)))?;
        Ok(exists)
    }
}

#[async_trait]
impl ModerationDirectory for PgDirectory {
    async fn account_moderation(&self, user_id: u64) -> Result<AccountModeration> {
        let row: Option<(bool, Option<i64>)> = sqlx::query_as(
            "SELECT is_blocked, chat_muted_until FROM privchat_users WHERE user_id = $1",
        )
        .bind(user_id as i64)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("查询审核状态失败: {}", e)))?;

        Ok(match row {
            Some((blocked, muted_until)) => AccountModeration {
                blocked,
                chat_muted_until: muted_until.and_then(DateTime::from_timestamp_millis),
            },
            None => AccountModeration::default(),
        })
    }
}

#[async_trait]
impl GroupDirectory for PgDirectory {
    async fn find_group(&self, group_id: u64) -> Result<Option<GroupInfo>> {
        let row: Option<(i64, String, bool)> = sqlx::query_as(
            "SELECT group_id, name, is_active FROM privchat_groups WHERE group_id = $1",
        )
        .bind(group_id as i64)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("查询群组失败: {}", e)))?;

        Ok(row.map(|(group_id, name, is_active)| GroupInfo {
            group_id: group_id as u64,
            name,
            is_active,
        }))
    }

    async fn find_membership(&self, group_id: u64, user_id: u64) -> Result<Option<GroupMembership>> {
        // 已退群的成员不算
        let row: Option<(Option<i64>,)> = sqlx::query_as(
            r#"
            SELECT muted_until FROM privchat_group_members
            WHERE group_id = $1 AND user_id = $2 AND left_at IS NULL
            "#,
        )
        .bind(group_id as i64)
        .bind(user_id as i64)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("查询群成员失败: {}", e)))?;

        Ok(row.map(|(muted_until,)| GroupMembership {
            group_id,
            user_id,
            muted_until: muted_until.and_then(DateTime::from_timestamp_millis),
        }))
    }
}

#[async_trait]
impl QuickMessageCatalog for PgDirectory {
    async fn find_quick_message(&self, quick_message_id: u64) -> Result<Option<QuickMessage>> {
        let row: Option<(i64, String, String, bool)> = sqlx::query_as(
            "SELECT id, category, content, is_active FROM privchat_quick_messages WHERE id = $1",
        )
        .bind(quick_message_id as i64)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("查询预设消息失败: {}", e)))?;

        let Some((id, category, content, is_active)) = row else {
            return Ok(None);
        };

        match QuickMessageCategory::from_db(&category) {
            Some(category) => Ok(Some(QuickMessage {
                id: id as u64,
                category,
                content,
                is_active,
            })),
            None => {
                warn!("⚠️ 预设消息 {} 的分类无法识别: {}", id, category);
                Ok(None)
            }
        }
    }
}
