//! 阶段覆盖仓库 - PostgreSQL 实现

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::error::{Result, ServerError};
use crate::model::{CommunicationStage, StageOverride};
use crate::repository::OverrideRepository;

/// 阶段覆盖仓库 (PostgreSQL 实现，privchat_stage_overrides 表)
#[derive(Clone)]
pub struct PgOverrideRepository {
    pool: Arc<PgPool>,
}

impl PgOverrideRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OverrideRepository for PgOverrideRepository {
    async fn find_override(&self, user_id: u64) -> Result<Option<StageOverride>> {
        #[derive(sqlx::FromRow)]
        struct OverrideRow {
            user_id: i64,
            forced_stage: String,
            expires_at: Option<i64>,
            updated_at: i64,
        }

        let row = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT user_id, forced_stage, expires_at, updated_at
            FROM privchat_stage_overrides
            WHERE user_id = $1
            "#,
        )
        .bind(user_id as i64)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("查询阶段覆盖失败: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        // 表上有 CHECK 约束，这里仍然按“无法识别即不生效”处理
        let forced_stage = match row.forced_stage.parse::<CommunicationStage>() {
            Ok(stage) => stage,
            Err(e) => {
                warn!("⚠️ 用户 {} 的阶段覆盖无法识别，忽略: {}", user_id, e);
                return Ok(None);
            }
        };

        Ok(Some(StageOverride {
            user_id: row.user_id as u64,
            forced_stage,
            expires_at: row.expires_at.and_then(DateTime::from_timestamp_millis),
            updated_at: DateTime::from_timestamp_millis(row.updated_at).unwrap_or_default(),
        }))
    }

    async fn upsert_override(&self, stage_override: &StageOverride) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO privchat_stage_overrides (user_id, forced_stage, expires_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET forced_stage = EXCLUDED.forced_stage,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(stage_override.user_id as i64)
        .bind(stage_override.forced_stage.as_str())
        .bind(stage_override.expires_at.map(|dt| dt.timestamp_millis()))
        .bind(stage_override.updated_at.timestamp_millis())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("写入阶段覆盖失败: {}", e)))?;
        Ok(())
    }

    async fn delete_override(&self, user_id: u64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM privchat_stage_overrides WHERE user_id = $1")
            .bind(user_id as i64)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| ServerError::dependency(format!("删除阶段覆盖失败: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }
}
