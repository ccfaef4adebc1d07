//! 阶段覆盖存储
//!
//! 每个用户至多一条覆盖，按 user_id upsert。过期记录不删除，只是不再生效。

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::{ErrorCode, Result, ServerError};
use crate::infra::Clock;
use crate::model::{AuditRecord, CommunicationStage, StageOverride};
use crate::repository::{OverrideRepository, ProfileDirectory};
use crate::service::audit_service::AuditService;

pub struct OverrideService {
    repo: Arc<dyn OverrideRepository>,
    profiles: Arc<dyn ProfileDirectory>,
    audit: Arc<AuditService>,
    clock: Arc<dyn Clock>,
}

impl OverrideService {
    pub fn new(
        repo: Arc<dyn OverrideRepository>,
        profiles: Arc<dyn ProfileDirectory>,
        audit: Arc<AuditService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            profiles,
            audit,
            clock,
        }
    }

    pub async fn get(&self, user_id: u64) -> Result<Option<StageOverride>> {
        self.repo.find_override(user_id).await
    }

    /// 创建或替换覆盖
    ///
    /// `forced_stage` 以字符串接收，非法值返回 INVALID_STAGE；目标用户不存在返回 USER_NOT_FOUND。
    pub async fn upsert(
        &self,
        user_id: u64,
        forced_stage: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<StageOverride> {
        let forced_stage: CommunicationStage = forced_stage.parse().map_err(|e| {
            ServerError::validation(ErrorCode::InvalidStage, format!("{}", e))
        })?;

        if !self.profiles.user_exists(user_id).await? {
            return Err(ServerError::not_found(
                ErrorCode::UserNotFound,
                format!("用户不存在: {}", user_id),
            ));
        }

        let stage_override = StageOverride {
            user_id,
            forced_stage,
            expires_at,
            updated_at: self.clock.now(),
        };
        self.repo.upsert_override(&stage_override).await?;

        info!(
            "✅ 用户 {} 的阶段覆盖已设置: {} (expires_at={:?})",
            user_id, forced_stage, expires_at
        );
        self.audit
            .record(
                AuditRecord::admin_actor(),
                "override.upsert",
                Some(AuditRecord::user_actor(user_id)),
                json!({ "forced_stage": forced_stage, "expires_at": expires_at }),
            )
            .await;

        Ok(stage_override)
    }

    /// 删除覆盖；不存在时同样成功
    pub async fn delete(&self, user_id: u64) -> Result<()> {
        let removed = self.repo.delete_override(user_id).await?;
        if removed {
            info!("🗑️ 用户 {} 的阶段覆盖已删除", user_id);
            self.audit
                .record(
                    AuditRecord::admin_actor(),
                    "override.delete",
                    Some(AuditRecord::user_actor(user_id)),
                    json!({}),
                )
                .await;
        }
        Ok(())
    }
}
