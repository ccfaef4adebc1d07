//! 聊天设置（管理员可调的群聊限流）

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::{ErrorCode, Result, ServerError};
use crate::model::AuditRecord;
use crate::repository::SettingsRepository;
use crate::service::audit_service::AuditService;
use crate::service::settings_resolver::{SettingsResolver, KEY_GROUP_CHAT_RATE_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// 每人每群每分钟条数，0 表示不限
    pub group_chat_rate_limit_per_minute: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSettingsUpdate {
    pub group_chat_rate_limit_per_minute: Option<i64>,
}

pub struct ChatSettingsService {
    resolver: Arc<SettingsResolver>,
    repo: Arc<dyn SettingsRepository>,
    audit: Arc<AuditService>,
}

impl ChatSettingsService {
    pub fn new(
        resolver: Arc<SettingsResolver>,
        repo: Arc<dyn SettingsRepository>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            resolver,
            repo,
            audit,
        }
    }

    pub async fn get(&self) -> Result<ChatSettings> {
        Ok(ChatSettings {
            group_chat_rate_limit_per_minute: self.resolver.group_chat_rate_limit().await?,
        })
    }

    pub async fn update(&self, update: &ChatSettingsUpdate) -> Result<ChatSettings> {
        let current = self.get().await?;
        let Some(limit) = update.group_chat_rate_limit_per_minute else {
            return Ok(current);
        };
        if limit < 0 {
            return Err(ServerError::validation(
                ErrorCode::ValidationFailed,
                format!("group_chat_rate_limit_per_minute 不能为负数: {}", limit),
            ));
        }

        self.repo
            .save_settings(&[(KEY_GROUP_CHAT_RATE_LIMIT.to_string(), limit.to_string())])
            .await?;

        let updated = ChatSettings {
            group_chat_rate_limit_per_minute: limit,
        };
        info!(
            "✅ 群聊限流已更新: {} -> {}",
            current.group_chat_rate_limit_per_minute, limit
        );
        self.audit
            .record(
                AuditRecord::admin_actor(),
                "chat_settings.update",
                None,
                json!({ "before": current, "after": updated }),
            )
            .await;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{MemoryStore, SystemClock};
    use crate::service::settings_resolver::{PolicyDefaults, DEFAULT_GROUP_CHAT_RATE_LIMIT};

    fn service(store: &Arc<MemoryStore>) -> ChatSettingsService {
        let resolver = Arc::new(SettingsResolver::new(store.clone(), PolicyDefaults::default()));
        let audit = Arc::new(AuditService::new(store.clone(), Arc::new(SystemClock)));
        ChatSettingsService::new(resolver, store.clone(), audit)
    }

    #[tokio::test]
    async fn test_default_and_update() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);
        assert_eq!(
            service.get().await.unwrap().group_chat_rate_limit_per_minute,
            DEFAULT_GROUP_CHAT_RATE_LIMIT
        );

        let updated = service
            .update(&ChatSettingsUpdate {
                group_chat_rate_limit_per_minute: Some(0),
            })
            .await
            .unwrap();
        assert_eq!(updated.group_chat_rate_limit_per_minute, 0);
        assert_eq!(service.get().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_negative_limit_rejected() {
        let store = Arc::new(MemoryStore::new());
        let err = service(&store)
            .update(&ChatSettingsUpdate {
                group_chat_rate_limit_per_minute: Some(-1),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(store.setting(KEY_GROUP_CHAT_RATE_LIMIT).is_none());
    }
}
