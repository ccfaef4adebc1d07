//! 阈值存储
//!
//! 读取走分层解析；存储中还没有阈值记录时，第一次读取会把解析结果落库。
//! 更新是部分合并，合并后的结果必须满足顺序约束，否则不写入。

use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::model::{AuditRecord, ThresholdConfig, ThresholdUpdate};
use crate::repository::SettingsRepository;
use crate::service::audit_service::AuditService;
use crate::service::settings_resolver::{
    SettingsResolver, KEY_CUSTOM_MIN_ADS, KEY_PRESET_ONLY_MAX_ADS, KEY_VOICE_MIN_ADS,
};

pub struct ThresholdService {
    resolver: Arc<SettingsResolver>,
    repo: Arc<dyn SettingsRepository>,
    audit: Arc<AuditService>,
}

impl ThresholdService {
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

    /// 当前生效的阈值
    pub async fn get(&self) -> Result<ThresholdConfig> {
        let resolved = self.resolver.resolve_thresholds().await?;
        if !resolved.stored {
            self.persist(&resolved.config).await?;
            info!(
                "📦 阈值记录不存在，已按默认值创建: {}/{}/{}",
                resolved.config.preset_only_max_ads,
                resolved.config.custom_min_ads,
                resolved.config.voice_min_ads
            );
        }
        Ok(resolved.config)
    }

    /// 部分更新
    pub async fn update(&self, update: &ThresholdUpdate) -> Result<ThresholdConfig> {
        let current = self.resolver.resolve_thresholds().await?.config;
        let merged = update.merge_onto(&current)?;
        self.persist(&merged).await?;

        info!(
            "✅ 沟通阈值已更新: {}/{}/{} -> {}/{}/{}",
            current.preset_only_max_ads,
            current.custom_min_ads,
            current.voice_min_ads,
            merged.preset_only_max_ads,
            merged.custom_min_ads,
            merged.voice_min_ads
        );
        self.audit
            .record(
                AuditRecord::admin_actor(),
                "policy.update",
                None,
                json!({ "before": current, "after": merged }),
            )
            .await;

        Ok(merged)
    }

    async fn persist(&self, config: &ThresholdConfig) -> Result<()> {
        self.repo
            .save_settings(&[
                (KEY_PRESET_ONLY_MAX_ADS.to_string(), config.preset_only_max_ads.to_string()),
                (KEY_CUSTOM_MIN_ADS.to_string(), config.custom_min_ads.to_string()),
                (KEY_VOICE_MIN_ADS.to_string(), config.voice_min_ads.to_string()),
            ])
            .await
    }
}
