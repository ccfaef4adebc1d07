//! 沟通策略模型：阈值、覆盖、状态

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, Result, ServerError};
use crate::model::stage::{Capability, CommunicationStage};

/// 编译期默认阈值
pub const DEFAULT_PRESET_ONLY_MAX_ADS: u64 = 99;
pub const DEFAULT_CUSTOM_MIN_ADS: u64 = 100;
pub const DEFAULT_VOICE_MIN_ADS: u64 = 500;

/// 管理员配置的广告数阈值
///
/// 不变量：`preset_only_max_ads < custom_min_ads <= voice_min_ads`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub preset_only_max_ads: u64,
    pub custom_min_ads: u64,
    pub voice_min_ads: u64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            preset_only_max_ads: DEFAULT_PRESET_ONLY_MAX_ADS,
            custom_min_ads: DEFAULT_CUSTOM_MIN_ADS,
            voice_min_ads: DEFAULT_VOICE_MIN_ADS,
        }
    }
}

impl ThresholdConfig {
    /// 校验顺序不变量
    pub fn validate(&self) -> Result<()> {
        if self.preset_only_max_ads >= self.custom_min_ads {
            return Err(ServerError::validation(
                ErrorCode::InvalidThresholds,
                format!(
                    "preset_only_max_ads ({}) 必须小于 custom_min_ads ({})",
                    self.preset_only_max_ads, self.custom_min_ads
                ),
            ));
        }
        if self.custom_min_ads > self.voice_min_ads {
            return Err(ServerError::validation(
                ErrorCode::InvalidThresholds,
                format!(
                    "custom_min_ads ({}) 不能大于 voice_min_ads ({})",
                    self.custom_min_ads, self.voice_min_ads
                ),
            ));
        }
        Ok(())
    }

    /// 仅由广告数决定的基础阶段
    pub fn base_stage(&self, total_ads_viewed: u64) -> CommunicationStage {
        if total_ads_viewed >= self.voice_min_ads {
            CommunicationStage::VoiceEnabled
        } else if total_ads_viewed >= self.custom_min_ads {
            CommunicationStage::CustomText
        } else {
            CommunicationStage::PresetOnly
        }
    }
}

/// 阈值的部分更新（PUT policy 请求体）
///
/// 字段用有符号整数接收，负数在这里转成校验错误而不是反序列化失败。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    pub preset_only_max_ads: Option<i64>,
    pub custom_min_ads: Option<i64>,
    pub voice_min_ads: Option<i64>,
}

impl ThresholdUpdate {
    pub fn is_empty(&self) -> bool {
        self.preset_only_max_ads.is_none()
            && self.custom_min_ads.is_none()
            && self.voice_min_ads.is_none()
    }

    /// 合并到当前配置上，并对合并后的结果校验不变量
    pub fn merge_onto(&self, current: &ThresholdConfig) -> Result<ThresholdConfig> {
        let merged = ThresholdConfig {
            preset_only_max_ads: non_negative("preset_only_max_ads", self.preset_only_max_ads)?
                .unwrap_or(current.preset_only_max_ads),
            custom_min_ads: non_negative("custom_min_ads", self.custom_min_ads)?
                .unwrap_or(current.custom_min_ads),
            voice_min_ads: non_negative("voice_min_ads", self.voice_min_ads)?
                .unwrap_or(current.voice_min_ads),
        };
        merged.validate()?;
        Ok(merged)
    }
}

fn non_negative(field: &str, value: Option<i64>) -> Result<Option<u64>> {
    match value {
        Some(v) if v < 0 => Err(ServerError::validation(
            ErrorCode::InvalidThresholds,
            format!("{} 不能为负数: {}", field, v),
        )),
        Some(v) => Ok(Some(v as u64)),
        None => Ok(None),
    }
}

/// 单个用户的强制阶段覆盖（每个用户至多一条）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOverride {
    pub user_id: u64,
    pub forced_stage: CommunicationStage,
    /// None 表示永久有效
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StageOverride {
    /// expires_at 为空或在将来时有效；过期的记录不会被删除，只是不再生效
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at > now,
        }
    }
}

/// 用户当前的沟通状态（派生值，不持久化，也不跨请求缓存）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationStatus {
    pub user_id: u64,
    pub total_ads_viewed: u64,
    /// 生效阶段（覆盖优先）
    pub communication_stage: CommunicationStage,
    /// 仅由广告数计算出的阶段
    pub base_stage: CommunicationStage,
    /// 生效中的覆盖阶段
    pub override_stage: Option<CommunicationStage>,
    pub override_expires_at: Option<DateTime<Utc>>,
    pub can_use_preset_quick_chat: bool,
    pub can_use_custom_text_chat: bool,
    pub can_use_voice_chat: bool,
    pub preset_only_max_ads: u64,
    pub custom_min_ads: u64,
    pub voice_min_ads: u64,
    pub ads_needed_for_custom_text: u64,
    pub ads_needed_for_voice_chat: u64,
}

impl CommunicationStatus {
    /// 由广告数、阈值和（可选的）覆盖推导状态
    pub fn derive(
        user_id: u64,
        total_ads_viewed: u64,
        thresholds: &ThresholdConfig,
        stage_override: Option<&StageOverride>,
        now: DateTime<Utc>,
    ) -> Self {
        let base_stage = thresholds.base_stage(total_ads_viewed);
        let active_override = stage_override.filter(|o| o.is_active(now));
        let override_stage = active_override.map(|o| o.forced_stage);
        // 覆盖是对基础阶段的整体替换，可以提前解锁也可以强制降级
        let communication_stage = override_stage.unwrap_or(base_stage);

        let can_use_custom_text_chat = communication_stage.allows(Capability::CustomTextChat);
        let can_use_voice_chat = communication_stage.allows(Capability::VoiceChat);

        Self {
            user_id,
            total_ads_viewed,
            communication_stage,
            base_stage,
            override_stage,
            override_expires_at: active_override.and_then(|o| o.expires_at),
            can_use_preset_quick_chat: communication_stage.allows(Capability::PresetQuickChat),
            can_use_custom_text_chat,
            can_use_voice_chat,
            preset_only_max_ads: thresholds.preset_only_max_ads,
            custom_min_ads: thresholds.custom_min_ads,
            voice_min_ads: thresholds.voice_min_ads,
            ads_needed_for_custom_text: ads_needed(
                total_ads_viewed,
                thresholds.custom_min_ads,
                can_use_custom_text_chat,
            ),
            ads_needed_for_voice_chat: ads_needed(
                total_ads_viewed,
                thresholds.voice_min_ads,
                can_use_voice_chat,
            ),
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::PresetQuickChat => self.can_use_preset_quick_chat,
            Capability::CustomTextChat => self.can_use_custom_text_chat,
            Capability::VoiceChat => self.can_use_voice_chat,
        }
    }

    pub fn ads_needed_for(&self, capability: Capability) -> u64 {
        match capability {
            Capability::PresetQuickChat => 0,
            Capability::CustomTextChat => self.ads_needed_for_custom_text,
            Capability::VoiceChat => self.ads_needed_for_voice_chat,
        }
    }
}

fn ads_needed(total_ads_viewed: u64, threshold: u64, unlocked: bool) -> u64 {
    if unlocked || threshold == 0 {
        0
    } else {
        threshold.saturating_sub(total_ads_viewed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn thresholds(preset: u64, custom: u64, voice: u64) -> ThresholdConfig {
        ThresholdConfig {
            preset_only_max_ads: preset,
            custom_min_ads: custom,
            voice_min_ads: voice,
        }
    }

    fn forced(stage: CommunicationStage, expires_at: Option<DateTime<Utc>>) -> StageOverride {
        StageOverride {
            user_id: 7,
            forced_stage: stage,
            expires_at,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_threshold_ordering_invariant() {
        assert!(ThresholdConfig::default().validate().is_ok());
        assert!(thresholds(5, 10, 10).validate().is_ok());
        assert!(thresholds(10, 10, 50).validate().is_err());
        assert!(thresholds(11, 10, 50).validate().is_err());
        assert!(thresholds(5, 51, 50).validate().is_err());
    }

    #[test]
    fn test_update_validates_merged_result() {
        let current = thresholds(5, 10, 50);

        let only_voice = ThresholdUpdate {
            voice_min_ads: Some(20),
            ..Default::default()
        };
        assert_eq!(only_voice.merge_onto(&current).unwrap(), thresholds(5, 10, 20));

        // 单独看 preset=10 合法，但与现有 custom=10 合并后违反不变量
        let bad = ThresholdUpdate {
            preset_only_max_ads: Some(10),
            ..Default::default()
        };
        let err = bad.merge_onto(&current).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidThresholds);

        let negative = ThresholdUpdate {
            custom_min_ads: Some(-1),
            ..Default::default()
        };
        assert!(negative.merge_onto(&current).is_err());
    }

    #[test]
    fn test_scenario_custom_text_with_twelve_ads() {
        let status = CommunicationStatus::derive(1, 12, &thresholds(5, 10, 50), None, Utc::now());
        assert_eq!(status.communication_stage, CommunicationStage::CustomText);
        assert!(status.can_use_custom_text_chat);
        assert!(!status.can_use_voice_chat);
        assert_eq!(status.ads_needed_for_custom_text, 0);
        assert_eq!(status.ads_needed_for_voice_chat, 38);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let t = thresholds(5, 10, 50);
        let now = Utc::now();
        for ads in 0..10 {
            let status = CommunicationStatus::derive(1, ads, &t, None, now);
            assert!(!status.can_use_custom_text_chat, "ads={}", ads);
            assert!(status.can_use_preset_quick_chat);
        }
        for ads in [50, 51, 500, u64::MAX] {
            let status = CommunicationStatus::derive(1, ads, &t, None, now);
            assert!(status.can_use_voice_chat, "ads={}", ads);
            assert_eq!(status.ads_needed_for_voice_chat, 0);
        }
    }

    #[test]
    fn test_expired_override_has_no_effect() {
        let t = thresholds(5, 10, 50);
        let now = Utc::now();
        let expired = forced(CommunicationStage::VoiceEnabled, Some(now - Duration::seconds(1)));

        let with = CommunicationStatus::derive(1, 3, &t, Some(&expired), now);
        let without = CommunicationStatus::derive(1, 3, &t, None, now);
        assert_eq!(with, without);
    }

    #[test]
    fn test_permanent_voice_override_at_zero_ads() {
        let t = ThresholdConfig::default();
        let o = forced(CommunicationStage::VoiceEnabled, None);
        let status = CommunicationStatus::derive(1, 0, &t, Some(&o), Utc::now());
        assert_eq!(status.base_stage, CommunicationStage::PresetOnly);
        assert_eq!(status.communication_stage, CommunicationStage::VoiceEnabled);
        assert!(status.can_use_voice_chat);
        assert_eq!(status.ads_needed_for_voice_chat, 0);
        assert_eq!(status.ads_needed_for_custom_text, 0);
    }

    #[test]
    fn test_override_can_restrict() {
        let t = thresholds(5, 10, 50);
        let now = Utc::now();
        let o = forced(CommunicationStage::PresetOnly, Some(now + Duration::hours(1)));
        let status = CommunicationStatus::derive(1, 1000, &t, Some(&o), now);
        assert_eq!(status.base_stage, CommunicationStage::VoiceEnabled);
        assert_eq!(status.communication_stage, CommunicationStage::PresetOnly);
        assert!(!status.can_use_custom_text_chat);
        assert!(!status.can_use_voice_chat);
        assert!(status.can_use_preset_quick_chat);
        // 阈值早已达到，但阶段被限制，所需广告数按差值计算为 0
        assert_eq!(status.ads_needed_for_voice_chat, 0);
        assert_eq!(status.override_expires_at, o.expires_at);
    }

    #[test]
    fn test_ads_needed_counts_remaining() {
        let t = thresholds(0, 0, 0);
        assert!(t.validate().is_err());
        let t = ThresholdConfig {
            preset_only_max_ads: 0,
            custom_min_ads: 1,
            voice_min_ads: 1,
        };
        let status = CommunicationStatus::derive(1, 0, &t, None, Utc::now());
        assert_eq!(status.ads_needed_for_custom_text, 1);
        assert_eq!(status.ads_needed_for_voice_chat, 1);
    }
}
