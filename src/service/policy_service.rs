//! 策略评估
//!
//! 每次调用都重新读取阈值、广告数和覆盖，不跨请求缓存：
//! 刚修改的阈值或覆盖在下一个请求立即生效。

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ErrorCode, Result, ServerError};
use crate::infra::{metrics, Clock};
use crate::model::{Capability, CommunicationStatus};
use crate::repository::{EngagementCounter, OverrideRepository};
use crate::service::threshold_service::ThresholdService;

pub struct PolicyEvaluator {
    thresholds: Arc<ThresholdService>,
    engagement: Arc<dyn EngagementCounter>,
    overrides: Arc<dyn OverrideRepository>,
    clock: Arc<dyn Clock>,
}

impl PolicyEvaluator {
    pub fn new(
        thresholds: Arc<ThresholdService>,
        engagement: Arc<dyn EngagementCounter>,
        overrides: Arc<dyn OverrideRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            thresholds,
            engagement,
            overrides,
            clock,
        }
    }

    /// 计算用户当前的沟通状态
    ///
    /// 阈值存储或广告计数不可用时返回 Dependency 错误，不会降级成“未解锁”。
    pub async fn evaluate(&self, user_id: u64) -> Result<CommunicationStatus> {
        let thresholds = self.thresholds.get().await?;

        let total_ads_viewed = match self.engagement.total_ads_viewed(user_id).await? {
            Some(ads) if ads >= 0 => ads as u64,
            Some(ads) => {
                warn!("⚠️ 用户 {} 的广告数为负数 ({})，按 0 处理", user_id, ads);
                0
            }
            None => 0,
        };

        let stage_override = self.overrides.find_override(user_id).await?;
        let status = CommunicationStatus::derive(
            user_id,
            total_ads_viewed,
            &thresholds,
            stage_override.as_ref(),
            self.clock.now(),
        );

        metrics::record_policy_evaluation(status.communication_stage.as_str());
        debug!(
            "🧮 用户 {} 沟通状态: ads={}, base={}, effective={}, override={:?}",
            user_id,
            total_ads_viewed,
            status.base_stage,
            status.communication_stage,
            status.override_stage
        );
        Ok(status)
    }
}

/// 能力被拒绝时对外的错误码
pub fn denial_code(capability: Capability) -> ErrorCode {
    match capability {
        Capability::PresetQuickChat => ErrorCode::QuickChatLocked,
        Capability::CustomTextChat => ErrorCode::CommunicationStageInsufficient,
        Capability::VoiceChat => ErrorCode::VoiceChatLocked,
    }
}

/// 检查状态是否允许某项能力，不允许时带上还需观看的广告数
pub fn require_capability(status: &CommunicationStatus, capability: Capability) -> Result<()> {
    if status.allows(capability) {
        return Ok(());
    }
    let ads_needed = status.ads_needed_for(capability);
    Err(ServerError::StageLocked {
        code: denial_code(capability),
        message: format!(
            "当前沟通阶段 {} 不允许 {}，还需观看 {} 个广告",
            status.communication_stage,
            capability.as_str(),
            ads_needed
        ),
        ads_needed,
    })
}
