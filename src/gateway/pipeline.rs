//! 统一检查管线
//!
//! 三个渠道共享同一套检查顺序，渠道只能提供每一步的具体内容，不能调整顺序：
//!
//! 1. 账号审核（封禁 / 全局禁言）
//! 2. 渠道关系检查（好友、群成员、语音房状态）
//! 3. 策略检查（每次重新评估沟通阶段）
//! 4. 限流
//! 5. 载荷校验
//! 6. 提交
//! 7. 审计（尽力而为）
//!
//! 任一步失败立即返回，之后的步骤都不会执行，也不会留下写入。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ServerError};
use crate::infra::{metrics, Clock};
use crate::model::{AuditRecord, Capability};
use crate::repository::ChannelKey;
use crate::security::{RateDecision, RateLimiter};
use crate::service::{require_capability, AuditService, ModerationGuard, PolicyEvaluator};

/// 审计条目：动作、目标、细节
pub struct AuditEntry {
    pub action: &'static str,
    pub target: Option<String>,
    pub detail: Value,
}

/// 一个消息渠道在管线各步骤上的具体实现
#[async_trait]
pub trait Channel: Send + Sync {
    type Request: Send + Sync;
    /// 关系检查的产物，传给后续步骤
    type Context: Send + Sync;
    /// 校验后的载荷
    type Payload: Send;
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn authorize(&self, actor_id: u64, request: &Self::Request, now: DateTime<Utc>) -> Result<Self::Context>;

    fn required_capability(&self, request: &Self::Request) -> Capability;

    /// 限流键和每窗口上限；None 表示该渠道不限流
    async fn rate_limit(&self, actor_id: u64, request: &Self::Request) -> Result<Option<(ChannelKey, i64)>>;

    async fn validate(
        &self,
        actor_id: u64,
        request: &Self::Request,
        context: &Self::Context,
    ) -> Result<Self::Payload>;

    async fn commit(
        &self,
        actor_id: u64,
        context: Self::Context,
        payload: Self::Payload,
        now: DateTime<Utc>,
    ) -> Result<Self::Output>;

    fn audit_entry(&self, actor_id: u64, output: &Self::Output) -> AuditEntry;
}

pub struct CheckPipeline {
    guard: Arc<ModerationGuard>,
    policy: Arc<PolicyEvaluator>,
    limiter: Arc<dyn RateLimiter>,
    audit: Arc<AuditService>,
    clock: Arc<dyn Clock>,
}

impl CheckPipeline {
    pub fn new(
        guard: Arc<ModerationGuard>,
        policy: Arc<PolicyEvaluator>,
        limiter: Arc<dyn RateLimiter>,
        audit: Arc<AuditService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            guard,
            policy,
            limiter,
            audit,
            clock,
        }
    }

    pub fn guard(&self) -> &Arc<ModerationGuard> {
        &self.guard
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 执行完整管线，这是渠道提交动作的唯一入口
    pub async fn run<C: Channel>(&self, channel: &C, actor_id: u64, request: C::Request) -> Result<C::Output> {
        let started = Instant::now();
        let result = self.execute(channel, actor_id, &request).await;

        let outcome = match &result {
            Ok(_) => "allowed",
            Err(e) => e.outcome_label(),
        };
        metrics::record_gateway_request(channel.name(), outcome, started.elapsed().as_secs_f64());

        match &result {
            Ok(_) => debug!("✅ [{}] actor={} 通过", channel.name(), actor_id),
            Err(e @ ServerError::Dependency(_)) => {
                warn!("⚠️ [{}] actor={} 依赖不可用: {}", channel.name(), actor_id, e)
            }
            Err(e @ ServerError::Internal(_)) => {
                error!("❌ [{}] actor={} 内部错误: {}", channel.name(), actor_id, e)
            }
            Err(
                e @ (ServerError::Forbidden { .. }
                | ServerError::StageLocked { .. }
                | ServerError::RateLimited { .. }),
            ) => info!("🚫 [{}] actor={} 被拒绝: {}", channel.name(), actor_id, e),
            Err(e) => debug!("🚫 [{}] actor={} 被拒绝: {}", channel.name(), actor_id, e),
        }
        result
    }

    async fn execute<C: Channel>(&self, channel: &C, actor_id: u64, request: &C::Request) -> Result<C::Output> {
        let now = self.clock.now();

        self.guard.check_account(actor_id, now).await?;

        let context = channel.authorize(actor_id, request, now).await?;

        let status = self.policy.evaluate(actor_id).await?;
        require_capability(&status, channel.required_capability(request))?;

        let mut reserved: Option<(ChannelKey, DateTime<Utc>)> = None;
        if let Some((key, limit)) = channel.rate_limit(actor_id, request).await? {
            match self.limiter.check(actor_id, &key, limit).await? {
                RateDecision::Allowed { reservation } => {
                    reserved = reservation.map(|reserved_at| (key, reserved_at))
                }
                RateDecision::Limited { retry_after_secs } => {
                    metrics::record_rate_limited(channel.name());
                    return Err(ServerError::RateLimited {
                        message: format!("{} 发送过于频繁，每分钟最多 {} 条", key, limit),
                        retry_after_secs,
                    });
                }
            }
        }

        let committed = match channel.validate(actor_id, request, &context).await {
            Ok(payload) => channel.commit(actor_id, context, payload, now).await,
            Err(e) => Err(e),
        };
        let output = match committed {
            Ok(output) => output,
            Err(e) => {
                if let Some((key, reserved_at)) = reserved {
                    self.limiter.release(actor_id, &key, reserved_at).await;
                }
                return Err(e);
            }
        };

        let entry = channel.audit_entry(actor_id, &output);
        self.audit
            .record(AuditRecord::user_actor(actor_id), entry.action, entry.target, entry.detail)
            .await;

        Ok(output)
    }
}
