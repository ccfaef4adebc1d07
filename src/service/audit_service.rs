//! 审计服务
//!
//! 审计写入是唯一允许尽力而为的步骤：失败只记 warn，不影响已经提交的动作。

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::infra::{metrics, Clock};
use crate::model::AuditRecord;
use crate::repository::AuditRepository;

pub struct AuditService {
    repo: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// 写入一条审计记录，失败不返回错误
    pub async fn record(&self, actor: String, action: &str, target: Option<String>, detail: Value) {
        let record = AuditRecord::new(actor, action, target, detail, self.clock.now());
        match self.repo.insert_audit(&record).await {
            Ok(()) => debug!("📝 审计: {} {} {:?}", record.actor, record.action, record.target),
            Err(e) => {
                metrics::record_audit_failure();
                warn!(
                    "⚠️ 审计写入失败（动作已提交，不回滚）: actor={}, action={}, error={}",
                    record.actor, record.action, e
                );
            }
        }
    }
}
