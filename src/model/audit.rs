//! 审计记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 审计记录（对应 communication_audit_log 表）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// `user:<id>` 或 `admin`
    pub actor: String,
    /// 如 quick_chat.send / policy.update
    pub action: String,
    pub target: Option<String>,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(actor: String, action: &str, target: Option<String>, detail: Value, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            action: action.to_string(),
            target,
            detail,
            created_at: now,
        }
    }

    pub fn user_actor(user_id: u64) -> String {
        format!("user:{}", user_id)
    }

    pub fn admin_actor() -> String {
        "admin".to_string()
    }
}
