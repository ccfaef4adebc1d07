//! 群组模型（群组本身由外部系统管理，这里只读取授权需要的字段）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 群组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: u64,
    pub name: String,
    pub is_active: bool,
}

/// 群成员关系
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: u64,
    pub user_id: u64,
    /// 群内禁言到期时间
    pub muted_until: Option<DateTime<Utc>>,
}

impl GroupMembership {
    pub fn is_muted(&self, now: DateTime<Utc>) -> bool {
        self.muted_until.map_or(false, |until| until > now)
    }
}
