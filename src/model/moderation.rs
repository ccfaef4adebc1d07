//! 账号级审核状态

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 账号审核状态（由外部审核系统维护）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountModeration {
    /// 账号被封禁
    pub blocked: bool,
    /// 全局聊天禁言到期时间；永久禁言用一个很远的时间表示
    pub chat_muted_until: Option<DateTime<Utc>>,
}

impl AccountModeration {
    pub fn is_chat_muted(&self, now: DateTime<Utc>) -> bool {
        self.chat_muted_until.map_or(false, |until| until > now)
    }
}
