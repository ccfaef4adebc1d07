//! 语音房模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 语音房引用：按 ID 或房间码
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomRef {
    Id(u64),
    Code(String),
}

impl std::fmt::Display for RoomRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomRef::Id(id) => write!(f, "id:{}", id),
            RoomRef::Code(code) => write!(f, "code:{}", code),
        }
    }
}

/// 语音房（对应 voice_rooms 表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRoom {
    pub room_id: u64,
    pub room_code: String,
    pub name: String,
    /// 语音服务商侧的频道名
    pub channel_name: String,
    pub is_active: bool,
    /// 容量上限，None 表示不限
    pub max_participants: Option<u32>,
}

/// 语音服务商签发的入房凭证
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// joinRoom 的返回
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceJoinGrant {
    pub room_id: u64,
    pub channel_name: String,
    pub token: String,
    pub provider_name: String,
    pub expires_at: DateTime<Utc>,
}
