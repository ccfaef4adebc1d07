//! 存储与外部协作方接口
//!
//! 每个 trait 都有 PostgreSQL 实现（本目录）和内存实现（`infra::memory`）。
//! 本模块只读取好友关系、群成员、审核状态等外部事实，不负责维护它们。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::model::{
    AccountModeration, AuditRecord, GroupInfo, GroupMembership, GroupMessage, QuickChatEvent,
    QuickMessage, RoomRef, StageOverride, VoiceRoom,
};

/// 配置记录（键值对），最后写入者胜出
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// 读取给定键的已存储值，不存在的键不会出现在结果中
    async fn load_settings(&self, keys: &[&str]) -> Result<HashMap<String, String>>;

    /// 写入一组键值
    async fn save_settings(&self, pairs: &[(String, String)]) -> Result<()>;
}

/// 阶段覆盖存储，按 user_id upsert
#[async_trait]
pub trait OverrideRepository: Send + Sync {
    async fn find_override(&self, user_id: u64) -> Result<Option<StageOverride>>;

    async fn upsert_override(&self, stage_override: &StageOverride) -> Result<()>;

    /// 返回是否真的删除了记录
    async fn delete_override(&self, user_id: u64) -> Result<bool>;
}

/// 广告观看计数（外部事实来源）
#[async_trait]
pub trait EngagementCounter: Send + Sync {
    /// 用户累计观看的广告数；None 表示没有记录或值不是数字
    async fn total_ads_viewed(&self, user_id: u64) -> Result<Option<i64>>;
}

/// 用户资料查询
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn user_exists(&self, user_id: u64) -> Result<bool>;
}

/// 好友与拉黑关系
#[async_trait]
pub trait RelationshipDirectory: Send + Sync {
    async fn are_friends(&self, user_a: u64, user_b: u64) -> Result<bool>;

    /// 任意一方拉黑了另一方
    async fn is_blocked_between(&self, user_a: u64, user_b: u64) -> Result<bool>;
}

/// 账号级审核状态
#[async_trait]
pub trait ModerationDirectory: Send + Sync {
    async fn account_moderation(&self, user_id: u64) -> Result<AccountModeration>;
}

/// 群组与成员
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn find_group(&self, group_id: u64) -> Result<Option<GroupInfo>>;

    async fn find_membership(&self, group_id: u64, user_id: u64) -> Result<Option<GroupMembership>>;
}

/// 预设消息目录
#[async_trait]
pub trait QuickMessageCatalog: Send + Sync {
    async fn find_quick_message(&self, quick_message_id: u64) -> Result<Option<QuickMessage>>;
}

/// 语音房与参与者
#[async_trait]
pub trait VoiceRoomDirectory: Send + Sync {
    async fn find_room(&self, room: &RoomRef) -> Result<Option<VoiceRoom>>;

    async fn count_participants(&self, room_id: u64) -> Result<u64>;

    async fn is_participant(&self, room_id: u64, user_id: u64) -> Result<bool>;

    /// 登记参与者（重复加入视为刷新加入时间）
    async fn add_participant(&self, room_id: u64, user_id: u64, joined_at: DateTime<Utc>) -> Result<()>;
}

/// 限流计数用的渠道键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    /// 快捷聊天（按发送者全局计数）
    QuickChat,
    /// 某个群的群聊
    Group(u64),
}

impl ChannelKey {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelKey::QuickChat => "quick_chat",
            ChannelKey::Group(_) => "group_chat",
        }
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKey::QuickChat => f.write_str("quick_chat"),
            ChannelKey::Group(group_id) => write!(f, "group:{}", group_id),
        }
    }
}

/// 动作日志：限流窗口通过查询它得到
#[async_trait]
pub trait ActionLog: Send + Sync {
    /// 统计用户在该渠道上 `since`（含）之后的动作数
    async fn count_actions_since(&self, user_id: u64, channel: &ChannelKey, since: DateTime<Utc>) -> Result<u64>;
}

/// 消息/事件持久化
#[async_trait]
pub trait ChatRepository: ActionLog {
    async fn insert_quick_chat_event(&self, event: &QuickChatEvent) -> Result<()>;

    async fn insert_group_message(&self, message: &GroupMessage) -> Result<()>;
}

/// 审计日志
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert_audit(&self, record: &AuditRecord) -> Result<()>;
}

pub mod audit_repo;
pub mod chat_repo;
pub mod directory_repo;
pub mod override_repo;
pub mod settings_repo;
pub mod voice_room_repo;

pub use audit_repo::PgAuditRepository;
pub use chat_repo::PgChatRepository;
pub use directory_repo::PgDirectory;
pub use override_repo::PgOverrideRepository;
pub use settings_repo::PgSettingsRepository;
pub use voice_room_repo::PgVoiceRoomRepository;
