//! 数据模型模块

pub mod audit;
pub mod chat;
pub mod group;
pub mod moderation;
pub mod policy;
pub mod stage;
pub mod voice;

// 重新导出常用类型
pub use audit::AuditRecord;
pub use chat::{GroupMessage, GroupMessageKind, QuickChatEvent, QuickMessage, QuickMessageCategory};
pub use group::{GroupInfo, GroupMembership};
pub use moderation::AccountModeration;
pub use policy::{CommunicationStatus, StageOverride, ThresholdConfig, ThresholdUpdate};
pub use stage::{Capability, CommunicationStage, UnknownStage};
pub use voice::{RoomRef, VoiceJoinGrant, VoiceRoom, VoiceToken};
