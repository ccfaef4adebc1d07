//! 渠道网关
//!
//! 快捷聊天、群聊、语音房三个入口，共用 `CheckPipeline` 的检查顺序。

pub mod group_chat;
pub mod pipeline;
pub mod quick_chat;
pub mod voice_room;

pub use group_chat::{GroupChatGateway, GroupChatRequest, DEFAULT_MAX_TEXT_LENGTH};
pub use pipeline::{AuditEntry, Channel, CheckPipeline};
pub use quick_chat::{QuickChatGateway, QuickChatRequest, DEFAULT_QUICK_CHAT_PER_MINUTE};
pub use voice_room::{VoiceJoinRequest, VoiceRoomGateway};
