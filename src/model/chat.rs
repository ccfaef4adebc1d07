//! 快捷聊天与群聊消息模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 预设消息分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickMessageCategory {
    /// 预设短句
    Quick,
    /// 表情
    Emoticon,
}

impl QuickMessageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuickMessageCategory::Quick => "quick",
            QuickMessageCategory::Emoticon => "emoticon",
        }
    }

    /// 从数据库字符串转换，未知值返回 None
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "quick" => Some(QuickMessageCategory::Quick),
            "emoticon" => Some(QuickMessageCategory::Emoticon),
            _ => None,
        }
    }
}

/// 预设消息目录中的一条（对应 quick_messages 表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickMessage {
    pub id: u64,
    pub category: QuickMessageCategory,
    pub content: String,
    pub is_active: bool,
}

/// 好友间快捷聊天事件（对应 quick_chat_events 表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickChatEvent {
    pub id: Uuid,
    pub from_user_id: u64,
    pub to_user_id: u64,
    pub quick_message_id: u64,
    /// 发送场景（如 quiz_result），客户端自定义
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 群消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMessageKind {
    Quick,
    Emoticon,
    Text,
}

impl GroupMessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupMessageKind::Quick => "quick",
            GroupMessageKind::Emoticon => "emoticon",
            GroupMessageKind::Text => "text",
        }
    }

    /// 引用预设消息时要求的分类；文本消息不引用目录
    pub fn required_category(&self) -> Option<QuickMessageCategory> {
        match self {
            GroupMessageKind::Quick => Some(QuickMessageCategory::Quick),
            GroupMessageKind::Emoticon => Some(QuickMessageCategory::Emoticon),
            GroupMessageKind::Text => None,
        }
    }
}

/// 群聊消息（对应 group_messages 表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMessage {
    pub id: Uuid,
    pub group_id: u64,
    pub sender_id: u64,
    #[serde(rename = "type")]
    pub kind: GroupMessageKind,
    pub quick_message_id: Option<u64>,
    /// 过滤后的文本；预设消息为目录中的内容
    pub content: String,
    pub created_at: DateTime<Utc>,
}
