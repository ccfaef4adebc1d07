//! 群聊
//!
//! 关系：群存在且有效、发送者是成员且未被群内禁言。
//! 能力：预设/表情消息只需快捷聊天能力，文本消息需要自定义文字能力。
//! 限流：管理员可调，按 (发送者, 群) 计数，0 表示不限。
//! 载荷：预设/表情引用的目录项存在、启用且分类匹配；文本先过内容过滤，再检查非空和长度。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ErrorCode, Result, ServerError};
use crate::gateway::pipeline::{AuditEntry, Channel, CheckPipeline};
use crate::model::{Capability, GroupInfo, GroupMessage, GroupMessageKind};
use crate::repository::{ChannelKey, ChatRepository, QuickMessageCatalog};
use crate::service::{ContentFilter, FilterOutcome, SettingsResolver};

/// 文本消息默认最大字符数
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatRequest {
    pub group_id: u64,
    #[serde(rename = "type")]
    pub kind: GroupMessageKind,
    #[serde(default)]
    pub quick_message_id: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
}

pub struct GroupChatGateway {
    pipeline: Arc<CheckPipeline>,
    resolver: Arc<SettingsResolver>,
    catalog: Arc<dyn QuickMessageCatalog>,
    chats: Arc<dyn ChatRepository>,
    filter: Arc<dyn ContentFilter>,
    max_text_length: usize,
}

impl GroupChatGateway {
    pub fn new(
        pipeline: Arc<CheckPipeline>,
        resolver: Arc<SettingsResolver>,
        catalog: Arc<dyn QuickMessageCatalog>,
        chats: Arc<dyn ChatRepository>,
        filter: Arc<dyn ContentFilter>,
        max_text_length: usize,
    ) -> Self {
        Self {
            pipeline,
            resolver,
            catalog,
            chats,
            filter,
            max_text_length,
        }
    }

    pub async fn send(&self, actor_id: u64, request: GroupChatRequest) -> Result<GroupMessage> {
        self.pipeline.run(self, actor_id, request).await
    }

    async fn validate_canned(&self, kind: GroupMessageKind, quick_message_id: Option<u64>) -> Result<(Option<u64>, String)> {
        let quick_message_id = quick_message_id.ok_or_else(|| {
            ServerError::validation(
                ErrorCode::ValidationFailed,
                format!("{} 消息需要 quick_message_id", kind.as_str()),
            )
        })?;
        let quick_message = self
            .catalog
            .find_quick_message(quick_message_id)
            .await?
            .ok_or_else(|| {
                ServerError::not_found(
                    ErrorCode::QuickMessageNotFound,
                    format!("预设消息不存在: {}", quick_message_id),
                )
            })?;
        if !quick_message.is_active {
            return Err(ServerError::validation(
                ErrorCode::QuickMessageInactive,
                format!("预设消息已停用: {}", quick_message_id),
            ));
        }
        if kind.required_category() != Some(quick_message.category) {
            return Err(ServerError::validation(
                ErrorCode::QuickMessageCategoryMismatch,
                format!(
                    "预设消息 {} 的分类是 {}，与消息类型 {} 不符",
                    quick_message_id,
                    quick_message.category.as_str(),
                    kind.as_str()
                ),
            ));
        }
        Ok((Some(quick_message.id), quick_message.content))
    }

    fn validate_text(&self, text: Option<&str>) -> Result<String> {
        let raw = text.unwrap_or_default();
        let filtered = match self.filter.filter(raw) {
            FilterOutcome::Clean => raw.to_string(),
            FilterOutcome::Masked(masked) => masked,
            FilterOutcome::Rejected(word) => {
                return Err(ServerError::validation(
                    ErrorCode::ContentRejected,
                    format!("消息包含禁止内容: {}", word),
                ));
            }
        };

        let content = filtered.trim();
        if content.is_empty() {
            return Err(ServerError::validation(ErrorCode::EmptyMessage, "消息内容为空"));
        }
        let length = content.chars().count();
        if length > self.max_text_length {
            return Err(ServerError::validation(
                ErrorCode::MessageTooLong,
                format!("消息长度 {} 超过上限 {}", length, self.max_text_length),
            ));
        }
        Ok(content.to_string())
    }
}

pub struct GroupChatPayload {
    kind: GroupMessageKind,
    quick_message_id: Option<u64>,
    content: String,
}

#[async_trait]
impl Channel for GroupChatGateway {
    type Request = GroupChatRequest;
    type Context = GroupInfo;
    type Payload = GroupChatPayload;
    type Output = GroupMessage;

    fn name(&self) -> &'static str {
        "group_chat"
    }

    async fn authorize(&self, actor_id: u64, request: &GroupChatRequest, now: DateTime<Utc>) -> Result<GroupInfo> {
        let (group, _membership) = self
            .pipeline
            .guard()
            .check_group_access(request.group_id, actor_id, now)
            .await?;
        Ok(group)
    }

    fn required_capability(&self, request: &GroupChatRequest) -> Capability {
        match request.kind {
            GroupMessageKind::Text => Capability::CustomTextChat,
            GroupMessageKind::Quick | GroupMessageKind::Emoticon => Capability::PresetQuickChat,
        }
    }

    async fn rate_limit(&self, _actor_id: u64, request: &GroupChatRequest) -> Result<Option<(ChannelKey, i64)>> {
        let limit = self.resolver.group_chat_rate_limit().await?;
        Ok(Some((ChannelKey::Group(request.group_id), limit)))
    }

    async fn validate(&self, _actor_id: u64, request: &GroupChatRequest, _group: &GroupInfo) -> Result<GroupChatPayload> {
        let (quick_message_id, content) = match request.kind {
            GroupMessageKind::Quick | GroupMessageKind::Emoticon => {
                self.validate_canned(request.kind, request.quick_message_id).await?
            }
            GroupMessageKind::Text => (None, self.validate_text(request.text.as_deref())?),
        };
        Ok(GroupChatPayload {
            kind: request.kind,
            quick_message_id,
            content,
        })
    }

    async fn commit(&self, actor_id: u64, group: GroupInfo, payload: GroupChatPayload, now: DateTime<Utc>) -> Result<GroupMessage> {
        let message = GroupMessage {
            id: Uuid::new_v4(),
            group_id: group.group_id,
            sender_id: actor_id,
            kind: payload.kind,
            quick_message_id: payload.quick_message_id,
            content: payload.content,
            created_at: now,
        };
        self.chats.insert_group_message(&message).await?;
        Ok(message)
    }

    fn audit_entry(&self, _actor_id: u64, message: &GroupMessage) -> AuditEntry {
        AuditEntry {
            action: "group_chat.send",
            target: Some(format!("group:{}", message.group_id)),
            detail: json!({
                "message_id": message.id,
                "type": message.kind,
                "quick_message_id": message.quick_message_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_type_field() {
        let request: GroupChatRequest =
            serde_json::from_str(r#"{"group_id": 3, "type": "emoticon", "quick_message_id": 8}"#).unwrap();
        assert_eq!(request.kind, GroupMessageKind::Emoticon);
        assert_eq!(request.quick_message_id, Some(8));
        assert!(request.text.is_none());
    }
}
