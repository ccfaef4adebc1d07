//! 好友间快捷聊天
//!
//! 关系：双方无拉黑且为好友；能力：预设快捷聊天；限流：每人固定每分钟 30 条；
//! 载荷：目标用户存在且不是自己，预设消息存在且启用。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ErrorCode, Result, ServerError};
use crate::gateway::pipeline::{AuditEntry, Channel, CheckPipeline};
use crate::model::{AuditRecord, Capability, QuickChatEvent, QuickMessage};
use crate::repository::{ChannelKey, ChatRepository, ProfileDirectory, QuickMessageCatalog};

/// 快捷聊天每分钟默认上限
pub const DEFAULT_QUICK_CHAT_PER_MINUTE: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickChatRequest {
    pub to_user_id: u64,
    pub quick_message_id: u64,
    #[serde(default)]
    pub context: Option<String>,
}

pub struct QuickChatGateway {
    pipeline: Arc<CheckPipeline>,
    profiles: Arc<dyn ProfileDirectory>,
    catalog: Arc<dyn QuickMessageCatalog>,
    chats: Arc<dyn ChatRepository>,
    limit_per_minute: i64,
}

impl QuickChatGateway {
    pub fn new(
        pipeline: Arc<CheckPipeline>,
        profiles: Arc<dyn ProfileDirectory>,
        catalog: Arc<dyn QuickMessageCatalog>,
        chats: Arc<dyn ChatRepository>,
        limit_per_minute: i64,
    ) -> Self {
        Self {
            pipeline,
            profiles,
            catalog,
            chats,
            limit_per_minute,
        }
    }

    pub async fn send(&self, actor_id: u64, request: QuickChatRequest) -> Result<QuickChatEvent> {
        self.pipeline.run(self, actor_id, request).await
    }
}

pub struct QuickChatPayload {
    to_user_id: u64,
    quick_message: QuickMessage,
    context: Option<String>,
}

#[async_trait]
impl Channel for QuickChatGateway {
    type Request = QuickChatRequest;
    type Context = ();
    type Payload = QuickChatPayload;
    type Output = QuickChatEvent;

    fn name(&self) -> &'static str {
        "quick_chat"
    }

    async fn authorize(&self, actor_id: u64, request: &QuickChatRequest, _now: DateTime<Utc>) -> Result<()> {
        self.pipeline
            .guard()
            .check_friendship(actor_id, request.to_user_id)
            .await
    }

    fn required_capability(&self, _request: &QuickChatRequest) -> Capability {
        Capability::PresetQuickChat
    }

    async fn rate_limit(&self, _actor_id: u64, _request: &QuickChatRequest) -> Result<Option<(ChannelKey, i64)>> {
        Ok(Some((ChannelKey::QuickChat, self.limit_per_minute)))
    }

    async fn validate(&self, actor_id: u64, request: &QuickChatRequest, _context: &()) -> Result<QuickChatPayload> {
        if !self.profiles.user_exists(request.to_user_id).await? {
            return Err(ServerError::not_found(
                ErrorCode::UserNotFound,
                format!("目标用户不存在: {}", request.to_user_id),
            ));
        }
        if request.to_user_id == actor_id {
            return Err(ServerError::validation(
                ErrorCode::CannotMessageSelf,
                "不能给自己发送快捷消息",
            ));
        }

        let quick_message = self
            .catalog
            .find_quick_message(request.quick_message_id)
            .await?
            .ok_or_else(|| {
                ServerError::not_found(
                    ErrorCode::QuickMessageNotFound,
                    format!("预设消息不存在: {}", request.quick_message_id),
                )
            })?;
        if !quick_message.is_active {
            return Err(ServerError::validation(
                ErrorCode::QuickMessageInactive,
                format!("预设消息已停用: {}", quick_message.id),
            ));
        }

        Ok(QuickChatPayload {
            to_user_id: request.to_user_id,
            quick_message,
            context: request
                .context
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        })
    }

    async fn commit(&self, actor_id: u64, _context: (), payload: QuickChatPayload, now: DateTime<Utc>) -> Result<QuickChatEvent> {
        let event = QuickChatEvent {
            id: Uuid::new_v4(),
            from_user_id: actor_id,
            to_user_id: payload.to_user_id,
            quick_message_id: payload.quick_message.id,
            context: payload.context,
            created_at: now,
        };
        self.chats.insert_quick_chat_event(&event).await?;
        Ok(event)
    }

    fn audit_entry(&self, _actor_id: u64, event: &QuickChatEvent) -> AuditEntry {
        AuditEntry {
            action: "quick_chat.send",
            target: Some(AuditRecord::user_actor(event.to_user_id)),
            detail: json!({
                "event_id": event.id,
                "quick_message_id": event.quick_message_id,
                "context": event.context,
            }),
        }
    }
}
