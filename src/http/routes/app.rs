//! 客户端接口
//!
//! 所有请求都必须带 `Authorization: Bearer <jwt>`，token 的 sub 即调用方 user_id。
//! 三个发送/入房接口都经由网关的固定检查流水线。

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ErrorCode, Result, ServerError};
use crate::gateway::{GroupChatRequest, QuickChatRequest, VoiceJoinRequest};
use crate::http::middleware::authenticate_user;
use crate::http::routes::{json_body, path_param};
use crate::http::HttpServerState;
use crate::model::{
    CommunicationStatus, GroupMessage, GroupMessageKind, QuickChatEvent, RoomRef, VoiceJoinGrant,
};

pub fn create_route() -> Router<HttpServerState> {
    Router::new()
        .route("/api/app/communication/status", get(get_my_status))
        .route("/api/app/quick-chat/send", post(send_quick_chat))
        .route("/api/app/groups/{group_id}/messages", post(send_group_message))
        .route("/api/app/voice/rooms/join", post(join_voice_room))
}

/// 调用方自己的沟通状态
async fn get_my_status(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
) -> Result<Json<CommunicationStatus>> {
    let user_id = authenticate_user(&headers, &state)?;
    let status = state.policy_evaluator.evaluate(user_id).await?;
    Ok(Json(status))
}

async fn send_quick_chat(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    body: std::result::Result<Json<QuickChatRequest>, JsonRejection>,
) -> Result<Json<QuickChatEvent>> {
    let actor_id = authenticate_user(&headers, &state)?;
    let request = json_body(body)?;
    let event = state.quick_chat.send(actor_id, request).await?;
    Ok(Json(event))
}

/// 群消息请求体（group_id 来自路径）
#[derive(Debug, Deserialize)]
struct GroupMessageBody {
    #[serde(rename = "type")]
    kind: GroupMessageKind,
    #[serde(default)]
    quick_message_id: Option<u64>,
    #[serde(default)]
    text: Option<String>,
}

async fn send_group_message(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    group_id: std::result::Result<Path<u64>, PathRejection>,
    body: std::result::Result<Json<GroupMessageBody>, JsonRejection>,
) -> Result<Json<GroupMessage>> {
    let actor_id = authenticate_user(&headers, &state)?;
    let group_id = path_param(group_id)?;
    let body = json_body(body)?;

    let request = GroupChatRequest {
        group_id,
        kind: body.kind,
        quick_message_id: body.quick_message_id,
        text: body.text,
    };
    let message = state.group_chat.send(actor_id, request).await?;
    Ok(Json(message))
}

#[derive(Debug, Deserialize)]
struct JoinRoomBody {
    #[serde(default)]
    room_id: Option<u64>,
    #[serde(default)]
    room_code: Option<String>,
}

impl JoinRoomBody {
    /// room_id 与 room_code 必须且只能给一个
    fn into_room_ref(self) -> Result<RoomRef> {
        let room_code = self.room_code.filter(|c| !c.trim().is_empty());
        match (self.room_id, room_code) {
            (Some(room_id), None) => Ok(RoomRef::Id(room_id)),
            (None, Some(code)) => Ok(RoomRef::Code(code.trim().to_string())),
            (Some(_), Some(_)) => Err(ServerError::validation(
                ErrorCode::ValidationFailed,
                "room_id 与 room_code 只能指定一个",
            )),
            (None, None) => Err(ServerError::validation(
                ErrorCode::ValidationFailed,
                "必须指定 room_id 或 room_code",
            )),
        }
    }
}

async fn join_voice_room(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    body: std::result::Result<Json<JoinRoomBody>, JsonRejection>,
) -> Result<Json<VoiceJoinGrant>> {
    let actor_id = authenticate_user(&headers, &state)?;
    let room = json_body(body)?.into_room_ref()?;
    debug!("🎙️ 入房请求: actor={}, room={}", actor_id, room);

    let grant = state.voice_room.join(actor_id, VoiceJoinRequest { room }).await?;
    Ok(Json(grant))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(room_id: Option<u64>, room_code: Option<&str>) -> JoinRoomBody {
        JoinRoomBody {
            room_id,
            room_code: room_code.map(str::to_string),
        }
    }

    #[test]
    fn test_join_body_requires_exactly_one_reference() {
        assert_eq!(body(Some(7), None).into_room_ref().unwrap(), RoomRef::Id(7));
        assert_eq!(
            body(None, Some(" ABC ")).into_room_ref().unwrap(),
            RoomRef::Code("ABC".to_string())
        );
        assert_eq!(
            body(Some(7), Some("ABC")).into_room_ref().unwrap_err().code(),
            ErrorCode::ValidationFailed
        );
        assert_eq!(
            body(None, Some("  ")).into_room_ref().unwrap_err().code(),
            ErrorCode::ValidationFailed
        );
    }
}
