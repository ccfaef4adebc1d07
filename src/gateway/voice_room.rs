//! 语音房入房
//!
//! 关系：房间存在且开放；能力：语音；不限流，由房间容量约束；
//! 提交：先向语音服务商申请 token，成功后再登记参与者，服务商失败时不留下任何写入。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::error::{ErrorCode, Result, ServerError};
use crate::gateway::pipeline::{AuditEntry, Channel, CheckPipeline};
use crate::model::{Capability, RoomRef, VoiceJoinGrant, VoiceRoom};
use crate::repository::{ChannelKey, VoiceRoomDirectory};
use crate::service::VoiceProvider;

#[derive(Debug, Clone)]
pub struct VoiceJoinRequest {
    pub room: RoomRef,
}

pub struct VoiceRoomGateway {
    pipeline: Arc<CheckPipeline>,
    rooms: Arc<dyn VoiceRoomDirectory>,
    provider: Arc<dyn VoiceProvider>,
    token_ttl: Duration,
}

impl VoiceRoomGateway {
    pub fn new(
        pipeline: Arc<CheckPipeline>,
        rooms: Arc<dyn VoiceRoomDirectory>,
        provider: Arc<dyn VoiceProvider>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            pipeline,
            rooms,
            provider,
            token_ttl,
        }
    }

    pub async fn join(&self, actor_id: u64, request: VoiceJoinRequest) -> Result<VoiceJoinGrant> {
        self.pipeline.run(self, actor_id, request).await
    }
}

#[async_trait]
impl Channel for VoiceRoomGateway {
    type Request = VoiceJoinRequest;
    type Context = VoiceRoom;
    type Payload = ();
    type Output = VoiceJoinGrant;

    fn name(&self) -> &'static str {
        "voice_room"
    }

    async fn authorize(&self, _actor_id: u64, request: &VoiceJoinRequest, _now: DateTime<Utc>) -> Result<VoiceRoom> {
        self.pipeline.guard().check_room(&request.room).await
    }

    fn required_capability(&self, _request: &VoiceJoinRequest) -> Capability {
        Capability::VoiceChat
    }

    async fn rate_limit(&self, _actor_id: u64, _request: &VoiceJoinRequest) -> Result<Option<(ChannelKey, i64)>> {
        Ok(None)
    }

    async fn validate(&self, actor_id: u64, _request: &VoiceJoinRequest, room: &VoiceRoom) -> Result<()> {
        let Some(max_participants) = room.max_participants else {
            return Ok(());
        };
        // 已在房间里的用户重新入房不占新名额
        if self.rooms.is_participant(room.room_id, actor_id).await? {
            return Ok(());
        }
        let current = self.rooms.count_participants(room.room_id).await?;
        if current >= max_participants as u64 {
            return Err(ServerError::forbidden(
                ErrorCode::VoiceRoomFull,
                format!("语音房 {} 已满 ({}/{})", room.room_id, current, max_participants),
            ));
        }
        Ok(())
    }

    async fn commit(&self, actor_id: u64, room: VoiceRoom, _payload: (), now: DateTime<Utc>) -> Result<VoiceJoinGrant> {
        let token = self
            .provider
            .issue_join_token(&room.channel_name, actor_id, self.token_ttl)
            .await?;
        self.rooms.add_participant(room.room_id, actor_id, now).await?;

        Ok(VoiceJoinGrant {
            room_id: room.room_id,
            channel_name: room.channel_name,
            token: token.token,
            provider_name: self.provider.provider_name().to_string(),
            expires_at: token.expires_at,
        })
    }

    fn audit_entry(&self, _actor_id: u64, grant: &VoiceJoinGrant) -> AuditEntry {
        AuditEntry {
            action: "voice.join",
            target: Some(format!("room:{}", grant.room_id)),
            detail: json!({
                "channel_name": grant.channel_name,
                "provider_name": grant.provider_name,
                "expires_at": grant.expires_at,
            }),
        }
    }
}
