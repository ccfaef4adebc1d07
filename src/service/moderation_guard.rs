//! 关系与审核检查
//!
//! 只读取外部协作方维护的事实：账号封禁/禁言、好友与黑名单、群组与成员、语音房。
//! 每个方法在第一个不满足的条件处返回对应错误码。

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{ErrorCode, Result, ServerError};
use crate::model::{GroupInfo, GroupMembership, RoomRef, VoiceRoom};
use crate::repository::{
    GroupDirectory, ModerationDirectory, RelationshipDirectory, VoiceRoomDirectory,
};

pub struct ModerationGuard {
    moderation: Arc<dyn ModerationDirectory>,
    relationships: Arc<dyn RelationshipDirectory>,
    groups: Arc<dyn GroupDirectory>,
    rooms: Arc<dyn VoiceRoomDirectory>,
}

impl ModerationGuard {
    pub fn new(
        moderation: Arc<dyn ModerationDirectory>,
        relationships: Arc<dyn RelationshipDirectory>,
        groups: Arc<dyn GroupDirectory>,
        rooms: Arc<dyn VoiceRoomDirectory>,
    ) -> Self {
        Self {
            moderation,
            relationships,
            groups,
            rooms,
        }
    }

    /// 账号未被封禁、未被全局禁言
    pub async fn check_account(&self, actor_id: u64, now: DateTime<Utc>) -> Result<()> {
        let state = self.moderation.account_moderation(actor_id).await?;
        if state.blocked {
            return Err(ServerError::forbidden(ErrorCode::AccountBlocked, "账号已被封禁"));
        }
        if state.is_chat_muted(now) {
            return Err(ServerError::forbidden(
                ErrorCode::ChatMuted,
                format!("账号处于禁言状态，截止 {:?}", state.chat_muted_until),
            ));
        }
        Ok(())
    }

    /// 双方没有拉黑且互为好友
    pub async fn check_friendship(&self, actor_id: u64, target_id: u64) -> Result<()> {
        if self.relationships.is_blocked_between(actor_id, target_id).await? {
            return Err(ServerError::forbidden(
                ErrorCode::UserBlocked,
                format!("用户 {} 与 {} 之间存在拉黑关系", actor_id, target_id),
            ));
        }
        if !self.relationships.are_friends(actor_id, target_id).await? {
            return Err(ServerError::forbidden(
                ErrorCode::NotFriends,
                format!("用户 {} 与 {} 不是好友", actor_id, target_id),
            ));
        }
        Ok(())
    }

    /// 群存在且有效，发送者是成员且未被群内禁言
    pub async fn check_group_access(
        &self,
        group_id: u64,
        actor_id: u64,
        now: DateTime<Utc>,
    ) -> Result<(GroupInfo, GroupMembership)> {
        let group = self.groups.find_group(group_id).await?.ok_or_else(|| {
            ServerError::not_found(ErrorCode::GroupNotFound, format!("群组不存在: {}", group_id))
        })?;
        if !group.is_active {
            return Err(ServerError::forbidden(
                ErrorCode::GroupInactive,
                format!("群组 {} 已停用", group_id),
            ));
        }

        let membership = self
            .groups
            .find_membership(group_id, actor_id)
            .await?
            .ok_or_else(|| {
                ServerError::forbidden(
                    ErrorCode::NotGroupMember,
                    format!("用户 {} 不是群 {} 的成员", actor_id, group_id),
                )
            })?;
        if membership.is_muted(now) {
            return Err(ServerError::forbidden(
                ErrorCode::GroupMuted,
                format!("用户 {} 在群 {} 内被禁言", actor_id, group_id),
            ));
        }
        Ok((group, membership))
    }

    /// 语音房存在且开放
    pub async fn check_room(&self, room: &RoomRef) -> Result<VoiceRoom> {
        let voice_room = self.rooms.find_room(room).await?.ok_or_else(|| {
            ServerError::not_found(ErrorCode::VoiceRoomNotFound, format!("语音房不存在: {}", room))
        })?;
        if !voice_room.is_active {
            return Err(ServerError::forbidden(
                ErrorCode::VoiceRoomInactive,
                format!("语音房 {} 未开放", voice_room.room_id),
            ));
        }
        Ok(voice_room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MemoryStore;
    use crate::model::AccountModeration;
    use chrono::Duration;

    fn guard(store: &Arc<MemoryStore>) -> ModerationGuard {
        ModerationGuard::new(store.clone(), store.clone(), store.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_account_checks() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.set_moderation(
            1,
            AccountModeration {
                blocked: true,
                chat_muted_until: Some(now + Duration::hours(1)),
            },
        );
        store.set_moderation(
            2,
            AccountModeration {
                blocked: false,
                chat_muted_until: Some(now + Duration::hours(1)),
            },
        );
        store.set_moderation(
            3,
            AccountModeration {
                blocked: false,
                chat_muted_until: Some(now - Duration::seconds(1)),
            },
        );
        let guard = guard(&store);

        assert_eq!(guard.check_account(1, now).await.unwrap_err().code(), ErrorCode::AccountBlocked);
        assert_eq!(guard.check_account(2, now).await.unwrap_err().code(), ErrorCode::ChatMuted);
        assert!(guard.check_account(3, now).await.is_ok());
        assert!(guard.check_account(4, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_block_is_reported_before_friendship() {
        let store = Arc::new(MemoryStore::new());
        store.add_friendship(1, 2);
        store.add_block(2, 1);
        let guard = guard(&store);

        assert_eq!(guard.check_friendship(1, 2).await.unwrap_err().code(), ErrorCode::UserBlocked);
        assert_eq!(guard.check_friendship(1, 3).await.unwrap_err().code(), ErrorCode::NotFriends);
    }

    #[tokio::test]
    async fn test_group_access_order() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.add_group(10, "active", true);
        store.add_group(11, "closed", false);
        store.add_member(10, 1, None);
        store.add_member(10, 2, Some(now + Duration::minutes(10)));
        store.add_member(11, 1, None);
        let guard = guard(&store);

        assert_eq!(guard.check_group_access(99, 1, now).await.unwrap_err().code(), ErrorCode::GroupNotFound);
        assert_eq!(guard.check_group_access(11, 1, now).await.unwrap_err().code(), ErrorCode::GroupInactive);
        assert_eq!(guard.check_group_access(10, 3, now).await.unwrap_err().code(), ErrorCode::NotGroupMember);
        assert_eq!(guard.check_group_access(10, 2, now).await.unwrap_err().code(), ErrorCode::GroupMuted);
        assert!(guard.check_group_access(10, 1, now).await.is_ok());
    }
}
