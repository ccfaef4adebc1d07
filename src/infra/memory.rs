//! 内存存储
//!
//! 实现全部存储与协作方接口，用于 `storage = "memory"` 本地运行和测试。
//! 提供一组 seed/inspect 方法，测试里用它们准备外部事实并检查写入结果。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, ServerError};
use crate::model::{
    AccountModeration, AuditRecord, GroupInfo, GroupMembership, GroupMessage, QuickChatEvent,
    QuickMessage, QuickMessageCategory, RoomRef, StageOverride, VoiceRoom,
};
use crate::repository::{
    ActionLog, AuditRepository, ChannelKey, ChatRepository, EngagementCounter, GroupDirectory,
    ModerationDirectory, OverrideRepository, ProfileDirectory, QuickMessageCatalog,
    RelationshipDirectory, SettingsRepository, VoiceRoomDirectory,
};

#[derive(Default)]
struct MemoryState {
    settings: HashMap<String, String>,
    overrides: HashMap<u64, StageOverride>,
    /// user_id -> ads_watched（None 表示字段为空）
    users: HashMap<u64, Option<i64>>,
    moderation: HashMap<u64, AccountModeration>,
    /// 有序对，双向各存一份
    friendships: HashSet<(u64, u64)>,
    /// (拉黑者, 被拉黑者)
    blocks: HashSet<(u64, u64)>,
    groups: HashMap<u64, GroupInfo>,
    memberships: HashMap<(u64, u64), GroupMembership>,
    quick_messages: HashMap<u64, QuickMessage>,
    voice_rooms: HashMap<u64, VoiceRoom>,
    /// (room_id, user_id) -> joined_at
    participants: HashMap<(u64, u64), DateTime<Utc>>,
    quick_chat_events: Vec<QuickChatEvent>,
    group_messages: Vec<GroupMessage>,
    audit_records: Vec<AuditRecord>,
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    engagement_down: AtomicBool,
    settings_down: AtomicBool,
    audit_down: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== seed =====

    pub fn add_user(&self, user_id: u64, ads_watched: Option<i64>) {
        self.state.write().users.insert(user_id, ads_watched);
    }

    pub fn set_ads_watched(&self, user_id: u64, ads_watched: Option<i64>) {
        self.add_user(user_id, ads_watched);
    }

    pub fn set_moderation(&self, user_id: u64, moderation: AccountModeration) {
        self.state.write().moderation.insert(user_id, moderation);
    }

    pub fn add_friendship(&self, user_a: u64, user_b: u64) {
        let mut state = self.state.write();
        state.friendships.insert((user_a, user_b));
        state.friendships.insert((user_b, user_a));
    }

    pub fn add_block(&self, blocker: u64, blocked: u64) {
        self.state.write().blocks.insert((blocker, blocked));
    }

    pub fn add_group(&self, group_id: u64, name: &str, is_active: bool) {
        self.state.write().groups.insert(
            group_id,
            GroupInfo {
                group_id,
                name: name.to_string(),
                is_active,
            },
        );
    }

    pub fn add_member(&self, group_id: u64, user_id: u64, muted_until: Option<DateTime<Utc>>) {
        self.state.write().memberships.insert(
            (group_id, user_id),
            GroupMembership {
                group_id,
                user_id,
                muted_until,
            },
        );
    }

    pub fn add_quick_message(&self, id: u64, category: QuickMessageCategory, content: &str, is_active: bool) {
        self.state.write().quick_messages.insert(
            id,
            QuickMessage {
                id,
                category,
                content: content.to_string(),
                is_active,
            },
        );
    }

    pub fn add_voice_room(&self, room: VoiceRoom) {
        self.state.write().voice_rooms.insert(room.room_id, room);
    }

    pub fn put_setting(&self, key: &str, value: &str) {
        self.state
            .write()
            .settings
            .insert(key.to_string(), value.to_string());
    }

    /// 模拟广告计数服务不可用
    pub fn set_engagement_unavailable(&self, down: bool) {
        self.engagement_down.store(down, Ordering::SeqCst);
    }

    /// 模拟配置存储不可用
    pub fn set_settings_unavailable(&self, down: bool) {
        self.settings_down.store(down, Ordering::SeqCst);
    }

    /// 模拟审计写入失败
    pub fn set_audit_unavailable(&self, down: bool) {
        self.audit_down.store(down, Ordering::SeqCst);
    }

    // ===== inspect =====

    pub fn quick_chat_events(&self) -> Vec<QuickChatEvent> {
        self.state.read().quick_chat_events.clone()
    }

    pub fn group_messages(&self) -> Vec<GroupMessage> {
        self.state.read().group_messages.clone()
    }

    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.state.read().audit_records.clone()
    }

    pub fn participants(&self, room_id: u64) -> Vec<u64> {
        let mut users: Vec<u64> = self
            .state
            .read()
            .participants
            .keys()
            .filter(|(room, _)| *room == room_id)
            .map(|(_, user)| *user)
            .collect();
        users.sort_unstable();
        users
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.state.read().settings.get(key).cloned()
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn load_settings(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        if self.settings_down.load(Ordering::SeqCst) {
            return Err(ServerError::dependency("配置存储不可用"));
        }
        let state = self.state.read();
        Ok(keys
            .iter()
            .filter_map(|key| state.settings.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn save_settings(&self, pairs: &[(String, String)]) -> Result<()> {
        if self.settings_down.load(Ordering::SeqCst) {
            return Err(ServerError::dependency("配置存储不可用"));
        }
        let mut state = self.state.write();
        for (key, value) in pairs {
            state.settings.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl OverrideRepository for MemoryStore {
    async fn find_override(&self, user_id: u64) -> Result<Option<StageOverride>> {
        Ok(self.state.read().overrides.get(&user_id).cloned())
    }

    async fn upsert_override(&self, stage_override: &StageOverride) -> Result<()> {
        self.state
            .write()
            .overrides
            .insert(stage_override.user_id, stage_override.clone());
        Ok(())
    }

    async fn delete_override(&self, user_id: u64) -> Result<bool> {
        Ok(self.state.write().overrides.remove(&user_id).is_some())
    }
}

#[async_trait]
impl EngagementCounter for MemoryStore {
    async fn total_ads_viewed(&self, user_id: u64) -> Result<Option<i64>> {
        if self.engagement_down.load(Ordering::SeqCst) {
            return Err(ServerError::dependency("广告计数服务不可用"));
        }
        Ok(self.state.read().users.get(&user_id).copied().flatten())
    }
}

#[async_trait]
impl ProfileDirectory for MemoryStore {
    async fn user_exists(&self, user_id: u64) -> Result<bool> {
        Ok(self.state.read().users.contains_key(&user_id))
    }
}

#[async_trait]
impl RelationshipDirectory for MemoryStore {
    async fn are_friends(&self, user_a: u64, user_b: u64) -> Result<bool> {
        Ok(self.state.read().friendships.contains(&(user_a, user_b)))
    }

    async fn is_blocked_between(&self, user_a: u64, user_b: u64) -> Result<bool> {
        let state = self.state.read();
        Ok(state.blocks.contains(&(user_a, user_b)) || state.blocks.contains(&(user_b, user_a)))
    }
}

#[async_trait]
impl ModerationDirectory for MemoryStore {
    async fn account_moderation(&self, user_id: u64) -> Result<AccountModeration> {
        Ok(self
            .state
            .read()
            .moderation
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl GroupDirectory for MemoryStore {
    async fn find_group(&self, group_id: u64) -> Result<Option<GroupInfo>> {
        Ok(self.state.read().groups.get(&group_id).cloned())
    }

    async fn find_membership(&self, group_id: u64, user_id: u64) -> Result<Option<GroupMembership>> {
        Ok(self.state.read().memberships.get(&(group_id, user_id)).cloned())
    }
}

#[async_trait]
impl QuickMessageCatalog for MemoryStore {
    async fn find_quick_message(&self, quick_message_id: u64) -> Result<Option<QuickMessage>> {
        Ok(self.state.read().quick_messages.get(&quick_message_id).cloned())
    }
}

#[async_trait]
impl VoiceRoomDirectory for MemoryStore {
    async fn find_room(&self, room: &RoomRef) -> Result<Option<VoiceRoom>> {
        let state = self.state.read();
        Ok(match room {
            RoomRef::Id(id) => state.voice_rooms.get(id).cloned(),
            RoomRef::Code(code) => state
                .voice_rooms
                .values()
                .find(|r| &r.room_code == code)
                .cloned(),
        })
    }

    async fn count_participants(&self, room_id: u64) -> Result<u64> {
        Ok(self
            .state
            .read()
            .participants
            .keys()
            .filter(|(room, _)| *room == room_id)
            .count() as u64)
    }

    async fn is_participant(&self, room_id: u64, user_id: u64) -> Result<bool> {
        Ok(self.state.read().participants.contains_key(&(room_id, user_id)))
    }

    async fn add_participant(&self, room_id: u64, user_id: u64, joined_at: DateTime<Utc>) -> Result<()> {
        self.state
            .write()
            .participants
            .insert((room_id, user_id), joined_at);
        Ok(())
    }
}

#[async_trait]
impl ActionLog for MemoryStore {
    async fn count_actions_since(&self, user_id: u64, channel: &ChannelKey, since: DateTime<Utc>) -> Result<u64> {
        let state = self.state.read();
        let count = match channel {
            ChannelKey::QuickChat => state
                .quick_chat_events
                .iter()
                .filter(|e| e.from_user_id == user_id && e.created_at >= since)
                .count(),
            ChannelKey::Group(group_id) => state
                .group_messages
                .iter()
                .filter(|m| m.group_id == *group_id && m.sender_id == user_id && m.created_at >= since)
                .count(),
        };
        Ok(count as u64)
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn insert_quick_chat_event(&self, event: &QuickChatEvent) -> Result<()> {
        self.state.write().quick_chat_events.push(event.clone());
        Ok(())
    }

    async fn insert_group_message(&self, message: &GroupMessage) -> Result<()> {
        self.state.write().group_messages.push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn insert_audit(&self, record: &AuditRecord) -> Result<()> {
        if self.audit_down.load(Ordering::SeqCst) {
            return Err(ServerError::dependency("审计存储不可用"));
        }
        self.state.write().audit_records.push(record.clone());
        Ok(())
    }
}
