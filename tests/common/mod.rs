//! 集成测试共用的装配：内存存储 + 手动时钟 + 可控的语音服务商
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use commgate::config::{RateLimitMode, ServerConfig, StorageBackend};
use commgate::error::{Result, ServerError};
use commgate::http::HttpServerState;
use commgate::infra::{Clock, ManualClock, MemoryStore};
use commgate::model::{QuickMessageCategory, VoiceRoom, VoiceToken};
use commgate::service::VoiceProvider;
use commgate::{build_state, Backends};

pub const SERVICE_KEY: &str = "test-service-key";

pub const ALICE: u64 = 1001;
pub const BOB: u64 = 1002;
pub const CAROL: u64 = 1003;
pub const DAVE: u64 = 1004;

pub const GROUP: u64 = 501;
pub const QUICK_HELLO: u64 = 11;
pub const EMOTICON_SMILE: u64 = 21;
pub const QUICK_RETIRED: u64 = 12;

pub const ROOM: u64 = 9001;
pub const ROOM_CODE: &str = "LOBBY";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// 记录调用、可切换为失败的语音服务商
pub struct FakeVoiceProvider {
    clock: Arc<ManualClock>,
    failing: AtomicBool,
    calls: Mutex<Vec<(String, u64)>>,
}

impl FakeVoiceProvider {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl VoiceProvider for FakeVoiceProvider {
    fn provider_name(&self) -> &str {
        "fake-voice"
    }

    async fn issue_join_token(&self, channel_name: &str, user_id: u64, ttl: Duration) -> Result<VoiceToken> {
        self.calls.lock().push((channel_name.to_string(), user_id));
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServerError::dependency("voice provider: connection refused"));
        }
        Ok(VoiceToken {
            token: format!("token-{}-{}", channel_name, user_id),
            expires_at: self.clock.now() + ttl,
        })
    }
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.storage = StorageBackend::Memory;
    config.auth.jwt_secret = "integration-test-secret".to_string();
    config.auth.service_keys = vec![SERVICE_KEY.to_string()];
    config.chat.blocked_words = vec!["scam".to_string()];
    config.chat.masked_words = vec!["darn".to_string()];
    config.chat.max_text_length = 20;
    config
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub voice: Arc<FakeVoiceProvider>,
    pub state: HttpServerState,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn atomic() -> Self {
        let mut config = test_config();
        config.rate_limit.mode = RateLimitMode::Atomic;
        Self::with_config(config)
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let voice = Arc::new(FakeVoiceProvider::new(clock.clone()));
        seed(&store);

        let state = build_state(
            &config,
            Backends::memory(store.clone()),
            clock.clone(),
            voice.clone(),
        )
        .expect("build state");

        Self {
            store,
            clock,
            voice,
            state,
        }
    }

    pub fn token(&self, user_id: u64) -> String {
        self.state.jwt_service.issue_token(user_id, None).unwrap()
    }
}

/// 默认阈值 99/100/500 下：
/// ALICE 12 个广告（仅预设），BOB 150（自定义文字），CAROL 600（语音），DAVE 没有记录
fn seed(store: &MemoryStore) {
    store.add_user(ALICE, Some(12));
    store.add_user(BOB, Some(150));
    store.add_user(CAROL, Some(600));
    store.add_user(DAVE, None);

    store.add_friendship(ALICE, BOB);
    store.add_friendship(BOB, CAROL);

    store.add_group(GROUP, "Book Club", true);
    for user in [ALICE, BOB, CAROL] {
        store.add_member(GROUP, user, None);
    }

    store.add_quick_message(QUICK_HELLO, QuickMessageCategory::Quick, "Hello!", true);
    store.add_quick_message(QUICK_RETIRED, QuickMessageCategory::Quick, "Old greeting", false);
    store.add_quick_message(EMOTICON_SMILE, QuickMessageCategory::Emoticon, ":)", true);

    store.add_voice_room(VoiceRoom {
        room_id: ROOM,
        room_code: ROOM_CODE.to_string(),
        name: "Lobby".to_string(),
        channel_name: "lobby-channel".to_string(),
        is_active: true,
        max_participants: Some(2),
    });
}
