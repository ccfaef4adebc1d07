//! 分层配置解析
//!
//! 每次读取都按 已存储值 → 环境默认值 → 编译期默认值 的顺序解析，不在进程内缓存。
//! 存储值无法解析为整数时记 warn 并落到下一层。

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::model::policy::{
    DEFAULT_CUSTOM_MIN_ADS, DEFAULT_PRESET_ONLY_MAX_ADS, DEFAULT_VOICE_MIN_ADS,
};
use crate::model::ThresholdConfig;
use crate::repository::SettingsRepository;

pub const KEY_PRESET_ONLY_MAX_ADS: &str = "communication.preset_only_max_ads";
pub const KEY_CUSTOM_MIN_ADS: &str = "communication.custom_min_ads";
pub const KEY_VOICE_MIN_ADS: &str = "communication.voice_min_ads";
pub const KEY_GROUP_CHAT_RATE_LIMIT: &str = "communication.group_chat_rate_limit_per_minute";

/// 群聊每分钟默认条数
pub const DEFAULT_GROUP_CHAT_RATE_LIMIT: i64 = 10;

pub const THRESHOLD_KEYS: [&str; 3] = [KEY_PRESET_ONLY_MAX_ADS, KEY_CUSTOM_MIN_ADS, KEY_VOICE_MIN_ADS];

/// 环境默认值层（来自配置文件或 COMMGATE_* 环境变量）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDefaults {
    pub preset_only_max_ads: Option<u64>,
    pub custom_min_ads: Option<u64>,
    pub voice_min_ads: Option<u64>,
    pub group_chat_rate_limit_per_minute: Option<i64>,
}

/// 解析出的阈值，以及存储里是否已经有完整的阈值记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedThresholds {
    pub config: ThresholdConfig,
    pub stored: bool,
}

pub struct SettingsResolver {
    repo: Arc<dyn SettingsRepository>,
    defaults: PolicyDefaults,
}

impl SettingsResolver {
    pub fn new(repo: Arc<dyn SettingsRepository>, defaults: PolicyDefaults) -> Self {
        Self { repo, defaults }
    }

    pub fn defaults(&self) -> &PolicyDefaults {
        &self.defaults
    }

    /// 单个整数配置项
    pub async fn resolve_i64(&self, key: &str, env_default: Option<i64>, compiled_default: i64) -> Result<i64> {
        let stored = self.repo.load_settings(&[key]).await?;
        Ok(pick(&stored, key, env_default, compiled_default))
    }

    /// 三个阈值一次读出
    ///
    /// 分层结果违反顺序不变量时（比如环境默认值配错）退回编译期默认值。
    pub async fn resolve_thresholds(&self) -> Result<ResolvedThresholds> {
        let stored = self.repo.load_settings(&THRESHOLD_KEYS).await?;
        let is_stored = THRESHOLD_KEYS
            .iter()
            .all(|key| parse_non_negative(&stored, key).is_some());

        let config = ThresholdConfig {
            preset_only_max_ads: pick(
                &stored,
                KEY_PRESET_ONLY_MAX_ADS,
                self.defaults.preset_only_max_ads.map(|v| v as i64),
                DEFAULT_PRESET_ONLY_MAX_ADS as i64,
            ) as u64,
            custom_min_ads: pick(
                &stored,
                KEY_CUSTOM_MIN_ADS,
                self.defaults.custom_min_ads.map(|v| v as i64),
                DEFAULT_CUSTOM_MIN_ADS as i64,
            ) as u64,
            voice_min_ads: pick(
                &stored,
                KEY_VOICE_MIN_ADS,
                self.defaults.voice_min_ads.map(|v| v as i64),
                DEFAULT_VOICE_MIN_ADS as i64,
            ) as u64,
        };

        if let Err(e) = config.validate() {
            warn!("⚠️ 分层解析出的阈值不满足顺序约束，使用编译期默认值: {}", e);
            return Ok(ResolvedThresholds {
                config: ThresholdConfig::default(),
                stored: is_stored,
            });
        }

        Ok(ResolvedThresholds {
            config,
            stored: is_stored,
        })
    }

    /// 群聊限流（每分钟条数，0 表示不限）
    pub async fn group_chat_rate_limit(&self) -> Result<i64> {
        self.resolve_i64(
            KEY_GROUP_CHAT_RATE_LIMIT,
            self.defaults.group_chat_rate_limit_per_minute,
            DEFAULT_GROUP_CHAT_RATE_LIMIT,
        )
        .await
    }
}

fn pick(stored: &HashMap<String, String>, key: &str, env_default: Option<i64>, compiled_default: i64) -> i64 {
    if let Some(raw) = stored.get(key) {
        match raw.trim().parse::<i64>() {
            Ok(value) => return value,
            Err(_) => warn!("⚠️ 配置项 {} 的存储值无法解析: {:?}", key, raw),
        }
    }
    env_default.unwrap_or(compiled_default)
}

fn parse_non_negative(stored: &HashMap<String, String>, key: &str) -> Option<u64> {
    stored.get(key).and_then(|raw| raw.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MemoryStore;

    fn resolver(store: Arc<MemoryStore>, defaults: PolicyDefaults) -> SettingsResolver {
        SettingsResolver::new(store, defaults)
    }

    #[tokio::test]
    async fn test_compiled_default_when_nothing_configured() {
        let store = Arc::new(MemoryStore::new());
        let resolved = resolver(store, PolicyDefaults::default())
            .resolve_thresholds()
            .await
            .unwrap();
        assert_eq!(resolved.config, ThresholdConfig::default());
        assert!(!resolved.stored);
    }

    #[tokio::test]
    async fn test_env_default_beats_compiled_default() {
        let store = Arc::new(MemoryStore::new());
        let defaults = PolicyDefaults {
            voice_min_ads: Some(300),
            group_chat_rate_limit_per_minute: Some(20),
            ..Default::default()
        };
        let resolver = resolver(store, defaults);
        assert_eq!(resolver.resolve_thresholds().await.unwrap().config.voice_min_ads, 300);
        assert_eq!(resolver.group_chat_rate_limit().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_stored_value_beats_env_default() {
        let store = Arc::new(MemoryStore::new());
        store.put_setting(KEY_GROUP_CHAT_RATE_LIMIT, "0");
        let defaults = PolicyDefaults {
            group_chat_rate_limit_per_minute: Some(20),
            ..Default::default()
        };
        assert_eq!(resolver(store, defaults).group_chat_rate_limit().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_stored_value_falls_through() {
        let store = Arc::new(MemoryStore::new());
        store.put_setting(KEY_GROUP_CHAT_RATE_LIMIT, "ten");
        let resolver = resolver(store, PolicyDefaults::default());
        assert_eq!(
            resolver.group_chat_rate_limit().await.unwrap(),
            DEFAULT_GROUP_CHAT_RATE_LIMIT
        );
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.set_settings_unavailable(true);
        let err = resolver(store, PolicyDefaults::default())
            .resolve_thresholds()
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::DependencyUnavailable);
    }
}
