/// 滑动窗口限流
///
/// 两种实现：
/// 1. `LogRateLimiter`（默认）：统计动作日志里窗口内的条数，先查后写，
///    同一用户并发请求可能短暂超出上限，是软限流
/// 2. `AtomicWindowLimiter`：进程内按 (user, channel) 检查并预占名额，同一进程内不会超限
///
/// 窗口下界是闭区间：恰好在 `now - window` 的动作仍然计入。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::infra::Clock;
use crate::repository::{ActionLog, ChannelKey};

/// 限流判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// `reservation` 是预占名额的时间戳，归还时原样传回；不预占的实现为 None
    Allowed { reservation: Option<DateTime<Utc>> },
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// `limit_per_window <= 0` 表示不限流
    async fn check(&self, user_id: u64, channel: &ChannelKey, limit_per_window: i64) -> Result<RateDecision>;

    /// 后续步骤失败时归还 `check` 预占的那个名额；不预占的实现什么都不做
    async fn release(&self, _user_id: u64, _channel: &ChannelKey, _reservation: DateTime<Utc>) {}

    /// 清理整个窗口都已过期的计数状态，返回清理的键数
    fn purge_idle(&self) -> usize {
        0
    }

    fn mode(&self) -> &'static str;

    async fn allow(&self, user_id: u64, channel: &ChannelKey, limit_per_window: i64) -> Result<bool> {
        Ok(self.check(user_id, channel, limit_per_window).await?.is_allowed())
    }
}

/// 基于动作日志计数的软限流
pub struct LogRateLimiter {
    log: Arc<dyn ActionLog>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl LogRateLimiter {
    pub fn new(log: Arc<dyn ActionLog>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self { log, clock, window }
    }
}

#[async_trait]
impl RateLimiter for LogRateLimiter {
    async fn check(&self, user_id: u64, channel: &ChannelKey, limit_per_window: i64) -> Result<RateDecision> {
        if limit_per_window <= 0 {
            return Ok(RateDecision::Allowed { reservation: None });
        }
        let since = self.clock.now() - self.window;
        let count = self.log.count_actions_since(user_id, channel, since).await?;
        debug!(
            "⏱️ 限流计数: user={}, channel={}, count={}, limit={}",
            user_id, channel, count, limit_per_window
        );
        if count < limit_per_window as u64 {
            Ok(RateDecision::Allowed { reservation: None })
        } else {
            Ok(RateDecision::Limited {
                retry_after_secs: self.window.num_seconds().max(1) as u64,
            })
        }
    }

    fn mode(&self) -> &'static str {
        "soft"
    }
}

/// 进程内原子检查并预占
pub struct AtomicWindowLimiter {
    windows: DashMap<(u64, ChannelKey), VecDeque<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl AtomicWindowLimiter {
    pub fn new(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
            window,
        }
    }

    /// 当前持有计数状态的 (user, channel) 数
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimiter for AtomicWindowLimiter {
    async fn check(&self, user_id: u64, channel: &ChannelKey, limit_per_window: i64) -> Result<RateDecision> {
        if limit_per_window <= 0 {
            return Ok(RateDecision::Allowed { reservation: None });
        }
        let now = self.clock.now();
        let since = now - self.window;

        // entry 持有分片写锁，检查与预占在同一临界区内完成
        let mut hits = self.windows.entry((user_id, channel.clone())).or_default();
        while hits.front().map_or(false, |oldest| *oldest < since) {
            hits.pop_front();
        }

        if (hits.len() as u64) < limit_per_window as u64 {
            hits.push_back(now);
            return Ok(RateDecision::Allowed {
                reservation: Some(now),
            });
        }

        let retry_after_secs = hits
            .front()
            .map(|oldest| (*oldest + self.window - now).num_seconds() + 1)
            .unwrap_or(1)
            .max(1) as u64;
        Ok(RateDecision::Limited { retry_after_secs })
    }

    async fn release(&self, user_id: u64, channel: &ChannelKey, reservation: DateTime<Utc>) {
        if let Some(mut hits) = self.windows.get_mut(&(user_id, channel.clone())) {
            // 只归还自己那一条，并发请求后写入的较新记录保持不动
            if let Some(index) = hits.iter().rposition(|hit| *hit == reservation) {
                hits.remove(index);
            }
        }
    }

    fn purge_idle(&self) -> usize {
        let since = self.clock.now() - self.window;
        let before = self.windows.len();
        self.windows
            .retain(|_, hits| hits.back().map_or(false, |last| *last >= since));
        before.saturating_sub(self.windows.len())
    }

    fn mode(&self) -> &'static str {
        "atomic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{ManualClock, MemoryStore};
    use crate::model::QuickChatEvent;
    use crate::repository::ChatRepository;
    use uuid::Uuid;

    async fn record(store: &MemoryStore, clock: &ManualClock, user_id: u64) {
        store
            .insert_quick_chat_event(&QuickChatEvent {
                id: Uuid::new_v4(),
                from_user_id: user_id,
                to_user_id: 2,
                quick_message_id: 1,
                context: None,
                created_at: clock.now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_soft_limiter_fourth_call_within_window() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = LogRateLimiter::new(store.clone(), clock.clone(), Duration::seconds(60));

        for _ in 0..3 {
            assert!(limiter.allow(1, &ChannelKey::QuickChat, 3).await.unwrap());
            record(&store, &clock, 1).await;
            clock.advance(Duration::seconds(10));
        }
        assert!(!limiter.allow(1, &ChannelKey::QuickChat, 3).await.unwrap());

        // 距第一条 61 秒
        clock.advance(Duration::seconds(41));
        assert!(limiter.allow(1, &ChannelKey::QuickChat, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_soft_limiter_lower_bound_inclusive() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = LogRateLimiter::new(store.clone(), clock.clone(), Duration::seconds(60));

        record(&store, &clock, 1).await;
        clock.advance(Duration::seconds(60));
        assert!(!limiter.allow(1, &ChannelKey::QuickChat, 1).await.unwrap());
        clock.advance(Duration::milliseconds(1));
        assert!(limiter.allow(1, &ChannelKey::QuickChat, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_positive_limit_disables() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = LogRateLimiter::new(store.clone(), clock.clone(), Duration::seconds(60));
        for _ in 0..5 {
            record(&store, &clock, 1).await;
        }
        assert!(limiter.allow(1, &ChannelKey::QuickChat, 0).await.unwrap());
        assert!(limiter.allow(1, &ChannelKey::QuickChat, -1).await.unwrap());
    }

    fn reservation_of(decision: RateDecision) -> DateTime<Utc> {
        match decision {
            RateDecision::Allowed {
                reservation: Some(reserved_at),
            } => reserved_at,
            other => panic!("expected a reservation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_atomic_limiter_reserves_and_releases() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = AtomicWindowLimiter::new(clock.clone(), Duration::seconds(60));
        let channel = ChannelKey::Group(9);

        assert!(limiter.allow(1, &channel, 2).await.unwrap());
        let second = reservation_of(limiter.check(1, &channel, 2).await.unwrap());
        match limiter.check(1, &channel, 2).await.unwrap() {
            RateDecision::Limited { retry_after_secs } => assert_eq!(retry_after_secs, 61),
            RateDecision::Allowed { .. } => panic!("third call should be limited"),
        }

        limiter.release(1, &channel, second).await;
        assert!(limiter.allow(1, &channel, 2).await.unwrap());
        // 不同群互不影响
        assert!(limiter.allow(1, &ChannelKey::Group(10), 2).await.unwrap());

        clock.advance(Duration::seconds(61));
        assert!(limiter.allow(1, &channel, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_atomic_release_returns_only_its_own_slot() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = AtomicWindowLimiter::new(clock.clone(), Duration::seconds(60));
        let channel = ChannelKey::QuickChat;

        let failed = reservation_of(limiter.check(1, &channel, 2).await.unwrap());
        clock.advance(Duration::seconds(30));
        assert!(limiter.allow(1, &channel, 2).await.unwrap());
        assert!(!limiter.allow(1, &channel, 2).await.unwrap());

        limiter.release(1, &channel, failed).await;
        assert!(limiter.allow(1, &channel, 2).await.unwrap());
        assert!(!limiter.allow(1, &channel, 2).await.unwrap());

        // 窗口里只剩第 30 秒的两条
        clock.advance(Duration::seconds(31));
        assert!(!limiter.allow(1, &channel, 2).await.unwrap());
        clock.advance(Duration::seconds(30));
        assert!(limiter.allow(1, &channel, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_atomic_limiter_purges_idle_keys() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = AtomicWindowLimiter::new(clock.clone(), Duration::seconds(60));

        for user_id in 0..1000 {
            assert!(limiter.allow(user_id, &ChannelKey::QuickChat, 30).await.unwrap());
        }
        assert_eq!(limiter.tracked_keys(), 1000);

        clock.advance(Duration::hours(24));
        assert!(limiter.allow(5000, &ChannelKey::QuickChat, 30).await.unwrap());

        let limiter: &dyn RateLimiter = &limiter;
        assert_eq!(limiter.purge_idle(), 1000);
        assert_eq!(limiter.purge_idle(), 0);
    }

    #[tokio::test]
    async fn test_purge_keeps_keys_still_in_window() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = AtomicWindowLimiter::new(clock.clone(), Duration::seconds(60));

        assert!(limiter.allow(1, &ChannelKey::QuickChat, 3).await.unwrap());
        clock.advance(Duration::seconds(50));
        assert!(limiter.allow(2, &ChannelKey::Group(7), 3).await.unwrap());
        clock.advance(Duration::seconds(20));

        assert_eq!(limiter.purge_idle(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn test_atomic_limiter_concurrent_calls_never_exceed_limit() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = Arc::new(AtomicWindowLimiter::new(clock, Duration::seconds(60)));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.allow(1, &ChannelKey::QuickChat, 5).await.unwrap()
            }));
        }
        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
    }
}
