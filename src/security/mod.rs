/// 安全模块
///
/// 按 (user, channel) 的滑动窗口限流，软限流与原子限流两种模式，通过 `[rate_limit] mode` 选择。
pub mod rate_limiter;

pub use rate_limiter::{AtomicWindowLimiter, LogRateLimiter, RateDecision, RateLimiter};
