//! commgate - 渐进式沟通授权网关
//!
//! 用户按累计观看的广告数逐级解锁沟通能力：预设快捷消息、自定义文字、语音房。
//! 每一次快捷聊天、群聊发送和语音入房都要经过同一条检查流水线：
//! 审核状态 → 关系 → 沟通阶段 → 限流 → 载荷校验 → 提交 → 审计。

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod infra;
pub mod logging;
pub mod model;
pub mod repository;
pub mod security;
pub mod server;
pub mod service;

pub use config::ServerConfig;
pub use error::{ErrorCode, Result, ServerError};
pub use model::*;
pub use server::{build_state, spawn_rate_limit_janitor, Backends, GatewayServer};
