// 认证模块 - 调用方 JWT 验证与管理端 Service Key

pub mod jwt_service;
pub mod service_key_manager;

pub use jwt_service::{AccessClaims, JwtService};
pub use service_key_manager::ServiceKeyManager;
