//! HTTP 接口 - 使用 Axum 暴露网关与管理 API
//!
//! - `/api/app/*`   客户端接口（Bearer JWT）
//! - `/api/admin/*` 管理接口（X-Service-Key）
//! - `/health`、`/metrics` 运维接口

pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{build_router, GatewayHttpServer, HttpServerState};
