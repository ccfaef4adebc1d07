//! HTTP 路由模块
//!
//! 路由结构：
//! - `/api/app/*`   - 客户端接口（Bearer JWT）
//!   - `/api/app/communication/status` - 自己的沟通状态
//!   - `/api/app/quick-chat/send` - 快捷聊天
//!   - `/api/app/groups/{group_id}/messages` - 群聊
//!   - `/api/app/voice/rooms/join` - 语音入房
//! - `/api/admin/communication/*` - 管理接口（X-Service-Key）
//! - `/health`、`/metrics`

pub mod admin;
pub mod app;
pub mod metrics;

use axum::{extract::rejection::JsonRejection, extract::rejection::PathRejection, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::error::{ErrorCode, Result, ServerError};
use crate::http::HttpServerState;

/// 创建所有路由
pub fn create_routes() -> Router<HttpServerState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .merge(app::create_route()) // /api/app/*
        .merge(admin::create_route()) // /api/admin/*
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

/// 请求体解析失败统一转成 VALIDATION_FAILED
pub(crate) fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|e| ServerError::validation(ErrorCode::ValidationFailed, e.body_text()))
}

/// 路径参数解析失败统一转成 VALIDATION_FAILED
pub(crate) fn path_param<T>(path: std::result::Result<axum::extract::Path<T>, PathRejection>) -> Result<T> {
    path.map(|axum::extract::Path(value)| value)
        .map_err(|e| ServerError::validation(ErrorCode::ValidationFailed, e.body_text()))
}
