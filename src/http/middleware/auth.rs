//! 请求身份校验
//!
//! 客户端接口从 `Authorization: Bearer <jwt>` 取调用方 user_id，
//! 管理接口校验 `X-Service-Key`。

use axum::http::{header, HeaderMap};
use tracing::{debug, warn};

use crate::error::{ErrorCode, Result, ServerError};
use crate::http::HttpServerState;

/// 解析 Bearer token，返回调用方 user_id
pub fn authenticate_user(headers: &HeaderMap, state: &HttpServerState) -> Result<u64> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ServerError::unauthenticated("缺少 Authorization 请求头"))?;

    let value = value
        .to_str()
        .map_err(|_| ServerError::unauthenticated("Authorization 格式无效"))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServerError::unauthenticated("Authorization 必须是 Bearer token"))?;

    let user_id = state.jwt_service.authenticate(token)?;
    debug!("🔐 调用方已认证: user_id={}", user_id);
    Ok(user_id)
}

/// 从请求头中提取并验证 Service Key
pub fn verify_service_key(headers: &HeaderMap, state: &HttpServerState) -> Result<()> {
    let key = headers.get("X-Service-Key").ok_or_else(|| {
        warn!("缺少 X-Service-Key 请求头");
        invalid_service_key("缺少 X-Service-Key 请求头")
    })?;

    let service_key = key.to_str().map_err(|_| {
        warn!("X-Service-Key 格式无效");
        invalid_service_key("X-Service-Key 格式无效")
    })?;

    if !state.service_key_manager.verify(service_key) {
        warn!("❌ 无效的 service key");
        return Err(invalid_service_key("无效的 service key"));
    }

    Ok(())
}

fn invalid_service_key(message: &str) -> ServerError {
    ServerError::Unauthenticated {
        code: ErrorCode::InvalidServiceKey,
        message: message.to_string(),
    }
}
