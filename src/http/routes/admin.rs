//! 管理 API 路由模块
//!
//! 统一的管理接口，使用 X-Service-Key 进行安全认证
//!
//! - 用户沟通状态：查询任意用户的生效阶段与解锁进度
//! - 阈值策略：查询、部分更新
//! - 阶段覆盖：查询、创建/替换、删除
//! - 聊天设置：群聊限流

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::http::middleware::verify_service_key;
use crate::http::routes::{json_body, path_param};
use crate::http::HttpServerState;
use crate::model::{CommunicationStatus, StageOverride, ThresholdConfig, ThresholdUpdate};
use crate::service::{ChatSettings, ChatSettingsUpdate};

/// 创建管理 API 路由
pub fn create_route() -> Router<HttpServerState> {
    Router::new()
        .route("/api/admin/communication/status/{user_id}", get(get_user_status))
        .route(
            "/api/admin/communication/policy",
            get(get_policy).put(update_policy),
        )
        .route(
            "/api/admin/communication/overrides/{user_id}",
            get(get_override).put(upsert_override).delete(delete_override),
        )
        .route(
            "/api/admin/communication/chat-settings",
            get(get_chat_settings).put(update_chat_settings),
        )
}

// =====================================================
// 沟通状态
// =====================================================

async fn get_user_status(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    user_id: std::result::Result<Path<u64>, PathRejection>,
) -> Result<Json<CommunicationStatus>> {
    verify_service_key(&headers, &state)?;
    let user_id = path_param(user_id)?;
    let status = state.policy_evaluator.evaluate(user_id).await?;
    Ok(Json(status))
}

// =====================================================
// 阈值策略
// =====================================================

async fn get_policy(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
) -> Result<Json<ThresholdConfig>> {
    verify_service_key(&headers, &state)?;
    let config = state.threshold_service.get().await?;
    Ok(Json(config))
}

/// 部分更新，合并后的结果必须满足 preset_only_max_ads < custom_min_ads <= voice_min_ads
async fn update_policy(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    body: std::result::Result<Json<ThresholdUpdate>, JsonRejection>,
) -> Result<Json<ThresholdConfig>> {
    verify_service_key(&headers, &state)?;
    let update = json_body(body)?;
    let config = state.threshold_service.update(&update).await?;
    info!(
        "🛠️ 管理端更新阈值: {}/{}/{}",
        config.preset_only_max_ads, config.custom_min_ads, config.voice_min_ads
    );
    Ok(Json(config))
}

// =====================================================
// 阶段覆盖
// =====================================================

/// 不存在时返回 null
async fn get_override(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    user_id: std::result::Result<Path<u64>, PathRejection>,
) -> Result<Json<Option<StageOverride>>> {
    verify_service_key(&headers, &state)?;
    let user_id = path_param(user_id)?;
    let stage_override = state.override_service.get(user_id).await?;
    Ok(Json(stage_override))
}

#[derive(Debug, Deserialize)]
struct UpsertOverrideBody {
    forced_stage: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

async fn upsert_override(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    user_id: std::result::Result<Path<u64>, PathRejection>,
    body: std::result::Result<Json<UpsertOverrideBody>, JsonRejection>,
) -> Result<Json<StageOverride>> {
    verify_service_key(&headers, &state)?;
    let user_id = path_param(user_id)?;
    let body = json_body(body)?;
    let stage_override = state
        .override_service
        .upsert(user_id, &body.forced_stage, body.expires_at)
        .await?;
    Ok(Json(stage_override))
}

/// 幂等：没有覆盖时同样返回成功
async fn delete_override(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    user_id: std::result::Result<Path<u64>, PathRejection>,
) -> Result<Json<Value>> {
    verify_service_key(&headers, &state)?;
    let user_id = path_param(user_id)?;
    state.override_service.delete(user_id).await?;
    Ok(Json(json!({
        "success": true,
        "user_id": user_id,
    })))
}

// =====================================================
// 聊天设置
// =====================================================

async fn get_chat_settings(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
) -> Result<Json<ChatSettings>> {
    verify_service_key(&headers, &state)?;
    let settings = state.chat_settings_service.get().await?;
    Ok(Json(settings))
}

async fn update_chat_settings(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    body: std::result::Result<Json<ChatSettingsUpdate>, JsonRejection>,
) -> Result<Json<ChatSettings>> {
    verify_service_key(&headers, &state)?;
    let update = json_body(body)?;
    let settings = state.chat_settings_service.update(&update).await?;
    Ok(Json(settings))
}
