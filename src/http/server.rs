//! HTTP 服务器 - 使用 Axum 暴露网关接口

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{JwtService, ServiceKeyManager};
use crate::gateway::{GroupChatGateway, QuickChatGateway, VoiceRoomGateway};
use crate::http::routes;
use crate::security::RateLimiter;
use crate::service::{ChatSettingsService, OverrideService, PolicyEvaluator, ThresholdService};

/// HTTP 服务器共享状态
#[derive(Clone)]
pub struct HttpServerState {
    pub jwt_service: Arc<JwtService>,
    pub service_key_manager: Arc<ServiceKeyManager>,
    // 读侧
    pub policy_evaluator: Arc<PolicyEvaluator>,
    // 管理侧
    pub threshold_service: Arc<ThresholdService>,
    pub override_service: Arc<OverrideService>,
    pub chat_settings_service: Arc<ChatSettingsService>,
    // 三个渠道网关
    pub quick_chat: Arc<QuickChatGateway>,
    pub group_chat: Arc<GroupChatGateway>,
    pub voice_room: Arc<VoiceRoomGateway>,
    // 后台清理用
    pub rate_limiter: Arc<dyn RateLimiter>,
}

/// 构建完整路由（测试直接对它发请求）
pub fn build_router(state: HttpServerState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 网关 HTTP 服务器
pub struct GatewayHttpServer {
    state: HttpServerState,
    bind_address: String,
}

impl GatewayHttpServer {
    pub fn new(state: HttpServerState, bind_address: String) -> Self {
        Self {
            state,
            bind_address,
        }
    }

    /// 启动 HTTP 服务器，直到收到 Ctrl-C
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = build_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!("🌐 HTTP 服务器启动在 {}", self.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("👋 HTTP 服务器已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("🛑 收到停止信号，开始关闭...");
    }
}
