//! 服务装配与启动
//!
//! 按配置选择存储后端，把仓库、服务、网关组装成 HTTP 共享状态。

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::{JwtService, ServiceKeyManager};
use crate::config::{RateLimitMode, ServerConfig, StorageBackend};
use crate::error::{Result, ServerError};
use crate::gateway::{CheckPipeline, GroupChatGateway, QuickChatGateway, VoiceRoomGateway};
use crate::http::{GatewayHttpServer, HttpServerState};
use crate::infra::{database::mask_database_url, Clock, Database, MemoryStore, SystemClock};
use crate::repository::{
    ActionLog, AuditRepository, ChatRepository, EngagementCounter, GroupDirectory,
    ModerationDirectory, OverrideRepository, PgAuditRepository, PgChatRepository, PgDirectory,
    PgOverrideRepository, PgSettingsRepository, PgVoiceRoomRepository, ProfileDirectory,
    QuickMessageCatalog, RelationshipDirectory, SettingsRepository, VoiceRoomDirectory,
};
use crate::security::{AtomicWindowLimiter, LogRateLimiter, RateLimiter};
use crate::service::{
    AuditService, ChatSettingsService, ContentFilter, HttpVoiceProvider, ModerationGuard,
    NoopFilter, OverrideService, PolicyEvaluator, SettingsResolver, ThresholdService,
    VoiceProvider, WordListFilter,
};

/// JWT 默认有效期（秒），网关只校验不签发，签发用于工具和测试
const DEFAULT_JWT_TTL_SECS: i64 = 7 * 24 * 3600;

/// 所有存储/协作方接口的具体实现
#[derive(Clone)]
pub struct Backends {
    pub settings: Arc<dyn SettingsRepository>,
    pub overrides: Arc<dyn OverrideRepository>,
    pub engagement: Arc<dyn EngagementCounter>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub relationships: Arc<dyn RelationshipDirectory>,
    pub moderation: Arc<dyn ModerationDirectory>,
    pub groups: Arc<dyn GroupDirectory>,
    pub catalog: Arc<dyn QuickMessageCatalog>,
    pub rooms: Arc<dyn VoiceRoomDirectory>,
    pub chats: Arc<dyn ChatRepository>,
    pub action_log: Arc<dyn ActionLog>,
    pub audit: Arc<dyn AuditRepository>,
}

impl Backends {
    /// PostgreSQL 实现
    pub fn postgres(database: &Database) -> Self {
        let pool = database.pool();
        let directory = Arc::new(PgDirectory::new(pool.clone()));
        let chats = Arc::new(PgChatRepository::new(pool.clone()));
        Self {
            settings: Arc::new(PgSettingsRepository::new(pool.clone())),
            overrides: Arc::new(PgOverrideRepository::new(pool.clone())),
            engagement: directory.clone(),
            profiles: directory.clone(),
            relationships: directory.clone(),
            moderation: directory.clone(),
            groups: directory.clone(),
            catalog: directory,
            rooms: Arc::new(PgVoiceRoomRepository::new(pool.clone())),
            chats: chats.clone(),
            action_log: chats,
            audit: Arc::new(PgAuditRepository::new(pool)),
        }
    }

    /// 进程内实现（本地调试、测试）
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            settings: store.clone(),
            overrides: store.clone(),
            engagement: store.clone(),
            profiles: store.clone(),
            relationships: store.clone(),
            moderation: store.clone(),
            groups: store.clone(),
            catalog: store.clone(),
            rooms: store.clone(),
            chats: store.clone(),
            action_log: store.clone(),
            audit: store,
        }
    }
}

/// 组装 HTTP 共享状态
pub fn build_state(
    config: &ServerConfig,
    backends: Backends,
    clock: Arc<dyn Clock>,
    voice_provider: Arc<dyn VoiceProvider>,
) -> Result<HttpServerState> {
    let audit = Arc::new(AuditService::new(backends.audit.clone(), clock.clone()));
    let resolver = Arc::new(SettingsResolver::new(
        backends.settings.clone(),
        config.policy.defaults(),
    ));

    let threshold_service = Arc::new(ThresholdService::new(
        resolver.clone(),
        backends.settings.clone(),
        audit.clone(),
    ));
    let chat_settings_service = Arc::new(ChatSettingsService::new(
        resolver.clone(),
        backends.settings.clone(),
        audit.clone(),
    ));
    let override_service = Arc::new(OverrideService::new(
        backends.overrides.clone(),
        backends.profiles.clone(),
        audit.clone(),
        clock.clone(),
    ));
    let policy_evaluator = Arc::new(PolicyEvaluator::new(
        threshold_service.clone(),
        backends.engagement.clone(),
        backends.overrides.clone(),
        clock.clone(),
    ));
    let guard = Arc::new(ModerationGuard::new(
        backends.moderation.clone(),
        backends.relationships.clone(),
        backends.groups.clone(),
        backends.rooms.clone(),
    ));

    let window = config.rate_limit.window();
    let limiter: Arc<dyn RateLimiter> = match config.rate_limit.mode {
        RateLimitMode::Soft => Arc::new(LogRateLimiter::new(
            backends.action_log.clone(),
            clock.clone(),
            window,
        )),
        RateLimitMode::Atomic => Arc::new(AtomicWindowLimiter::new(clock.clone(), window)),
    };
    info!("🚦 限流模式: {}", limiter.mode());

    let pipeline = Arc::new(CheckPipeline::new(
        guard,
        policy_evaluator.clone(),
        limiter.clone(),
        audit,
        clock,
    ));

    let filter: Arc<dyn ContentFilter> =
        if config.chat.blocked_words.is_empty() && config.chat.masked_words.is_empty() {
            Arc::new(NoopFilter)
        } else {
            Arc::new(WordListFilter::new(
                &config.chat.blocked_words,
                &config.chat.masked_words,
            )?)
        };

    let quick_chat = Arc::new(QuickChatGateway::new(
        pipeline.clone(),
        backends.profiles.clone(),
        backends.catalog.clone(),
        backends.chats.clone(),
        config.rate_limit.quick_chat_per_minute,
    ));
    let group_chat = Arc::new(GroupChatGateway::new(
        pipeline.clone(),
        resolver,
        backends.catalog.clone(),
        backends.chats.clone(),
        filter,
        config.chat.max_text_length,
    ));
    let voice_room = Arc::new(VoiceRoomGateway::new(
        pipeline,
        backends.rooms.clone(),
        voice_provider,
        config.voice.token_ttl(),
    ));

    let service_key_manager = Arc::new(ServiceKeyManager::new(config.auth.service_keys.clone()));
    if service_key_manager.is_empty() {
        warn!("⚠️ 没有可用的 service key，管理接口将拒绝所有请求");
    }

    Ok(HttpServerState {
        jwt_service: Arc::new(JwtService::new(
            &config.auth.jwt_secret,
            config.auth.jwt_issuer.clone(),
            config.auth.jwt_audience.clone(),
            DEFAULT_JWT_TTL_SECS,
        )),
        service_key_manager,
        policy_evaluator,
        threshold_service,
        override_service,
        chat_settings_service,
        quick_chat,
        group_chat,
        voice_room,
        rate_limiter: limiter,
    })
}

/// 定期清理限流器里整窗空闲的键（原子模式下按用户常驻内存）
pub fn spawn_rate_limit_janitor(
    limiter: Arc<dyn RateLimiter>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            let purged = limiter.purge_idle();
            if purged > 0 {
                info!("🧹 清理空闲限流窗口: {} 个", purged);
            }
        }
    })
}

/// 网关服务器
pub struct GatewayServer {
    config: ServerConfig,
    rate_limiter: Arc<dyn RateLimiter>,
    http_server: GatewayHttpServer,
}

impl GatewayServer {
    /// 连接存储并组装所有组件
    pub async fn new(config: ServerConfig) -> Result<Self> {
        info!("🔧 初始化网关组件...");

        if let Err(e) = crate::infra::metrics::init() {
            warn!("⚠️ Prometheus 指标初始化失败: {}", e);
        }

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let backends = match config.storage {
            StorageBackend::Postgres => {
                info!(
                    "🗄️ 连接数据库: {}",
                    mask_database_url(&config.database_url)
                );
                let database =
                    Database::connect(&config.database_url, config.database_max_connections)
                        .await?;
                database.check_connection().await?;
                Backends::postgres(&database)
            }
            StorageBackend::Memory => {
                warn!("⚠️ 使用内存存储，重启后数据会丢失");
                Backends::memory(Arc::new(MemoryStore::new()))
            }
        };

        let voice_provider = HttpVoiceProvider::new(
            config.voice.provider_name.clone(),
            config.voice.token_endpoint.clone(),
            config.voice.api_key.clone(),
            config.voice.request_timeout(),
            clock.clone(),
        )?;
        if !voice_provider.is_configured() {
            warn!("⚠️ 语音服务商未配置，入房请求会返回 DEPENDENCY_UNAVAILABLE");
        }

        let state = build_state(&config, backends, clock, Arc::new(voice_provider))?;
        let rate_limiter = state.rate_limiter.clone();
        let http_server = GatewayHttpServer::new(state, config.bind_address());

        info!("✅ 网关组件初始化完成");
        Ok(Self {
            config,
            rate_limiter,
            http_server,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// 运行直到收到停止信号
    pub async fn run(&self) -> Result<()> {
        if self.config.rate_limit.mode == RateLimitMode::Atomic {
            spawn_rate_limit_janitor(
                self.rate_limiter.clone(),
                Duration::from_secs(self.config.rate_limit.window_secs.max(1)),
            );
        }

        self.http_server
            .start()
            .await
            .map_err(|e| ServerError::Internal(format!("HTTP 服务器异常退出: {}", e)))
    }
}
