// 业务服务层模块
pub mod audit_service;
pub mod chat_settings_service;
pub mod content_filter;
pub mod moderation_guard;
pub mod override_service;
pub mod policy_service;
pub mod settings_resolver;
pub mod threshold_service;
pub mod voice_provider;

pub use audit_service::AuditService;
pub use chat_settings_service::{ChatSettings, ChatSettingsService, ChatSettingsUpdate};
pub use content_filter::{ContentFilter, FilterOutcome, NoopFilter, WordListFilter};
pub use moderation_guard::ModerationGuard;
pub use override_service::OverrideService;
pub use policy_service::{denial_code, require_capability, PolicyEvaluator};
pub use settings_resolver::{PolicyDefaults, SettingsResolver};
pub use threshold_service::ThresholdService;
pub use voice_provider::{HttpVoiceProvider, VoiceProvider};
