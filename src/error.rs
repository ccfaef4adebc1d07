use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

/// 稳定的机器可读错误码
///
/// 客户端依赖的是这个错误码而不是 message 文本，新增可以，改名不行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 身份
    Unauthenticated,
    InvalidServiceKey,
    // 参数校验
    ValidationFailed,
    InvalidThresholds,
    InvalidStage,
    // 资源
    UserNotFound,
    // 审核状态
    AccountBlocked,
    ChatMuted,
    UserBlocked,
    // 关系
    NotFriends,
    CannotMessageSelf,
    // 沟通阶段
    QuickChatLocked,
    CommunicationStageInsufficient,
    VoiceChatLocked,
    // 限流
    RateLimited,
    // 快捷消息
    QuickMessageNotFound,
    QuickMessageInactive,
    QuickMessageCategoryMismatch,
    // 文本消息
    EmptyMessage,
    MessageTooLong,
    ContentRejected,
    // 群聊
    GroupNotFound,
    GroupInactive,
    NotGroupMember,
    GroupMuted,
    // 语音房
    VoiceRoomNotFound,
    VoiceRoomInactive,
    VoiceRoomFull,
    // 服务端
    DependencyUnavailable,
    InternalError,
}

impl ErrorCode {
    /// 错误码的字符串形式（与序列化结果一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::InvalidServiceKey => "INVALID_SERVICE_KEY",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidThresholds => "INVALID_THRESHOLDS",
            ErrorCode::InvalidStage => "INVALID_STAGE",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::AccountBlocked => "ACCOUNT_BLOCKED",
            ErrorCode::ChatMuted => "CHAT_MUTED",
            ErrorCode::UserBlocked => "USER_BLOCKED",
            ErrorCode::NotFriends => "NOT_FRIENDS",
            ErrorCode::CannotMessageSelf => "CANNOT_MESSAGE_SELF",
            ErrorCode::QuickChatLocked => "QUICK_CHAT_LOCKED",
            ErrorCode::CommunicationStageInsufficient => "COMMUNICATION_STAGE_INSUFFICIENT",
            ErrorCode::VoiceChatLocked => "VOICE_CHAT_LOCKED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::QuickMessageNotFound => "QUICK_MESSAGE_NOT_FOUND",
            ErrorCode::QuickMessageInactive => "QUICK_MESSAGE_INACTIVE",
            ErrorCode::QuickMessageCategoryMismatch => "QUICK_MESSAGE_CATEGORY_MISMATCH",
            ErrorCode::EmptyMessage => "EMPTY_MESSAGE",
            ErrorCode::MessageTooLong => "MESSAGE_TOO_LONG",
            ErrorCode::ContentRejected => "CONTENT_REJECTED",
            ErrorCode::GroupNotFound => "GROUP_NOT_FOUND",
            ErrorCode::GroupInactive => "GROUP_INACTIVE",
            ErrorCode::NotGroupMember => "NOT_GROUP_MEMBER",
            ErrorCode::GroupMuted => "GROUP_MUTED",
            ErrorCode::VoiceRoomNotFound => "VOICE_ROOM_NOT_FOUND",
            ErrorCode::VoiceRoomInactive => "VOICE_ROOM_INACTIVE",
            ErrorCode::VoiceRoomFull => "VOICE_ROOM_FULL",
            ErrorCode::DependencyUnavailable => "DEPENDENCY_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 服务器错误类型
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServerError {
    /// 没有或无效的调用方身份
    #[error("Unauthenticated: {message}")]
    Unauthenticated { code: ErrorCode, message: String },
    /// 拉黑、禁言、非好友、非成员、群/房间不可用
    #[error("Forbidden [{code}]: {message}")]
    Forbidden { code: ErrorCode, message: String },
    /// 沟通阶段不足（客户端据此渲染“还需观看 N 个广告”）
    #[error("Locked [{code}]: {message}")]
    StageLocked {
        code: ErrorCode,
        message: String,
        ads_needed: u64,
    },
    /// 限流
    #[error("Rate limited: {message}")]
    RateLimited { message: String, retry_after_secs: u64 },
    /// 参数校验失败（在任何写入之前拒绝）
    #[error("Validation error [{code}]: {message}")]
    Validation { code: ErrorCode, message: String },
    /// 目标不存在
    #[error("Not found [{code}]: {message}")]
    NotFound { code: ErrorCode, message: String },
    /// 外部依赖不可用（数据库、广告计数、语音服务商）
    #[error("Dependency error: {0}")]
    Dependency(String),
    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn unauthenticated<S: Into<String>>(msg: S) -> Self {
        ServerError::Unauthenticated {
            code: ErrorCode::Unauthenticated,
            message: msg.into(),
        }
    }

    pub fn forbidden<S: Into<String>>(code: ErrorCode, msg: S) -> Self {
        ServerError::Forbidden {
            code,
            message: msg.into(),
        }
    }

    pub fn validation<S: Into<String>>(code: ErrorCode, msg: S) -> Self {
        ServerError::Validation {
            code,
            message: msg.into(),
        }
    }

    pub fn not_found<S: Into<String>>(code: ErrorCode, msg: S) -> Self {
        ServerError::NotFound {
            code,
            message: msg.into(),
        }
    }

    pub fn dependency<S: Into<String>>(msg: S) -> Self {
        ServerError::Dependency(msg.into())
    }

    /// 对外暴露的稳定错误码
    pub fn code(&self) -> ErrorCode {
        match self {
            ServerError::Unauthenticated { code, .. }
            | ServerError::Forbidden { code, .. }
            | ServerError::StageLocked { code, .. }
            | ServerError::Validation { code, .. }
            | ServerError::NotFound { code, .. } => *code,
            ServerError::RateLimited { .. } => ErrorCode::RateLimited,
            ServerError::Dependency(_) => ErrorCode::DependencyUnavailable,
            ServerError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden { .. } | ServerError::StageLocked { .. } => StatusCode::FORBIDDEN,
            ServerError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Validation { .. } => StatusCode::BAD_REQUEST,
            ServerError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServerError::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 监控用的粗粒度结果标签
    pub fn outcome_label(&self) -> &'static str {
        match self {
            ServerError::Unauthenticated { .. } => "unauthenticated",
            ServerError::Forbidden { .. } | ServerError::StageLocked { .. } => "forbidden",
            ServerError::RateLimited { .. } => "rate_limited",
            ServerError::Validation { .. } => "invalid",
            ServerError::NotFound { .. } => "not_found",
            ServerError::Dependency(_) => "dependency_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let retry_after = match &self {
            ServerError::RateLimited {
                retry_after_secs, ..
            } => HeaderValue::from_str(&retry_after_secs.to_string()).ok(),
            _ => None,
        };

        let error_response = ErrorResponse::new(&self);
        let mut response = (status_code, Json(error_response)).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl From<sqlx::Error> for ServerError {
    fn from(err: sqlx::Error) -> Self {
        ServerError::Dependency(format!("database: {}", err))
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        ServerError::Dependency(format!("voice provider: {}", err))
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::Internal(format!("serialization: {}", err))
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ServerError>;

/// 错误响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: ErrorCode,
    /// 错误消息
    pub message: String,
    /// 详细信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// 时间戳
    pub timestamp: u64,
}

impl ErrorResponse {
    /// 创建错误响应
    pub fn new(error: &ServerError) -> Self {
        let details = match error {
            ServerError::StageLocked { ads_needed, .. } => {
                Some(serde_json::json!({ "ads_needed": ads_needed }))
            }
            ServerError::RateLimited {
                retry_after_secs, ..
            } => Some(serde_json::json!({ "retry_after_secs": retry_after_secs })),
            _ => None,
        };

        Self {
            code: error.code(),
            message: error.to_string(),
            details,
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_as_stable_string() {
        let json = serde_json::to_string(&ErrorCode::CommunicationStageInsufficient).unwrap();
        assert_eq!(json, "\"COMMUNICATION_STAGE_INSUFFICIENT\"");
        assert_eq!(ErrorCode::NotFriends.as_str(), "NOT_FRIENDS");

        let back: ErrorCode = serde_json::from_str("\"VOICE_CHAT_LOCKED\"").unwrap();
        assert_eq!(back, ErrorCode::VoiceChatLocked);
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            ServerError::unauthenticated("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::forbidden(ErrorCode::NotFriends, "x").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::RateLimited {
                message: "x".into(),
                retry_after_secs: 60
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ServerError::not_found(ErrorCode::UserNotFound, "x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::dependency("db down").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_stage_locked_response_carries_ads_needed() {
        let err = ServerError::StageLocked {
            code: ErrorCode::VoiceChatLocked,
            message: "语音聊天未解锁".into(),
            ads_needed: 38,
        };
        let body = ErrorResponse::new(&err);
        assert_eq!(body.code, ErrorCode::VoiceChatLocked);
        assert_eq!(body.details.unwrap()["ads_needed"], 38);
    }
}
