//! 语音服务商客户端
//!
//! 只负责向服务商请求入房 token。未配置 token_endpoint 时视为不可用，
//! 入房请求会在所有授权检查通过后以 DEPENDENCY_UNAVAILABLE 失败。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{Result, ServerError};
use crate::infra::Clock;
use crate::model::VoiceToken;

#[async_trait]
pub trait VoiceProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    /// 为用户签发进入某个频道的 token
    async fn issue_join_token(&self, channel_name: &str, user_id: u64, ttl: Duration) -> Result<VoiceToken>;
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    channel_name: &'a str,
    uid: u64,
    ttl_secs: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    /// 服务商给出的过期时间（秒级时间戳），缺省按 ttl 计算
    #[serde(default)]
    expires_at: Option<i64>,
}

/// 通过 HTTP 接口签发 token 的服务商
pub struct HttpVoiceProvider {
    client: Client,
    name: String,
    endpoint: Option<String>,
    api_key: Option<String>,
    clock: Arc<dyn Clock>,
}

impl HttpVoiceProvider {
    pub fn new(
        name: String,
        endpoint: Option<String>,
        api_key: Option<String>,
        timeout: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Internal(format!("voice provider client: {}", e)))?;
        Ok(Self {
            client,
            name,
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            api_key,
            clock,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[async_trait]
impl VoiceProvider for HttpVoiceProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn issue_join_token(&self, channel_name: &str, user_id: u64, ttl: Duration) -> Result<VoiceToken> {
        let Some(endpoint) = &self.endpoint else {
            return Err(ServerError::dependency(format!(
                "语音服务商 {} 未配置 token_endpoint",
                self.name
            )));
        };

        let mut request = self.client.post(endpoint).json(&TokenRequest {
            channel_name,
            uid: user_id,
            ttl_secs: ttl.num_seconds(),
        });
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "[{}] 签发 token 失败: channel={}, user_id={}, status={}, error={}",
                self.name, channel_name, user_id, status, error_text
            );
            return Err(ServerError::dependency(format!(
                "voice provider {} returned {}",
                self.name, status
            )));
        }

        let body: TokenResponse = response.json().await?;
        let expires_at = body
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(|| self.clock.now() + ttl);

        info!(
            "[{}] token 已签发: channel={}, user_id={}",
            self.name, channel_name, user_id
        );
        Ok(VoiceToken {
            token: body.token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::infra::SystemClock;

    #[tokio::test]
    async fn test_unconfigured_provider_is_a_dependency_error() {
        let provider = HttpVoiceProvider::new(
            "agora".to_string(),
            Some("  ".to_string()),
            None,
            std::time::Duration::from_secs(5),
            Arc::new(SystemClock),
        )
        .unwrap();
        assert!(!provider.is_configured());

        let err = provider
            .issue_join_token("room-1", 7, Duration::hours(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DependencyUnavailable);
    }
}
