use crate::error::{Result, ServerError};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 调用方身份 token 的 claims，`sub` 是用户 ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl AccessClaims {
    pub fn user_id(&self) -> Result<u64> {
        self.sub
            .parse::<u64>()
            .map_err(|_| ServerError::unauthenticated("token 中的 sub 不是有效的用户 ID"))
    }
}

/// JWT 验证服务 (HS256 对称加密)
///
/// token 由主业务服务签发，这里只验证；`issue_token` 供运维工具和测试使用。
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    token_ttl: i64,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String, audience: String, token_ttl: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            token_ttl,
        }
    }

    pub fn issue_token(&self, user_id: u64, custom_ttl: Option<i64>) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            aud: self.audience.clone(),
            exp: now + custom_ttl.unwrap_or(self.token_ttl),
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServerError::Internal(format!("JWT 签发失败: {}", e)))
    }

    /// 验证签名、过期时间、issuer 和 audience
    pub fn verify_token(&self, token: &str) -> Result<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| ServerError::unauthenticated(format!("无效的 token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// 验证 token 并取出用户 ID
    pub fn authenticate(&self, token: &str) -> Result<u64> {
        self.verify_token(token)?.user_id()
    }
}
