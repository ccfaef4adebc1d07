//! 配置记录仓库 - PostgreSQL 实现

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, ServerError};
use crate::repository::SettingsRepository;

/// 配置仓库 (PostgreSQL 实现，privchat_settings 表)
#[derive(Clone)]
pub struct PgSettingsRepository {
    pool: Arc<PgPool>,
}

impl PgSettingsRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for PgSettingsRepository {
    async fn load_settings(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM privchat_settings WHERE key = ANY($1)",
        )
        .bind(&keys)
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("读取配置失败: {}", e)))?;

        Ok(rows.into_iter().collect())
    }

    async fn save_settings(&self, pairs: &[(String, String)]) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ServerError::dependency(format!("开启事务失败: {}", e)))?;

        for (key, value) in pairs {
            sqlx::query(
                r#"
                INSERT INTO privchat_settings (key, value, updated_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| ServerError::dependency(format!("写入配置 {} 失败: {}", key, e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| ServerError::dependency(format!("提交配置失败: {}", e)))?;
        Ok(())
    }
}
