//! 审计日志仓库 - PostgreSQL 实现

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::{Result, ServerError};
use crate::model::AuditRecord;
use crate::repository::AuditRepository;

#[derive(Clone)]
pub struct PgAuditRepository {
    pool: Arc<PgPool>,
}

impl PgAuditRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn insert_audit(&self, record: &AuditRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO privchat_communication_audit_log (id, actor, action, target, detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.actor)
        .bind(&record.action)
        .bind(record.target.as_deref())
        .bind(&record.detail)
        .bind(record.created_at.timestamp_millis())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::dependency(format!("写入审计日志失败: {}", e)))?;
        Ok(())
    }
}
