// src/db/tenant_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::tenancy::Tenant;

#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Tenant ativo pelo código informado no login.
    pub async fn find_active_by_code(&self, code: &str) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, code, name, is_active, created_at, updated_at
            FROM tenants
            WHERE code = $1 AND is_active = true
            "#,
        )
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    /// Usado pelo auth_guard: um token de tenant desativado deixa de valer.
    pub async fn is_active(&self, tenant_id: Uuid) -> Result<bool, AppError> {
        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM tenants WHERE id = $1")
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(active.unwrap_or(false))
    }

    pub async fn upsert<'e, E>(&self, executor: E, code: &str, name: &str) -> Result<Tenant, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (code, name)
            VALUES ($1, $2)
            ON CONFLICT (code) DO UPDATE SET updated_at = NOW()
            RETURNING id, code, name, is_active, created_at, updated_at
            "#,
        )
            .bind(code)
            .bind(name)
            .fetch_one(executor)
            .await?;
        Ok(tenant)
    }
}
