// src/db/user_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{conflict_on_unique, AppError},
    common::pagination::PaginationQuery,
    models::auth::{Session, UpdateUserPayload, User},
};

const USER_COLUMNS: &str = r#"
    id, tenant_id, email, password_hash, first_name, last_name, is_active,
    last_login_at, created_at, updated_at, deleted_at
"#;

// O repositório de usuários, responsável pelas tabelas 'users' e 'sessions'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Login: o e-mail é único por tenant, então a busca precisa dos dois
    pub async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE tenant_id = $1 AND lower(email) = lower($2) AND deleted_at IS NULL"
        );
        let maybe_user = sqlx::query_as::<_, User>(&sql)
            .bind(tenant_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe_user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let maybe_user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe_user)
    }

    pub async fn find_in_tenant<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL"
        );
        let maybe_user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;
        Ok(maybe_user)
    }

    pub async fn create_user<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO users (tenant_id, email, password_hash, first_name, last_name)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(tenant_id)
            .bind(email)
            .bind(password_hash)
            .bind(first_name)
            .bind(last_name)
            .fetch_one(executor)
            .await
            .map_err(conflict_on_unique("User", email))
    }

    pub async fn list_users(
        &self,
        conn: &mut sqlx::PgConnection,
        tenant_id: Uuid,
        query: &PaginationQuery,
    ) -> Result<(Vec<User>, i64), AppError> {
        let filter = r#"
            tenant_id = $1 AND deleted_at IS NULL
            AND ($2::text IS NULL OR email ILIKE $2 OR first_name ILIKE $2 OR last_name ILIKE $2)
        "#;
        let search = query.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
            .bind(tenant_id)
            .bind(search.as_deref())
            .fetch_one(&mut *conn)
            .await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter}
             ORDER BY first_name, last_name, email LIMIT $3 OFFSET $4"
        );
        let data = sqlx::query_as::<_, User>(&sql)
            .bind(tenant_id)
            .bind(search.as_deref())
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&mut *conn)
            .await?;

        Ok((data, total))
    }

    pub async fn update_user<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateUserPayload,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(payload.first_name.as_deref())
            .bind(payload.last_name.as_deref())
            .bind(payload.is_active)
            .fetch_one(executor)
            .await?;
        Ok(user)
    }

    pub async fn update_password<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(executor)
            .await?;
        Ok(())
    }

    // Libera o e-mail: o índice único ignora linhas excluídas
    pub async fn soft_delete_user<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE users SET deleted_at = NOW(), is_active = false, updated_at = NOW() WHERE id = $1",
        )
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn touch_last_login<'e, E>(&self, executor: E, user_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // --- Sessões (refresh tokens) ---

    pub async fn create_session<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, refresh_token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, refresh_token, is_valid, expires_at, created_at
            "#,
        )
            .bind(user_id)
            .bind(refresh_token)
            .bind(expires_at)
            .fetch_one(executor)
            .await?;
        Ok(session)
    }

    // Trava a linha: duas renovações simultâneas com o mesmo token não podem ambas vencer
    pub async fn find_valid_session_for_update<'e, E>(
        &self,
        executor: E,
        refresh_token: &str,
    ) -> Result<Option<Session>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, refresh_token, is_valid, expires_at, created_at
            FROM sessions
            WHERE refresh_token = $1 AND is_valid = true AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
            .bind(refresh_token)
            .fetch_optional(executor)
            .await?;
        Ok(session)
    }

    /// Derruba todas as sessões do usuário (exclusão ou troca de senha).
    pub async fn invalidate_sessions<'e, E>(&self, executor: E, user_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE sessions SET is_valid = false WHERE user_id = $1 AND is_valid = true")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn rotate_session<'e, E>(
        &self,
        executor: E,
        session_id: Uuid,
        new_refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE sessions SET refresh_token = $2, expires_at = $3 WHERE id = $1",
        )
            .bind(session_id)
            .bind(new_refresh_token)
            .bind(expires_at)
            .execute(executor)
            .await?;
        Ok(())
    }
}
