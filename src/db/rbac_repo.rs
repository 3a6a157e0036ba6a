// src/db/rbac_repo.rs

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::common::error::{conflict_on_unique, AppError};
use crate::common::pagination::PaginationQuery;
use crate::models::rbac::{Permission, Role};
use crate::services::permission::{Grants, PermissionCode, PermissionSet, PermissionSource};

const PERMISSION_COLUMNS: &str = r#"
    id, tenant_id, code, name, description, module, resource, action, scope,
    is_system_permission, is_active, created_at, updated_at, deleted_at
"#;

const ROLE_COLUMNS: &str = r#"
    id, tenant_id, code, name, description, parent_role_id, level,
    is_system_role, is_active, created_at, updated_at, deleted_at
"#;

#[derive(Clone)]
pub struct RbacRepository {
    pool: PgPool,
}

impl RbacRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Permissões
    // ---

    /// Catálogo do sistema: cria ou atualiza o nome, sempre como permissão global.
    pub async fn upsert_system_permission<'e, E>(
        &self,
        executor: E,
        code: &PermissionCode,
        name: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO permissions (tenant_id, code, name, module, resource, action, scope, is_system_permission)
            VALUES (NULL, $1, $2, $3, $4, $5, $6, true)
            ON CONFLICT (code) WHERE deleted_at IS NULL
            DO UPDATE SET name = EXCLUDED.name, is_system_permission = true, updated_at = NOW()
            "#,
        )
            .bind(code.to_string())
            .bind(name)
            .bind(&code.module)
            .bind(&code.resource)
            .bind(&code.action)
            .bind(&code.scope)
            .execute(executor)
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_permission<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        code: &str,
        name: &str,
        description: Option<&str>,
        module: &str,
        resource: &str,
        action: &str,
        scope: &str,
    ) -> Result<Permission, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO permissions (tenant_id, code, name, description, module, resource, action, scope)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PERMISSION_COLUMNS}"
        );
        sqlx::query_as::<_, Permission>(&sql)
            .bind(tenant_id)
            .bind(code)
            .bind(name)
            .bind(description)
            .bind(module)
            .bind(resource)
            .bind(action)
            .bind(scope)
            .fetch_one(executor)
            .await
            .map_err(conflict_on_unique("Permission", code))
    }

    pub async fn find_permission_by_code<'e, E>(
        &self,
        executor: E,
        code: &str,
    ) -> Result<Option<Permission>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE code = $1 AND deleted_at IS NULL");
        let permission = sqlx::query_as::<_, Permission>(&sql)
            .bind(code)
            .fetch_optional(executor)
            .await?;
        Ok(permission)
    }

    // Permissões visíveis para o tenant: as dele mais as globais (tenant_id NULL)
    pub async fn find_permission<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Permission>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions
             WHERE id = $1 AND (tenant_id = $2 OR tenant_id IS NULL) AND deleted_at IS NULL"
        );
        let permission = sqlx::query_as::<_, Permission>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;
        Ok(permission)
    }

    pub async fn list_permissions(
        &self,
        conn: &mut sqlx::PgConnection,
        tenant_id: Uuid,
        query: &PaginationQuery,
    ) -> Result<(Vec<Permission>, i64), AppError> {
        let filter = r#"
            (tenant_id = $1 OR tenant_id IS NULL) AND deleted_at IS NULL
            AND ($2::text IS NULL OR code ILIKE $2 OR name ILIKE $2)
        "#;
        let search = query.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM permissions WHERE {filter}"))
            .bind(tenant_id)
            .bind(search.as_deref())
            .fetch_one(&mut *conn)
            .await?;

        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE {filter}
             ORDER BY module, code LIMIT $3 OFFSET $4"
        );
        let data = sqlx::query_as::<_, Permission>(&sql)
            .bind(tenant_id)
            .bind(search.as_deref())
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&mut *conn)
            .await?;

        Ok((data, total))
    }

    pub async fn list_permissions_by_module<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        module: &str,
    ) -> Result<Vec<Permission>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions
             WHERE module = $2 AND (tenant_id = $1 OR tenant_id IS NULL) AND deleted_at IS NULL
             ORDER BY resource, action"
        );
        let permissions = sqlx::query_as::<_, Permission>(&sql)
            .bind(tenant_id)
            .bind(module)
            .fetch_all(executor)
            .await?;
        Ok(permissions)
    }

    pub async fn update_permission<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Permission, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE permissions SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {PERMISSION_COLUMNS}"
        );
        let permission = sqlx::query_as::<_, Permission>(&sql)
            .bind(id)
            .bind(name)
            .bind(description)
            .bind(is_active)
            .fetch_one(executor)
            .await?;
        Ok(permission)
    }

    pub async fn soft_delete_permission<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE permissions SET deleted_at = NOW(), is_active = false WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // Buscar permissões pelos códigos ("MDM:items:read:tenant" -> linha)
    pub async fn find_permissions_by_codes<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        codes: &[String],
    ) -> Result<Vec<Permission>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions
             WHERE code = ANY($2) AND (tenant_id = $1 OR tenant_id IS NULL) AND deleted_at IS NULL"
        );
        let permissions = sqlx::query_as::<_, Permission>(&sql)
            .bind(tenant_id)
            .bind(codes)
            .fetch_all(executor)
            .await?;
        Ok(permissions)
    }

    // ---
    // Cargos
    // ---

    #[allow(clippy::too_many_arguments)]
    pub async fn create_role<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        code: &str,
        name: &str,
        description: Option<&str>,
        parent_role_id: Option<Uuid>,
        level: i32,
    ) -> Result<Role, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO roles (tenant_id, code, name, description, parent_role_id, level)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ROLE_COLUMNS}"
        );
        sqlx::query_as::<_, Role>(&sql)
            .bind(tenant_id)
            .bind(code)
            .bind(name)
            .bind(description)
            .bind(parent_role_id)
            .bind(level)
            .fetch_one(executor)
            .await
            .map_err(conflict_on_unique("Role", code))
    }

    /// Cargo de sistema (bootstrap): idempotente pelo código.
    pub async fn upsert_system_role<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        code: &str,
        name: &str,
    ) -> Result<Role, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO roles (tenant_id, code, name, level, is_system_role)
             VALUES ($1, $2, $3, 1, true)
             ON CONFLICT (tenant_id, code) WHERE deleted_at IS NULL
             DO UPDATE SET updated_at = NOW()
             RETURNING {ROLE_COLUMNS}"
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(tenant_id)
            .bind(code)
            .bind(name)
            .fetch_one(executor)
            .await?;
        Ok(role)
    }

    pub async fn find_role<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Role>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL"
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;
        Ok(role)
    }

    // Trava o cargo durante a checagem de "usuários atribuídos" + exclusão
    pub async fn find_role_for_update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Role>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles
             WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL
             FOR UPDATE"
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;
        Ok(role)
    }

    pub async fn find_roles_by_codes<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        codes: &[String],
    ) -> Result<Vec<Role>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles
             WHERE tenant_id = $1 AND code = ANY($2) AND deleted_at IS NULL"
        );
        let roles = sqlx::query_as::<_, Role>(&sql)
            .bind(tenant_id)
            .bind(codes)
            .fetch_all(executor)
            .await?;
        Ok(roles)
    }

    pub async fn list_roles(
        &self,
        conn: &mut sqlx::PgConnection,
        tenant_id: Uuid,
        query: &PaginationQuery,
    ) -> Result<(Vec<Role>, i64), AppError> {
        let filter = r#"
            tenant_id = $1 AND deleted_at IS NULL
            AND ($2::text IS NULL OR code ILIKE $2 OR name ILIKE $2)
        "#;
        let search = query.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM roles WHERE {filter}"))
            .bind(tenant_id)
            .bind(search.as_deref())
            .fetch_one(&mut *conn)
            .await?;

        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE {filter}
             ORDER BY level, code LIMIT $3 OFFSET $4"
        );
        let data = sqlx::query_as::<_, Role>(&sql)
            .bind(tenant_id)
            .bind(search.as_deref())
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&mut *conn)
            .await?;

        Ok((data, total))
    }

    pub async fn update_role<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Role, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE roles SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {ROLE_COLUMNS}"
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .bind(name)
            .bind(description)
            .bind(is_active)
            .fetch_one(executor)
            .await?;
        Ok(role)
    }

    pub async fn soft_delete_role<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE roles SET deleted_at = NOW(), is_active = false WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn count_role_users<'e, E>(&self, executor: E, role_id: Uuid) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM user_roles ur
            JOIN users u ON u.id = ur.user_id
            WHERE ur.role_id = $1 AND u.deleted_at IS NULL
            "#,
        )
            .bind(role_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    pub async fn role_permission_codes<'e, E>(&self, executor: E, role_id: Uuid) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let codes: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT p.code FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1 AND p.deleted_at IS NULL
            ORDER BY p.code
            "#,
        )
            .bind(role_id)
            .fetch_all(executor)
            .await?;
        Ok(codes)
    }

    // Substitui o conjunto. Chamar dentro de uma transação.
    pub async fn replace_role_permissions(
        &self,
        conn: &mut sqlx::PgConnection,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *conn)
            .await?;

        // Inserção em massa usando UNNEST
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
            .bind(role_id)
            .bind(permission_ids)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // ---
    // Atribuições ao usuário
    // ---

    pub async fn replace_user_roles(
        &self,
        conn: &mut sqlx::PgConnection,
        user_id: Uuid,
        role_ids: &[Uuid],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
            .bind(user_id)
            .bind(role_ids)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn replace_user_permissions(
        &self,
        conn: &mut sqlx::PgConnection,
        user_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_permissions (user_id, permission_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
            .bind(user_id)
            .bind(permission_ids)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn user_role_codes<'e, E>(&self, executor: E, user_id: Uuid) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let codes: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.code FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1 AND r.is_active = true AND r.deleted_at IS NULL
            ORDER BY r.code
            "#,
        )
            .bind(user_id)
            .fetch_all(executor)
            .await?;
        Ok(codes)
    }

    /// União (sem repetição) das permissões vindas dos cargos e das atribuídas diretamente.
    /// A hierarquia de cargos não é percorrida.
    pub async fn effective_permission_codes<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let codes: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT p.code
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            JOIN role_permissions rp ON rp.role_id = r.id
            JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1
              AND r.is_active = true AND r.deleted_at IS NULL
              AND p.is_active = true AND p.deleted_at IS NULL
            UNION
            SELECT p.code
            FROM user_permissions up
            JOIN permissions p ON p.id = up.permission_id
            WHERE up.user_id = $1
              AND p.is_active = true AND p.deleted_at IS NULL
            ORDER BY 1
            "#,
        )
            .bind(user_id)
            .fetch_all(executor)
            .await?;
        Ok(codes)
    }
}

// Fonte de permissões usada pelo guardião das rotas e pelo motor de workflow.
// Sem cache: cada verificação lê o estado atual do banco.
#[async_trait]
impl PermissionSource for RbacRepository {
    async fn load_grants(&self, user_id: Uuid) -> Result<Grants, AppError> {
        let codes = self.effective_permission_codes(&self.pool, user_id).await?;
        let roles = self.user_role_codes(&self.pool, user_id).await?;
        Ok(Grants {
            permissions: PermissionSet::from_codes(codes),
            roles: roles.into_iter().collect(),
        })
    }
}
