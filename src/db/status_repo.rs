// src/db/status_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::common::error::{conflict_on_unique, AppError};
use crate::models::status::{
    CreateStatusGroupPayload, CreateStatusPayload, CreateTransitionPayload, Status, StatusGroup,
    StatusGroupQuery, StatusTransition, UpdateStatusGroupPayload, UpdateStatusPayload,
    UpdateTransitionPayload,
};

const GROUP_COLUMNS: &str = r#"
    id, tenant_id, code, name, description, module, entity_type, allow_custom_statuses,
    require_workflow, is_system_group, is_active, created_at, updated_at, deleted_at
"#;

const STATUS_COLUMNS: &str = r#"
    id, status_group_id, code, name, description, status_type, display_order, color, icon,
    is_default, is_editable, is_deletable, is_system_status, requires_approval,
    required_permission, is_active, created_at, updated_at, deleted_at
"#;

const TRANSITION_COLUMNS: &str = r#"
    id, status_group_id, from_status_id, to_status_id, transition_name, requires_approval,
    requires_reason, required_permission, allowed_roles, validation_rules, auto_actions,
    display_order, is_active, created_at, updated_at
"#;

// Sem pool próprio: toda consulta roda na conexão RLS da requisição
#[derive(Clone, Default)]
pub struct StatusRepository;

impl StatusRepository {
    pub fn new() -> Self {
        Self
    }

    // ---
    // Grupos
    // ---

    pub async fn create_group<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        payload: &CreateStatusGroupPayload,
    ) -> Result<StatusGroup, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO status_groups
                (tenant_id, code, name, description, module, entity_type, allow_custom_statuses, require_workflow)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {GROUP_COLUMNS}"
        );
        sqlx::query_as::<_, StatusGroup>(&sql)
            .bind(tenant_id)
            .bind(&payload.code)
            .bind(&payload.name)
            .bind(payload.description.as_deref())
            .bind(&payload.module)
            .bind(&payload.entity_type)
            .bind(payload.allow_custom_statuses)
            .bind(payload.require_workflow)
            .fetch_one(executor)
            .await
            .map_err(conflict_on_unique("StatusGroup", &payload.code))
    }

    /// Grupo visível para o tenant (do próprio tenant ou do sistema).
    pub async fn find_group_by_code<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Option<StatusGroup>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {GROUP_COLUMNS} FROM status_groups
             WHERE code = $1 AND (tenant_id = $2 OR tenant_id IS NULL) AND deleted_at IS NULL"
        );
        let group = sqlx::query_as::<_, StatusGroup>(&sql)
            .bind(code)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;
        Ok(group)
    }

    // Trava a linha do grupo: quem cria status no grupo espera por quem o está excluindo
    pub async fn lock_group<'e, E>(&self, executor: E, group_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("SELECT id FROM status_groups WHERE id = $1 FOR UPDATE")
            .bind(group_id)
            .fetch_optional(executor)
            .await?;
        Ok(())
    }

    pub async fn code_taken<'e, E>(&self, executor: E, code: &str) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM status_groups WHERE code = $1 AND deleted_at IS NULL)",
        )
            .bind(code)
            .fetch_one(executor)
            .await?;
        Ok(exists)
    }

    pub async fn list_groups(
        &self,
        conn: &mut sqlx::PgConnection,
        tenant_id: Uuid,
        query: &StatusGroupQuery,
    ) -> Result<(Vec<StatusGroup>, i64), AppError> {
        let filter = r#"
            (tenant_id = $1 OR tenant_id IS NULL) AND deleted_at IS NULL
            AND ($2::text IS NULL OR module = $2)
            AND ($3::text IS NULL OR entity_type = $3)
            AND ($4::text IS NULL OR code ILIKE $4 OR name ILIKE $4)
        "#;
        let page = query.pagination();
        let search = page.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM status_groups WHERE {filter}"))
            .bind(tenant_id)
            .bind(query.module.as_deref())
            .bind(query.entity_type.as_deref())
            .bind(search.as_deref())
            .fetch_one(&mut *conn)
            .await?;

        let sql = format!(
            "SELECT {GROUP_COLUMNS} FROM status_groups WHERE {filter}
             ORDER BY module, code LIMIT $5 OFFSET $6"
        );
        let data = sqlx::query_as::<_, StatusGroup>(&sql)
            .bind(tenant_id)
            .bind(query.module.as_deref())
            .bind(query.entity_type.as_deref())
            .bind(search.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *conn)
            .await?;

        Ok((data, total))
    }

    pub async fn update_group<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateStatusGroupPayload,
    ) -> Result<StatusGroup, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE status_groups SET
                code = COALESCE($2, code),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                allow_custom_statuses = COALESCE($5, allow_custom_statuses),
                require_workflow = COALESCE($6, require_workflow),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {GROUP_COLUMNS}"
        );
        let code = payload.code.as_deref().unwrap_or_default();
        sqlx::query_as::<_, StatusGroup>(&sql)
            .bind(id)
            .bind(payload.code.as_deref())
            .bind(payload.name.as_deref())
            .bind(payload.description.as_deref())
            .bind(payload.allow_custom_statuses)
            .bind(payload.require_workflow)
            .bind(payload.is_active)
            .fetch_one(executor)
            .await
            .map_err(conflict_on_unique("StatusGroup", code))
    }

    pub async fn soft_delete_group<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE status_groups SET deleted_at = NOW(), is_active = false WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn count_live_statuses<'e, E>(&self, executor: E, group_id: Uuid) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM statuses WHERE status_group_id = $1 AND deleted_at IS NULL",
        )
            .bind(group_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    // ---
    // Status
    // ---

    pub async fn create_status<'e, E>(
        &self,
        executor: E,
        group_id: Uuid,
        payload: &CreateStatusPayload,
    ) -> Result<Status, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO statuses
                (status_group_id, code, name, description, status_type, display_order, color, icon,
                 is_default, is_editable, is_deletable, requires_approval, required_permission)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {STATUS_COLUMNS}"
        );
        sqlx::query_as::<_, Status>(&sql)
            .bind(group_id)
            .bind(&payload.code)
            .bind(&payload.name)
            .bind(payload.description.as_deref())
            .bind(payload.status_type)
            .bind(payload.display_order)
            .bind(payload.color.as_deref())
            .bind(payload.icon.as_deref())
            .bind(payload.is_default)
            .bind(payload.is_editable)
            .bind(payload.is_deletable)
            .bind(payload.requires_approval)
            .bind(payload.required_permission.as_deref())
            .fetch_one(executor)
            .await
            .map_err(conflict_on_unique("Status", &payload.code))
    }

    pub async fn find_status<'e, E>(
        &self,
        executor: E,
        group_id: Uuid,
        code: &str,
    ) -> Result<Option<Status>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {STATUS_COLUMNS} FROM statuses
             WHERE status_group_id = $1 AND code = $2 AND deleted_at IS NULL"
        );
        let status = sqlx::query_as::<_, Status>(&sql)
            .bind(group_id)
            .bind(code)
            .fetch_optional(executor)
            .await?;
        Ok(status)
    }

    pub async fn list_statuses<'e, E>(&self, executor: E, group_id: Uuid) -> Result<Vec<Status>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {STATUS_COLUMNS} FROM statuses
             WHERE status_group_id = $1 AND deleted_at IS NULL
             ORDER BY display_order, code"
        );
        let statuses = sqlx::query_as::<_, Status>(&sql)
            .bind(group_id)
            .fetch_all(executor)
            .await?;
        Ok(statuses)
    }

    /// Remove o default atual do grupo (exceto `keep`). Mesma transação do "set".
    pub async fn clear_default_status<'e, E>(
        &self,
        executor: E,
        group_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE statuses SET is_default = false, updated_at = NOW()
            WHERE status_group_id = $1 AND is_default = true
              AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
            .bind(group_id)
            .bind(keep)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateStatusPayload,
    ) -> Result<Status, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE statuses SET
                code = COALESCE($2, code),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                status_type = COALESCE($5, status_type),
                display_order = COALESCE($6, display_order),
                color = COALESCE($7, color),
                icon = COALESCE($8, icon),
                -- status desativado deixa de ser o default do grupo
                is_default = CASE WHEN $14 = false THEN false ELSE COALESCE($9, is_default) END,
                is_editable = COALESCE($10, is_editable),
                is_deletable = COALESCE($11, is_deletable),
                requires_approval = COALESCE($12, requires_approval),
                required_permission = COALESCE($13, required_permission),
                is_active = COALESCE($14, is_active),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {STATUS_COLUMNS}"
        );
        let code = payload.code.as_deref().unwrap_or_default();
        sqlx::query_as::<_, Status>(&sql)
            .bind(id)
            .bind(payload.code.as_deref())
            .bind(payload.name.as_deref())
            .bind(payload.description.as_deref())
            .bind(payload.status_type)
            .bind(payload.display_order)
            .bind(payload.color.as_deref())
            .bind(payload.icon.as_deref())
            .bind(payload.is_default)
            .bind(payload.is_editable)
            .bind(payload.is_deletable)
            .bind(payload.requires_approval)
            .bind(payload.required_permission.as_deref())
            .bind(payload.is_active)
            .fetch_one(executor)
            .await
            .map_err(conflict_on_unique("Status", code))
    }

    pub async fn soft_delete_status<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE statuses SET deleted_at = NOW(), is_active = false, is_default = false WHERE id = $1",
        )
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // ---
    // Transições
    // ---

    pub async fn create_transition<'e, E>(
        &self,
        executor: E,
        group_id: Uuid,
        payload: &CreateTransitionPayload,
    ) -> Result<StatusTransition, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO status_transitions
                (status_group_id, from_status_id, to_status_id, transition_name, requires_approval,
                 requires_reason, required_permission, allowed_roles, validation_rules, auto_actions,
                 display_order)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {TRANSITION_COLUMNS}"
        );
        let transition = sqlx::query_as::<_, StatusTransition>(&sql)
            .bind(group_id)
            .bind(payload.from_status_id)
            .bind(payload.to_status_id)
            .bind(&payload.transition_name)
            .bind(payload.requires_approval)
            .bind(payload.requires_reason)
            .bind(payload.required_permission.as_deref())
            .bind(&payload.allowed_roles)
            .bind(payload.validation_rules.as_ref())
            .bind(payload.auto_actions.as_ref())
            .bind(payload.display_order)
            .fetch_one(executor)
            .await?;
        Ok(transition)
    }

    pub async fn find_transition<'e, E>(
        &self,
        executor: E,
        group_id: Uuid,
        id: Uuid,
    ) -> Result<Option<StatusTransition>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM status_transitions WHERE id = $1 AND status_group_id = $2"
        );
        let transition = sqlx::query_as::<_, StatusTransition>(&sql)
            .bind(id)
            .bind(group_id)
            .fetch_optional(executor)
            .await?;
        Ok(transition)
    }

    pub async fn list_transitions<'e, E>(
        &self,
        executor: E,
        group_id: Uuid,
    ) -> Result<Vec<StatusTransition>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM status_transitions
             WHERE status_group_id = $1
             ORDER BY display_order, transition_name"
        );
        let transitions = sqlx::query_as::<_, StatusTransition>(&sql)
            .bind(group_id)
            .fetch_all(executor)
            .await?;
        Ok(transitions)
    }

    pub async fn update_transition<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        from_status_id: Option<Uuid>,
        to_status_id: Uuid,
        payload: &UpdateTransitionPayload,
    ) -> Result<StatusTransition, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE status_transitions SET
                from_status_id = $2,
                to_status_id = $3,
                transition_name = COALESCE($4, transition_name),
                requires_approval = COALESCE($5, requires_approval),
                requires_reason = COALESCE($6, requires_reason),
                required_permission = COALESCE($7, required_permission),
                allowed_roles = COALESCE($8, allowed_roles),
                validation_rules = COALESCE($9, validation_rules),
                auto_actions = COALESCE($10, auto_actions),
                display_order = COALESCE($11, display_order),
                is_active = COALESCE($12, is_active),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {TRANSITION_COLUMNS}"
        );
        let transition = sqlx::query_as::<_, StatusTransition>(&sql)
            .bind(id)
            .bind(from_status_id)
            .bind(to_status_id)
            .bind(payload.transition_name.as_deref())
            .bind(payload.requires_approval)
            .bind(payload.requires_reason)
            .bind(payload.required_permission.as_deref())
            .bind(payload.allowed_roles.as_deref())
            .bind(payload.validation_rules.as_ref())
            .bind(payload.auto_actions.as_ref())
            .bind(payload.display_order)
            .bind(payload.is_active)
            .fetch_one(executor)
            .await?;
        Ok(transition)
    }

    pub async fn delete_transition<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM status_transitions WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
