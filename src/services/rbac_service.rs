// src/services/rbac_service.rs

use sqlx::{Acquire, PgConnection};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::common::pagination::{Paginated, PaginationQuery};
use crate::db::RbacRepository;
use crate::models::rbac::{
    CreatePermissionPayload, CreateRolePayload, Permission, Role, RoleResponse,
    UpdatePermissionPayload, UpdateRolePayload,
};
use crate::services::permission::PermissionCode;

const DEFAULT_SCOPE: &str = "TENANT";

#[derive(Clone)]
pub struct RbacService {
    repo: RbacRepository,
}

impl RbacService {
    pub fn new(repo: RbacRepository) -> Self {
        Self { repo }
    }

    // ---
    // Permissões
    // ---

    pub async fn create_permission(
        &self,
        executor: &mut PgConnection,
        tenant_id: Uuid,
        payload: CreatePermissionPayload,
    ) -> Result<Permission, AppError> {
        // A gramática do código é a mesma que o avaliador usa
        let code: PermissionCode = payload.code.parse()?;
        let mut conn = executor.acquire().await?;

        // Checagem amigável; o índice único é quem garante
        if self.repo.find_permission_by_code(&mut *conn, &payload.code).await?.is_some() {
            return Err(AppError::already_exists("Permission", &payload.code));
        }

        let permission = self
            .repo
            .create_permission(
                &mut *conn,
                tenant_id,
                &code.to_string(),
                &payload.name,
                payload.description.as_deref(),
                &payload.module,
                &payload.resource,
                &payload.action,
                payload.scope.as_deref().unwrap_or(DEFAULT_SCOPE),
            )
            .await?;

        tracing::info!(code = %permission.code, "permissão criada");
        Ok(permission)
    }

    pub async fn list_permissions(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        query: &PaginationQuery,
    ) -> Result<Paginated<Permission>, AppError> {
        let (data, total) = self.repo.list_permissions(conn, tenant_id, query).await?;
        Ok(Paginated::new(data, total, query))
    }

    pub async fn list_permissions_by_module(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        module: &str,
    ) -> Result<Vec<Permission>, AppError> {
        self.repo.list_permissions_by_module(conn, tenant_id, module).await
    }

    pub async fn get_permission(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Permission, AppError> {
        self.repo
            .find_permission(conn, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Permission", id))
    }

    pub async fn update_permission(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
        payload: UpdatePermissionPayload,
    ) -> Result<Permission, AppError> {
        let mut tx = conn.begin().await?;
        let current = self.get_permission(&mut tx, tenant_id, id).await?;
        if current.is_system_permission {
            return Err(AppError::SystemResourceImmutable("Permission"));
        }

        let updated = self
            .repo
            .update_permission(
                &mut *tx,
                id,
                payload.name.as_deref(),
                payload.description.as_deref(),
                payload.is_active,
            )
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete_permission(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = conn.begin().await?;
        let current = self.get_permission(&mut tx, tenant_id, id).await?;
        if current.is_system_permission {
            return Err(AppError::SystemResourceImmutable("Permission"));
        }
        self.repo.soft_delete_permission(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(code = %current.code, "permissão removida");
        Ok(())
    }

    /// Códigos -> ids. Qualquer código desconhecido aborta com NotFound.
    pub(crate) async fn resolve_permission_ids(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        codes: &[String],
    ) -> Result<Vec<Uuid>, AppError> {
        let found = self.repo.find_permissions_by_codes(conn, tenant_id, codes).await?;
        if let Some(unknown) = codes.iter().find(|c| !found.iter().any(|p| &p.code == *c)) {
            return Err(AppError::not_found("Permission", unknown));
        }
        Ok(found.into_iter().map(|p| p.id).collect())
    }

    // ---
    // Cargos
    // ---

    pub async fn create_role(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        payload: CreateRolePayload,
    ) -> Result<RoleResponse, AppError> {
        // 1. Inicia Transação
        let mut tx = conn.begin().await?;

        // 2. Nível herdado do pai (a hierarquia é só informativa)
        let level = match payload.parent_role_id {
            Some(parent_id) => {
                let parent = self
                    .repo
                    .find_role(&mut *tx, tenant_id, parent_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Role", parent_id))?;
                parent.level + 1
            }
            None => 1,
        };

        // 3. Cria o Cargo
        let role = self
            .repo
            .create_role(
                &mut *tx,
                tenant_id,
                &payload.code,
                &payload.name,
                payload.description.as_deref(),
                payload.parent_role_id,
                level,
            )
            .await?;

        // 4. Resolve códigos para IDs e salva o vínculo
        let ids = self.resolve_permission_ids(&mut tx, tenant_id, &payload.permissions).await?;
        if !ids.is_empty() {
            self.repo.replace_role_permissions(&mut tx, role.id, &ids).await?;
        }
        let permissions = self.repo.role_permission_codes(&mut *tx, role.id).await?;

        // 5. Commit
        tx.commit().await?;

        tracing::info!(role = %role.code, level, "cargo criado");
        Ok(RoleResponse { role, permissions })
    }

    pub async fn list_roles(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        query: &PaginationQuery,
    ) -> Result<Paginated<Role>, AppError> {
        let (data, total) = self.repo.list_roles(conn, tenant_id, query).await?;
        Ok(Paginated::new(data, total, query))
    }

    pub async fn get_role(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<RoleResponse, AppError> {
        let role = self
            .repo
            .find_role(&mut *conn, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Role", id))?;
        let permissions = self.repo.role_permission_codes(&mut *conn, role.id).await?;
        Ok(RoleResponse { role, permissions })
    }

    pub async fn update_role(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
        payload: UpdateRolePayload,
    ) -> Result<RoleResponse, AppError> {
        let mut tx = conn.begin().await?;
        let current = self
            .repo
            .find_role(&mut *tx, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Role", id))?;
        if current.is_system_role {
            return Err(AppError::SystemResourceImmutable("Role"));
        }

        let role = self
            .repo
            .update_role(&mut *tx, id, payload.name.as_deref(), payload.description.as_deref(), payload.is_active)
            .await?;
        let permissions = self.repo.role_permission_codes(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(RoleResponse { role, permissions })
    }

    pub async fn delete_role(&self, conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let mut tx = conn.begin().await?;

        // Linha travada: ninguém atribui o cargo entre a contagem e a exclusão
        let role = self
            .repo
            .find_role_for_update(&mut *tx, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Role", id))?;
        if role.is_system_role {
            return Err(AppError::SystemResourceImmutable("Role"));
        }
        if self.repo.count_role_users(&mut *tx, id).await? > 0 {
            return Err(AppError::RoleHasAssignedUsers(role.code));
        }

        self.repo.soft_delete_role(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(role = %role.code, "cargo removido");
        Ok(())
    }

    /// Substitui o conjunto de permissões do cargo.
    pub async fn assign_permissions(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        role_id: Uuid,
        codes: Vec<String>,
    ) -> Result<RoleResponse, AppError> {
        let mut tx = conn.begin().await?;
        let role = self
            .repo
            .find_role_for_update(&mut *tx, tenant_id, role_id)
            .await?
            .ok_or_else(|| AppError::not_found("Role", role_id))?;
        if role.is_system_role {
            return Err(AppError::SystemResourceImmutable("Role"));
        }

        let ids = self.resolve_permission_ids(&mut tx, tenant_id, &codes).await?;
        self.repo.replace_role_permissions(&mut tx, role.id, &ids).await?;
        let permissions = self.repo.role_permission_codes(&mut *tx, role.id).await?;
        tx.commit().await?;

        tracing::info!(role = %role.code, count = permissions.len(), "permissões do cargo atualizadas");
        Ok(RoleResponse { role, permissions })
    }
}
