// src/services/user_service.rs

use sqlx::{Connection, PgConnection};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::common::pagination::{Paginated, PaginationQuery};
use crate::db::{RbacRepository, UserRepository};
use crate::models::auth::{ChangePasswordPayload, CreateUserPayload, MeResponse, UpdateUserPayload, User};
use crate::services::auth::{hash_password, verify_password};
use crate::services::rbac_service::RbacService;

#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    rbac_repo: RbacRepository,
    rbac_service: RbacService,
}

impl UserService {
    pub fn new(user_repo: UserRepository, rbac_repo: RbacRepository, rbac_service: RbacService) -> Self {
        Self { user_repo, rbac_repo, rbac_service }
    }

    pub async fn create_user(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        payload: CreateUserPayload,
    ) -> Result<User, AppError> {
        // Hash fora da transação: não toca no banco
        let password_hash = hash_password(&payload.password).await?;

        let user = self
            .user_repo
            .create_user(
                conn,
                tenant_id,
                &payload.email,
                &password_hash,
                &payload.first_name,
                &payload.last_name,
            )
            .await?;

        tracing::info!(user_id = %user.id, "usuário criado");
        Ok(user)
    }

    async fn find(&self, conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<User, AppError> {
        self.user_repo
            .find_in_tenant(conn, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    /// Usuário com cargos e permissões efetivas.
    pub async fn get_user(&self, conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<MeResponse, AppError> {
        let user = self.find(&mut *conn, tenant_id, id).await?;
        let roles = self.rbac_repo.user_role_codes(&mut *conn, id).await?;
        let permissions = self.rbac_repo.effective_permission_codes(&mut *conn, id).await?;
        Ok(MeResponse { full_name: user.full_name(), user, roles, permissions })
    }

    pub async fn list_users(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        query: &PaginationQuery,
    ) -> Result<Paginated<User>, AppError> {
        let (data, total) = self.user_repo.list_users(conn, tenant_id, query).await?;
        Ok(Paginated::new(data, total, query))
    }

    pub async fn update_user(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
        payload: UpdateUserPayload,
    ) -> Result<User, AppError> {
        let mut tx = conn.begin().await?;
        self.find(&mut tx, tenant_id, id).await?;
        let user = self.user_repo.update_user(&mut *tx, id, &payload).await?;
        // desativado não renova token
        if payload.is_active == Some(false) {
            self.user_repo.invalidate_sessions(&mut *tx, id).await?;
        }
        tx.commit().await?;

        tracing::info!(user_id = %id, "usuário atualizado");
        Ok(user)
    }

    /// Exclusão lógica; as sessões abertas deixam de valer.
    pub async fn delete_user(&self, conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let mut tx = conn.begin().await?;
        self.find(&mut tx, tenant_id, id).await?;
        self.user_repo.soft_delete_user(&mut *tx, id).await?;
        self.user_repo.invalidate_sessions(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %id, "usuário excluído");
        Ok(())
    }

    /// Troca de senha conferindo a atual.
    pub async fn change_password(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
        payload: ChangePasswordPayload,
    ) -> Result<(), AppError> {
        let user = self.find(&mut *conn, tenant_id, id).await?;
        if !verify_password(&payload.current_password, &user.password_hash).await? {
            return Err(AppError::CurrentPasswordIncorrect);
        }

        let password_hash = hash_password(&payload.new_password).await?;
        let mut tx = conn.begin().await?;
        self.user_repo.update_password(&mut *tx, id, &password_hash).await?;
        self.user_repo.invalidate_sessions(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %id, "senha alterada");
        Ok(())
    }

    pub async fn effective_permissions(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Vec<String>, AppError> {
        self.find(&mut *conn, tenant_id, id).await?;
        self.rbac_repo.effective_permission_codes(&mut *conn, id).await
    }

    /// Substitui os cargos do usuário (por código de cargo).
    pub async fn assign_roles(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        user_id: Uuid,
        role_codes: Vec<String>,
    ) -> Result<MeResponse, AppError> {
        let mut tx = conn.begin().await?;
        self.find(&mut tx, tenant_id, user_id).await?;

        let roles = self.rbac_repo.find_roles_by_codes(&mut *tx, tenant_id, &role_codes).await?;
        if let Some(unknown) = role_codes.iter().find(|c| !roles.iter().any(|r| &r.code == *c)) {
            return Err(AppError::not_found("Role", unknown));
        }
        let ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        self.rbac_repo.replace_user_roles(&mut tx, user_id, &ids).await?;
        tx.commit().await?;

        tracing::info!(%user_id, roles = ?role_codes, "cargos do usuário atualizados");
        self.get_user(conn, tenant_id, user_id).await
    }

    /// Substitui as permissões atribuídas diretamente (por código).
    pub async fn assign_permissions(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        user_id: Uuid,
        codes: Vec<String>,
    ) -> Result<MeResponse, AppError> {
        let mut tx = conn.begin().await?;
        self.find(&mut tx, tenant_id, user_id).await?;

        let ids = self.rbac_service.resolve_permission_ids(&mut tx, tenant_id, &codes).await?;
        self.rbac_repo.replace_user_permissions(&mut tx, user_id, &ids).await?;
        tx.commit().await?;

        tracing::info!(%user_id, count = ids.len(), "permissões diretas atualizadas");
        self.get_user(conn, tenant_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::db_utils::test_db::{self, unique_code};
    use sqlx::postgres::PgPoolOptions;

    // Os repositórios guardam um pool, mas aqui tudo passa pela transação do teste
    fn service() -> UserService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let rbac_repo = RbacRepository::new(pool.clone());
        let rbac_service = RbacService::new(rbac_repo.clone());
        UserService::new(UserRepository::new(pool), rbac_repo, rbac_service)
    }

    async fn create(svc: &UserService, conn: &mut PgConnection, tenant: Uuid, first_name: &str) -> User {
        svc.create_user(
            conn,
            tenant,
            CreateUserPayload {
                email: format!("{}@example.com", unique_code("u").to_lowercase()),
                password: "senha-inicial".into(),
                first_name: first_name.into(),
                last_name: "Teste".into(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn change_password_checks_the_current_one() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let svc = service();
        let tenant = test_db::tenant(&mut tx).await;
        let user = create(&svc, &mut tx, tenant, "Ana").await;

        let wrong = ChangePasswordPayload {
            current_password: "nao-e-essa".into(),
            new_password: "senha-nova-123".into(),
        };
        assert!(matches!(
            svc.change_password(&mut tx, tenant, user.id, wrong).await,
            Err(AppError::CurrentPasswordIncorrect)
        ));

        let right = ChangePasswordPayload {
            current_password: "senha-inicial".into(),
            new_password: "senha-nova-123".into(),
        };
        svc.change_password(&mut tx, tenant, user.id, right).await.unwrap();

        let stored = svc.find(&mut tx, tenant, user.id).await.unwrap();
        assert!(verify_password("senha-nova-123", &stored.password_hash).await.unwrap());
        assert!(!verify_password("senha-inicial", &stored.password_hash).await.unwrap());
    }

    #[tokio::test]
    async fn deleted_user_is_gone_and_frees_the_email() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let svc = service();
        let tenant = test_db::tenant(&mut tx).await;
        let user = create(&svc, &mut tx, tenant, "Bruno").await;

        svc.delete_user(&mut tx, tenant, user.id).await.unwrap();

        assert!(matches!(
            svc.get_user(&mut tx, tenant, user.id).await,
            Err(AppError::NotFound { resource: "User", .. })
        ));
        assert!(matches!(
            svc.delete_user(&mut tx, tenant, user.id).await,
            Err(AppError::NotFound { .. })
        ));

        let again = CreateUserPayload {
            email: user.email.clone(),
            password: "outra-senha".into(),
            first_name: "Bruno".into(),
            last_name: "Novo".into(),
        };
        let recreated = svc.create_user(&mut tx, tenant, again).await.unwrap();
        assert_ne!(recreated.id, user.id);
    }

    #[tokio::test]
    async fn list_searches_names_and_update_keeps_missing_fields() {
        let Some(mut tx) = test_db::transaction().await else { return };
        let svc = service();
        let tenant = test_db::tenant(&mut tx).await;
        let carla = create(&svc, &mut tx, tenant, "Carla").await;
        create(&svc, &mut tx, tenant, "Daniel").await;

        let query = PaginationQuery { search: Some("carl".into()), ..Default::default() };
        let page = svc.list_users(&mut tx, tenant, &query).await.unwrap();
        assert_eq!(page.meta.total, 1);
        assert_eq!(page.data[0].id, carla.id);

        let all = svc.list_users(&mut tx, tenant, &PaginationQuery::default()).await.unwrap();
        assert_eq!(all.meta.total, 2);

        let payload = UpdateUserPayload { is_active: Some(false), ..Default::default() };
        let updated = svc.update_user(&mut tx, tenant, carla.id, payload).await.unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.first_name, "Carla");

        // outro tenant não enxerga o usuário
        let other = test_db::tenant(&mut tx).await;
        assert!(matches!(
            svc.update_user(&mut tx, other, carla.id, UpdateUserPayload::default()).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
