// src/services/bootstrap.rs
//
// Semeia o primeiro tenant com um cargo SUPER_ADMIN (`*:*:*:*`) e o usuário
// administrador. Idempotente: rodar de novo não duplica nada.

use sqlx::PgPool;

use crate::common::error::AppError;
use crate::config::BootstrapConfig;
use crate::db::{RbacRepository, TenantRepository, UserRepository};
use crate::services::auth::hash_password;

pub const SUPER_ADMIN_ROLE: &str = "SUPER_ADMIN";
const SUPER_ADMIN_PERMISSION: &str = "*:*:*:*";

pub async fn bootstrap_admin(pool: &PgPool, cfg: &BootstrapConfig) -> Result<(), AppError> {
    let tenant_repo = TenantRepository::new(pool.clone());
    let user_repo = UserRepository::new(pool.clone());
    let rbac_repo = RbacRepository::new(pool.clone());

    let password_hash = hash_password(&cfg.admin_password).await?;

    let mut tx = pool.begin().await?;

    let tenant = tenant_repo.upsert(&mut *tx, &cfg.tenant_code, &cfg.tenant_name).await?;
    let role = rbac_repo
        .upsert_system_role(&mut *tx, tenant.id, SUPER_ADMIN_ROLE, "Super Administrador")
        .await?;

    let codes = [SUPER_ADMIN_PERMISSION.to_string()];
    let permission_ids: Vec<_> = rbac_repo
        .find_permissions_by_codes(&mut *tx, tenant.id, &codes)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    if permission_ids.is_empty() {
        // O catálogo de sistema precisa ter sido sincronizado antes
        return Err(AppError::not_found("Permission", SUPER_ADMIN_PERMISSION));
    }
    rbac_repo.replace_role_permissions(&mut tx, role.id, &permission_ids).await?;

    // Tenant recém-criado ainda não é visível fora da transação: a busca dá None
    let existing = user_repo.find_by_email(tenant.id, &cfg.admin_email).await?;
    if existing.is_none() {
        let admin = user_repo
            .create_user(&mut *tx, tenant.id, &cfg.admin_email, &password_hash, "Admin", "")
            .await?;
        rbac_repo.replace_user_roles(&mut tx, admin.id, &[role.id]).await?;
        tracing::info!(tenant = %tenant.code, email = %admin.email, "administrador inicial criado");
    }

    tx.commit().await?;
    Ok(())
}
