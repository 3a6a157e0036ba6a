// src/services/permission_catalog.rs
//
// Permissões do sistema declaradas junto das guardas de rota (ver `middleware::rbac`).
// Na inicialização o catálogo é gravado na tabela `permissions` como permissões de sistema.

use std::collections::BTreeMap;

use sqlx::PgPool;

use crate::common::error::AppError;
use crate::db::RbacRepository;
use crate::services::permission::PermissionCode;

#[derive(Debug)]
pub struct SystemPermission {
    pub code: &'static str,
    pub name: &'static str,
}

inventory::collect!(SystemPermission);

// Permissões-curinga usadas pelos cargos administrativos semeados
inventory::submit! { SystemPermission { code: "ADM:*:*:*", name: "Administrator" } }
inventory::submit! { SystemPermission { code: "*:*:*:*", name: "Super Administrator" } }

/// Catálogo ordenado por código, sem repetição.
pub fn system_permissions() -> Vec<&'static SystemPermission> {
    let mut by_code: BTreeMap<&'static str, &'static SystemPermission> = BTreeMap::new();
    for perm in inventory::iter::<SystemPermission> {
        by_code.entry(perm.code).or_insert(perm);
    }
    by_code.into_values().collect()
}

pub async fn sync_system_permissions(pool: &PgPool, repo: &RbacRepository) -> Result<usize, AppError> {
    let catalog = system_permissions();

    let mut tx = pool.begin().await?;
    for perm in &catalog {
        let code: PermissionCode = perm.code.parse()?;
        repo.upsert_system_permission(&mut *tx, &code, perm.name).await?;
    }
    tx.commit().await?;

    tracing::info!("🔐 {} permissões de sistema sincronizadas", catalog.len());
    Ok(catalog.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_codes_are_well_formed_and_unique() {
        let catalog = system_permissions();
        assert!(catalog.len() > 2);
        for perm in &catalog {
            assert!(perm.code.parse::<PermissionCode>().is_ok(), "{}", perm.code);
        }
        let mut codes: Vec<_> = catalog.iter().map(|p| p.code).collect();
        codes.dedup();
        assert_eq!(codes.len(), catalog.len());
    }

    #[test]
    fn guards_register_their_permissions() {
        let codes: Vec<_> = system_permissions().iter().map(|p| p.code).collect();
        assert!(codes.contains(&"MDM:status:read:tenant"));
        assert!(codes.contains(&"ADM:roles:manage:tenant"));
        assert!(codes.contains(&"ADM:roles:read:tenant"));
        assert!(codes.contains(&"ADM:permissions:read:tenant"));
        assert!(codes.contains(&"ADM:users:delete:tenant"));
        assert!(codes.contains(&"MDM:items:read:tenant"));
    }
}
