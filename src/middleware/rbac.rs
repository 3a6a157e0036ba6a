// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    services::{
        permission::{enforce, Grants},
        permission_catalog::SystemPermission,
    },
};

/// 1. O Trait que define a exigência de uma rota
pub trait PermissionRequirement: Send + Sync + 'static {
    const REQUIRED: &'static [&'static str];
}

/// 2. O Extractor (Guardião). Carrega as permissões já resolvidas do usuário,
/// para o handler reaproveitar (ex.: checagens por transição).
pub struct RequirePermission<T> {
    pub grants: Grants,
    _requirement: PhantomData<T>,
}

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionRequirement,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_parts(parts);

        // A. Extrai Usuário (ausente = não autenticado)
        let user_id = parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.id);

        // B. Recalcula as permissões efetivas e confere a exigência
        let grants = enforce(&app_state.rbac_repo, user_id, Some(T::REQUIRED))
            .await
            .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?
            .unwrap_or_default();

        Ok(RequirePermission { grants, _requirement: PhantomData })
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

// Cada tipo vira também uma permissão de sistema no catálogo.
macro_rules! permission_requirements {
    ($($name:ident => $code:literal, $label:literal;)*) => {
        $(
            pub struct $name;

            impl PermissionRequirement for $name {
                const REQUIRED: &'static [&'static str] = &[$code];
            }

            inventory::submit! { SystemPermission { code: $code, name: $label } }
        )*
    };
}

permission_requirements! {
    PermUsersCreate => "ADM:users:create:tenant", "Criar usuários";
    PermUsersUpdate => "ADM:users:update:tenant", "Alterar usuários";
    PermUsersRead => "ADM:users:read:tenant", "Consultar usuários";
    PermUsersDelete => "ADM:users:delete:tenant", "Excluir usuários";
    PermRolesRead => "ADM:roles:read:tenant", "Consultar cargos";
    PermRolesManage => "ADM:roles:manage:tenant", "Gerenciar cargos";
    PermPermissionsRead => "ADM:permissions:read:tenant", "Consultar permissões";
    PermPermissionsManage => "ADM:permissions:manage:tenant", "Gerenciar permissões";
    PermStatusRead => "MDM:status:read:tenant", "Consultar status";
    PermStatusCreate => "MDM:status:create:tenant", "Criar status";
    PermStatusUpdate => "MDM:status:update:tenant", "Alterar status";
    PermStatusDelete => "MDM:status:delete:tenant", "Excluir status";
    PermItemsRead => "MDM:items:read:tenant", "Consultar itens";
    PermItemsCreate => "MDM:items:create:tenant", "Criar itens";
    PermItemsUpdate => "MDM:items:update:tenant", "Alterar itens";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::permission::PermissionSet;

    #[test]
    fn requirements_are_single_well_formed_codes() {
        assert_eq!(PermStatusRead::REQUIRED, &["MDM:status:read:tenant"]);
        assert_eq!(PermRolesManage::REQUIRED.len(), 1);
    }

    #[test]
    fn module_wildcard_satisfies_module_guards_only() {
        let mdm = PermissionSet::from_codes(["MDM:*:*:*"]);
        assert!(mdm.authorize(PermStatusCreate::REQUIRED));
        assert!(mdm.authorize(PermItemsRead::REQUIRED));
        assert!(!mdm.authorize(PermUsersCreate::REQUIRED));
    }

    #[test]
    fn admin_wildcard_passes_every_guard() {
        let admin = PermissionSet::from_codes(["ADM:*:*:*"]);
        assert!(admin.authorize(PermRolesManage::REQUIRED));
        assert!(admin.authorize(PermItemsUpdate::REQUIRED));
    }

    #[test]
    fn read_grants_do_not_open_management_guards() {
        let auditor = PermissionSet::from_codes(["ADM:roles:read:tenant", "ADM:permissions:read:tenant"]);
        assert!(auditor.authorize(PermRolesRead::REQUIRED));
        assert!(auditor.authorize(PermPermissionsRead::REQUIRED));
        assert!(!auditor.authorize(PermRolesManage::REQUIRED));
        assert!(!auditor.authorize(PermPermissionsManage::REQUIRED));

        // quem altera usuários não exclui
        let editor = PermissionSet::from_codes(["ADM:users:update:tenant"]);
        assert!(!editor.authorize(PermUsersDelete::REQUIRED));
    }
}
