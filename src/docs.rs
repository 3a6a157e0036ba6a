// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::common;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::register,
        handlers::auth::refresh,
        handlers::auth::get_me,

        // --- Users ---
        handlers::users::create_user,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::users::change_password,
        handlers::users::get_effective_permissions,
        handlers::users::assign_roles,
        handlers::users::assign_permissions,

        // --- RBAC ---
        handlers::rbac::create_permission,
        handlers::rbac::list_permissions,
        handlers::rbac::list_permissions_by_module,
        handlers::rbac::get_permission,
        handlers::rbac::update_permission,
        handlers::rbac::delete_permission,
        handlers::rbac::create_role,
        handlers::rbac::list_roles,
        handlers::rbac::get_role,
        handlers::rbac::update_role,
        handlers::rbac::delete_role,
        handlers::rbac::assign_role_permissions,

        // --- Status ---
        handlers::status::create_group,
        handlers::status::list_groups,
        handlers::status::get_group,
        handlers::status::update_group,
        handlers::status::delete_group,
        handlers::status::create_status,
        handlers::status::list_statuses,
        handlers::status::update_status,
        handlers::status::delete_status,
        handlers::status::next_transitions,
        handlers::status::create_transition,
        handlers::status::list_transitions,
        handlers::status::update_transition,
        handlers::status::delete_transition,
        handlers::status::apply_transition,

        // --- Catalog ---
        handlers::catalog::list_unit_categories,
        handlers::catalog::list_units,
        handlers::catalog::create_item,
        handlers::catalog::get_item,
        handlers::catalog::add_conversion,
        handlers::catalog::list_conversions,
        handlers::catalog::set_default_conversion,
        handlers::catalog::remove_conversion,
        handlers::catalog::convert_quantity,
        handlers::catalog::stock_in_all_units,
    ),
    components(
        schemas(
            common::pagination::PageMeta,

            // --- Auth ---
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::RefreshTokenPayload,
            models::auth::AuthResponse,
            models::auth::MeResponse,
            models::auth::CreateUserPayload,
            models::auth::AssignRolesPayload,
            models::auth::RegisterUserPayload,
            models::auth::UpdateUserPayload,
            models::auth::ChangePasswordPayload,

            // --- RBAC ---
            models::rbac::Permission,
            models::rbac::Role,
            models::rbac::CreatePermissionPayload,
            models::rbac::UpdatePermissionPayload,
            models::rbac::CreateRolePayload,
            models::rbac::UpdateRolePayload,
            models::rbac::AssignPermissionsPayload,
            models::rbac::RoleResponse,

            // --- Status ---
            models::status::StatusType,
            models::status::StatusGroup,
            models::status::Status,
            models::status::StatusTransition,
            models::status::StatusGroupDetail,
            models::status::CreateStatusGroupPayload,
            models::status::UpdateStatusGroupPayload,
            models::status::CreateStatusPayload,
            models::status::UpdateStatusPayload,
            models::status::CreateTransitionPayload,
            models::status::UpdateTransitionPayload,
            models::status::ApplyTransitionPayload,
            models::status::AutoAction,
            models::status::TransitionOutcome,

            // --- Catalog ---
            models::catalog::UnitPurpose,
            models::catalog::ItemType,
            models::catalog::UnitCategory,
            models::catalog::UnitOfMeasure,
            models::catalog::Item,
            models::catalog::ItemUnitConversion,
            models::catalog::CreateItemPayload,
            models::catalog::AddUnitConversionPayload,
            models::catalog::ConvertQuantityPayload,
            models::catalog::ConversionResult,
            models::catalog::StockInUnit,
            models::catalog::StockInAllUnits,
        )
    ),
    tags(
        (name = "Auth", description = "Login, refresh e usuário logado"),
        (name = "Users", description = "Usuários do tenant, cargos e permissões diretas"),
        (name = "RBAC", description = "Controle de Acesso (Cargos e Permissões)"),
        (name = "Status", description = "Grupos de status, transições e workflow"),
        (name = "Catalog", description = "Unidades de medida, itens e conversões")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_group_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/login",
            "/api/rbac/roles/{id}/permissions",
            "/api/status/groups/{code}/transitions/apply",
            "/api/catalog/items/{id}/stock",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        assert!(doc.components.unwrap().security_schemes.contains_key("api_jwt"));
    }
}
