// src/handlers/rbac.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::get_rls_connection,
        error::{ApiError, AppError},
        pagination::{Paginated, PaginationQuery},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{
            PermPermissionsManage, PermPermissionsRead, PermRolesManage, PermRolesRead,
            RequirePermission,
        },
        tenancy::TenantContext,
    },
    models::rbac::{
        AssignPermissionsPayload, CreatePermissionPayload, CreateRolePayload, Permission, Role,
        RoleResponse, UpdatePermissionPayload, UpdateRolePayload,
    },
};

// =============================================================================
//  1. PERMISSÕES
// =============================================================================

// POST /api/rbac/permissions
#[utoipa::path(
    post,
    path = "/api/rbac/permissions",
    tag = "RBAC",
    request_body = CreatePermissionPayload,
    responses(
        (status = 201, description = "Permissão criada", body = Permission),
        (status = 400, description = "Código fora do formato MÓDULO:recurso:ação:escopo"),
        (status = 409, description = "Código já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermPermissionsManage>,
    Json(payload): Json<CreatePermissionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let permission = app_state
        .rbac_service
        .create_permission(&mut *rls_conn, tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(permission)))
}

// GET /api/rbac/permissions
#[utoipa::path(
    get,
    path = "/api/rbac/permissions",
    tag = "RBAC",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Permissões do tenant e do sistema", body = Paginated<Permission>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermPermissionsRead>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .rbac_service
        .list_permissions(&mut *rls_conn, tenant.0, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(page))
}

// GET /api/rbac/permissions/module/{module}
#[utoipa::path(
    get,
    path = "/api/rbac/permissions/module/{module}",
    tag = "RBAC",
    responses(
        (status = 200, description = "Permissões do módulo", body = Vec<Permission>)
    ),
    params(("module" = String, Path, description = "Módulo (ex.: INVENTORY)")),
    security(("api_jwt" = []))
)]
pub async fn list_permissions_by_module(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermPermissionsRead>,
    Path(module): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let permissions = app_state
        .rbac_service
        .list_permissions_by_module(&mut *rls_conn, tenant.0, &module)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(permissions))
}

// GET /api/rbac/permissions/{id}
#[utoipa::path(
    get,
    path = "/api/rbac/permissions/{id}",
    tag = "RBAC",
    responses(
        (status = 200, description = "Permissão", body = Permission),
        (status = 404, description = "Permissão não encontrada")
    ),
    params(("id" = Uuid, Path, description = "ID da permissão")),
    security(("api_jwt" = []))
)]
pub async fn get_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermPermissionsRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let permission = app_state
        .rbac_service
        .get_permission(&mut *rls_conn, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(permission))
}

// PUT /api/rbac/permissions/{id}
#[utoipa::path(
    put,
    path = "/api/rbac/permissions/{id}",
    tag = "RBAC",
    request_body = UpdatePermissionPayload,
    responses(
        (status = 200, description = "Permissão atualizada", body = Permission),
        (status = 409, description = "Permissão de sistema não pode ser alterada")
    ),
    params(("id" = Uuid, Path, description = "ID da permissão")),
    security(("api_jwt" = []))
)]
pub async fn update_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermPermissionsManage>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePermissionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let permission = app_state
        .rbac_service
        .update_permission(&mut *rls_conn, tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(permission))
}

// DELETE /api/rbac/permissions/{id}
#[utoipa::path(
    delete,
    path = "/api/rbac/permissions/{id}",
    tag = "RBAC",
    responses(
        (status = 204, description = "Permissão removida"),
        (status = 409, description = "Permissão de sistema não pode ser removida")
    ),
    params(("id" = Uuid, Path, description = "ID da permissão")),
    security(("api_jwt" = []))
)]
pub async fn delete_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermPermissionsManage>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .rbac_service
        .delete_permission(&mut *rls_conn, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  2. CARGOS
// =============================================================================

// POST /api/rbac/roles
#[utoipa::path(
    post,
    path = "/api/rbac/roles",
    tag = "RBAC",
    request_body = CreateRolePayload,
    responses(
        (status = 201, description = "Cargo criado com as permissões", body = RoleResponse),
        (status = 404, description = "Cargo pai ou permissão não encontrada"),
        (status = 409, description = "Código já existe no tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_role(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesManage>,
    Json(payload): Json<CreateRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let response = app_state
        .rbac_service
        .create_role(&mut *rls_conn, tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(response)))
}

// GET /api/rbac/roles
#[utoipa::path(
    get,
    path = "/api/rbac/roles",
    tag = "RBAC",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Cargos do tenant", body = Paginated<Role>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_roles(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesRead>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .rbac_service
        .list_roles(&mut *rls_conn, tenant.0, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(page))
}

// GET /api/rbac/roles/{id}
#[utoipa::path(
    get,
    path = "/api/rbac/roles/{id}",
    tag = "RBAC",
    responses(
        (status = 200, description = "Cargo com as permissões", body = RoleResponse),
        (status = 404, description = "Cargo não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do cargo")),
    security(("api_jwt" = []))
)]
pub async fn get_role(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let response = app_state
        .rbac_service
        .get_role(&mut *rls_conn, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(response))
}

// PUT /api/rbac/roles/{id}
#[utoipa::path(
    put,
    path = "/api/rbac/roles/{id}",
    tag = "RBAC",
    request_body = UpdateRolePayload,
    responses(
        (status = 200, description = "Cargo atualizado", body = RoleResponse),
        (status = 409, description = "Cargo de sistema não pode ser alterado")
    ),
    params(("id" = Uuid, Path, description = "ID do cargo")),
    security(("api_jwt" = []))
)]
pub async fn update_role(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesManage>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let response = app_state
        .rbac_service
        .update_role(&mut *rls_conn, tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(response))
}

// DELETE /api/rbac/roles/{id}
#[utoipa::path(
    delete,
    path = "/api/rbac/roles/{id}",
    tag = "RBAC",
    responses(
        (status = 204, description = "Cargo removido"),
        (status = 409, description = "Cargo de sistema ou com usuários atribuídos")
    ),
    params(("id" = Uuid, Path, description = "ID do cargo")),
    security(("api_jwt" = []))
)]
pub async fn delete_role(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesManage>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .rbac_service
        .delete_role(&mut *rls_conn, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// PUT /api/rbac/roles/{id}/permissions
#[utoipa::path(
    put,
    path = "/api/rbac/roles/{id}/permissions",
    tag = "RBAC",
    request_body = AssignPermissionsPayload,
    responses(
        (status = 200, description = "Permissões do cargo substituídas", body = RoleResponse),
        (status = 404, description = "Cargo ou permissão não encontrada")
    ),
    params(("id" = Uuid, Path, description = "ID do cargo")),
    security(("api_jwt" = []))
)]
pub async fn assign_role_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermPermissionsManage>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignPermissionsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let response = app_state
        .rbac_service
        .assign_permissions(&mut *rls_conn, tenant.0, id, payload.permissions)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(response))
}
