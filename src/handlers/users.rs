// src/handlers/users.rs

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
            PermRolesManage, PermUsersCreate, PermUsersDelete, PermUsersRead, PermUsersUpdate,
            RequirePermission,
        },
        tenancy::TenantContext,
    },
    models::{
        auth::{
            AssignRolesPayload, ChangePasswordPayload, CreateUserPayload, MeResponse,
            UpdateUserPayload, User,
        },
        rbac::AssignPermissionsPayload,
    },
};

// POST /api/users
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "Usuário criado", body = User),
        (status = 409, description = "E-mail já cadastrado na empresa")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_user(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersCreate>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let created = app_state
        .user_service
        .create_user(&mut *rls_conn, tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Usuários do tenant", body = Paginated<User>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_users(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersRead>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .user_service
        .list_users(&mut *rls_conn, tenant.0, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(page))
}

// GET /api/users/{id}
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    responses(
        (status = 200, description = "Usuário com cargos e permissões efetivas", body = MeResponse),
        (status = 404, description = "Usuário não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do usuário")),
    security(("api_jwt" = []))
)]
pub async fn get_user(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let found = app_state
        .user_service
        .get_user(&mut *rls_conn, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(found))
}

// PUT /api/users/{id}
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    request_body = UpdateUserPayload,
    responses(
        (status = 200, description = "Usuário atualizado", body = User),
        (status = 404, description = "Usuário não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do usuário")),
    security(("api_jwt" = []))
)]
pub async fn update_user(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let updated = app_state
        .user_service
        .update_user(&mut *rls_conn, tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(updated))
}

// DELETE /api/users/{id}
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    responses(
        (status = 204, description = "Usuário excluído"),
        (status = 404, description = "Usuário não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do usuário")),
    security(("api_jwt" = []))
)]
pub async fn delete_user(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersDelete>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .user_service
        .delete_user(&mut *rls_conn, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/users/{id}/change-password
#[utoipa::path(
    post,
    path = "/api/users/{id}/change-password",
    tag = "Users",
    request_body = ChangePasswordPayload,
    responses(
        (status = 204, description = "Senha alterada; as sessões abertas são encerradas"),
        (status = 400, description = "Senha atual incorreta"),
        (status = 404, description = "Usuário não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do usuário")),
    security(("api_jwt" = []))
)]
pub async fn change_password(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .user_service
        .change_password(&mut *rls_conn, tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/users/{id}/permissions
#[utoipa::path(
    get,
    path = "/api/users/{id}/permissions",
    tag = "Users",
    responses(
        (status = 200, description = "Permissões efetivas (cargos + diretas)", body = Vec<String>)
    ),
    params(("id" = Uuid, Path, description = "ID do usuário")),
    security(("api_jwt" = []))
)]
pub async fn get_effective_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let permissions = app_state
        .user_service
        .effective_permissions(&mut *rls_conn, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(permissions))
}

// PUT /api/users/{id}/roles
#[utoipa::path(
    put,
    path = "/api/users/{id}/roles",
    tag = "Users",
    request_body = AssignRolesPayload,
    responses(
        (status = 200, description = "Cargos substituídos", body = MeResponse),
        (status = 404, description = "Usuário ou cargo não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do usuário")),
    security(("api_jwt" = []))
)]
pub async fn assign_roles(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesManage>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRolesPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let updated = app_state
        .user_service
        .assign_roles(&mut *rls_conn, tenant.0, id, payload.roles)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(updated))
}

// PUT /api/users/{id}/permissions
#[utoipa::path(
    put,
    path = "/api/users/{id}/permissions",
    tag = "Users",
    request_body = AssignPermissionsPayload,
    responses(
        (status = 200, description = "Permissões diretas substituídas", body = MeResponse),
        (status = 404, description = "Usuário ou permissão não encontrada")
    ),
    params(("id" = Uuid, Path, description = "ID do usuário")),
    security(("api_jwt" = []))
)]
pub async fn assign_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignPermissionsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let updated = app_state
        .user_service
        .assign_permissions(&mut *rls_conn, tenant.0, id, payload.permissions)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(updated))
}
