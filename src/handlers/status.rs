// src/handlers/status.rs

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
        pagination::Paginated,
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermStatusCreate, PermStatusDelete, PermStatusRead, PermStatusUpdate, RequirePermission},
        tenancy::TenantContext,
    },
    models::status::{
        ApplyTransitionPayload, CreateStatusGroupPayload, CreateStatusPayload,
        CreateTransitionPayload, Status, StatusGroup, StatusGroupDetail, StatusGroupQuery,
        StatusTransition, TransitionOutcome, UpdateStatusGroupPayload, UpdateStatusPayload,
        UpdateTransitionPayload,
    },
    services::workflow::EntityRef,
};

// =============================================================================
//  1. GRUPOS DE STATUS
// =============================================================================

// POST /api/status/groups
#[utoipa::path(
    post,
    path = "/api/status/groups",
    tag = "Status",
    request_body = CreateStatusGroupPayload,
    responses(
        (status = 201, description = "Grupo criado", body = StatusGroup),
        (status = 409, description = "Código já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_group(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusCreate>,
    Json(payload): Json<CreateStatusGroupPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let group = app_state
        .status_service
        .create_group(&mut *rls_conn, tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(group)))
}

// GET /api/status/groups
#[utoipa::path(
    get,
    path = "/api/status/groups",
    tag = "Status",
    params(StatusGroupQuery),
    responses(
        (status = 200, description = "Grupos do tenant e do sistema", body = Paginated<StatusGroup>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_groups(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusRead>,
    Query(query): Query<StatusGroupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .status_service
        .list_groups(&mut *rls_conn, tenant.0, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(page))
}

// GET /api/status/groups/{code}
#[utoipa::path(
    get,
    path = "/api/status/groups/{code}",
    tag = "Status",
    responses(
        (status = 200, description = "Grupo com status e transições", body = StatusGroupDetail),
        (status = 404, description = "Grupo não encontrado")
    ),
    params(("code" = String, Path, description = "Código do grupo (ex.: INV_RECEIPTS)")),
    security(("api_jwt" = []))
)]
pub async fn get_group(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusRead>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let detail = app_state
        .status_service
        .get_group(&mut *rls_conn, tenant.0, &code)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(detail))
}

// PUT /api/status/groups/{code}
#[utoipa::path(
    put,
    path = "/api/status/groups/{code}",
    tag = "Status",
    request_body = UpdateStatusGroupPayload,
    responses(
        (status = 200, description = "Grupo atualizado", body = StatusGroup),
        (status = 409, description = "Código de grupo do sistema é imutável, ou novo código já existe")
    ),
    params(("code" = String, Path, description = "Código do grupo")),
    security(("api_jwt" = []))
)]
pub async fn update_group(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusUpdate>,
    Path(code): Path<String>,
    Json(payload): Json<UpdateStatusGroupPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let group = app_state
        .status_service
        .update_group(&mut *rls_conn, tenant.0, &code, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(group))
}

// DELETE /api/status/groups/{code}
#[utoipa::path(
    delete,
    path = "/api/status/groups/{code}",
    tag = "Status",
    responses(
        (status = 204, description = "Grupo removido"),
        (status = 400, description = "Grupo ainda possui status"),
        (status = 409, description = "Grupo do sistema")
    ),
    params(("code" = String, Path, description = "Código do grupo")),
    security(("api_jwt" = []))
)]
pub async fn delete_group(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusDelete>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .status_service
        .delete_group(&mut *rls_conn, tenant.0, &code)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  2. STATUS
// =============================================================================

// POST /api/status/groups/{code}/statuses
#[utoipa::path(
    post,
    path = "/api/status/groups/{code}/statuses",
    tag = "Status",
    request_body = CreateStatusPayload,
    responses(
        (status = 201, description = "Status criado", body = Status),
        (status = 409, description = "Código já existe no grupo")
    ),
    params(("code" = String, Path, description = "Código do grupo")),
    security(("api_jwt" = []))
)]
pub async fn create_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusCreate>,
    Path(code): Path<String>,
    Json(payload): Json<CreateStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let status = app_state
        .status_service
        .create_status(&mut *rls_conn, tenant.0, &code, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(status)))
}

// GET /api/status/groups/{code}/statuses
#[utoipa::path(
    get,
    path = "/api/status/groups/{code}/statuses",
    tag = "Status",
    responses(
        (status = 200, description = "Status do grupo por ordem de exibição", body = Vec<Status>)
    ),
    params(("code" = String, Path, description = "Código do grupo")),
    security(("api_jwt" = []))
)]
pub async fn list_statuses(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusRead>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let statuses = app_state
        .status_service
        .list_statuses(&mut *rls_conn, tenant.0, &code)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(statuses))
}

// PUT /api/status/groups/{code}/statuses/{status_code}
#[utoipa::path(
    put,
    path = "/api/status/groups/{code}/statuses/{status_code}",
    tag = "Status",
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status atualizado", body = Status),
        (status = 409, description = "Código de status do sistema é imutável")
    ),
    params(
        ("code" = String, Path, description = "Código do grupo"),
        ("status_code" = String, Path, description = "Código do status")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusUpdate>,
    Path((code, status_code)): Path<(String, String)>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let status = app_state
        .status_service
        .update_status(&mut *rls_conn, tenant.0, &code, &status_code, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(status))
}

// DELETE /api/status/groups/{code}/statuses/{status_code}
#[utoipa::path(
    delete,
    path = "/api/status/groups/{code}/statuses/{status_code}",
    tag = "Status",
    responses(
        (status = 204, description = "Status removido"),
        (status = 409, description = "Status do sistema")
    ),
    params(
        ("code" = String, Path, description = "Código do grupo"),
        ("status_code" = String, Path, description = "Código do status")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusDelete>,
    Path((code, status_code)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .status_service
        .delete_status(&mut *rls_conn, tenant.0, &code, &status_code)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/status/groups/{code}/statuses/{status_code}/next
#[utoipa::path(
    get,
    path = "/api/status/groups/{code}/statuses/{status_code}/next",
    tag = "Status",
    responses(
        (status = 200, description = "Transições possíveis a partir do status", body = Vec<StatusTransition>),
        (status = 404, description = "Grupo ou status não encontrado")
    ),
    params(
        ("code" = String, Path, description = "Código do grupo"),
        ("status_code" = String, Path, description = "Código do status de origem")
    ),
    security(("api_jwt" = []))
)]
pub async fn next_transitions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusRead>,
    Path((code, status_code)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let transitions = app_state
        .status_service
        .available_transitions(&mut *rls_conn, tenant.0, &code, &status_code)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(transitions))
}

// =============================================================================
//  3. TRANSIÇÕES
// =============================================================================

// POST /api/status/groups/{code}/transitions
#[utoipa::path(
    post,
    path = "/api/status/groups/{code}/transitions",
    tag = "Status",
    request_body = CreateTransitionPayload,
    responses(
        (status = 201, description = "Transição criada", body = StatusTransition),
        (status = 400, description = "Status de origem ou destino fora do grupo")
    ),
    params(("code" = String, Path, description = "Código do grupo")),
    security(("api_jwt" = []))
)]
pub async fn create_transition(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusCreate>,
    Path(code): Path<String>,
    Json(payload): Json<CreateTransitionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let transition = app_state
        .status_service
        .create_transition(&mut *rls_conn, tenant.0, &code, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(transition)))
}

// GET /api/status/groups/{code}/transitions
#[utoipa::path(
    get,
    path = "/api/status/groups/{code}/transitions",
    tag = "Status",
    responses(
        (status = 200, description = "Transições do grupo", body = Vec<StatusTransition>)
    ),
    params(("code" = String, Path, description = "Código do grupo")),
    security(("api_jwt" = []))
)]
pub async fn list_transitions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusRead>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let transitions = app_state
        .status_service
        .list_transitions(&mut *rls_conn, tenant.0, &code)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(transitions))
}

// PUT /api/status/groups/{code}/transitions/{id}
#[utoipa::path(
    put,
    path = "/api/status/groups/{code}/transitions/{id}",
    tag = "Status",
    request_body = UpdateTransitionPayload,
    responses(
        (status = 200, description = "Transição atualizada", body = StatusTransition),
        (status = 400, description = "Status de origem ou destino fora do grupo")
    ),
    params(
        ("code" = String, Path, description = "Código do grupo"),
        ("id" = Uuid, Path, description = "ID da transição")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_transition(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusUpdate>,
    Path((code, id)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateTransitionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let transition = app_state
        .status_service
        .update_transition(&mut *rls_conn, tenant.0, &code, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(transition))
}

// DELETE /api/status/groups/{code}/transitions/{id}
#[utoipa::path(
    delete,
    path = "/api/status/groups/{code}/transitions/{id}",
    tag = "Status",
    responses(
        (status = 204, description = "Transição removida"),
        (status = 404, description = "Transição não encontrada")
    ),
    params(
        ("code" = String, Path, description = "Código do grupo"),
        ("id" = Uuid, Path, description = "ID da transição")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_transition(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermStatusDelete>,
    Path((code, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .status_service
        .delete_transition(&mut *rls_conn, tenant.0, &code, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/status/groups/{code}/transitions/apply
#[utoipa::path(
    post,
    path = "/api/status/groups/{code}/transitions/apply",
    tag = "Status",
    request_body = ApplyTransitionPayload,
    responses(
        (status = 200, description = "Transição permitida; novo status e ações automáticas", body = TransitionOutcome),
        (status = 400, description = "Transição inexistente ou motivo obrigatório ausente"),
        (status = 403, description = "Permissão ou cargo exigido pela transição")
    ),
    params(("code" = String, Path, description = "Código do grupo")),
    security(("api_jwt" = []))
)]
pub async fn apply_transition(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    guard: RequirePermission<PermStatusRead>,
    Path(code): Path<String>,
    Json(payload): Json<ApplyTransitionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let entity = EntityRef {
        entity_type: payload.entity_type,
        entity_id: payload.entity_id,
        group_code: code,
        current_status_code: payload.current_status_code,
    };

    let outcome = app_state
        .status_service
        .apply_transition(
            &mut *rls_conn,
            tenant.0,
            &entity,
            entity.entity_id,
            &payload.target_status_code,
            payload.reason,
            payload.comments,
            &guard.grants,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(outcome))
}
