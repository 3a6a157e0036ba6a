// src/handlers/catalog.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::get_rls_connection,
        error::{ApiError, AppError},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermItemsCreate, PermItemsRead, PermItemsUpdate, RequirePermission},
        tenancy::TenantContext,
    },
    models::catalog::{
        AddUnitConversionPayload, ConversionQuery, ConversionResult, ConvertQuantityPayload,
        CreateItemPayload, Item, ItemUnitConversion, StockInAllUnits, UnitCategory, UnitOfMeasure,
    },
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UnitQuery {
    /// Filtra pela categoria de unidade
    pub category_id: Option<Uuid>,
}

// =============================================================================
//  1. UNIDADES DE MEDIDA
// =============================================================================

// GET /api/catalog/unit-categories
#[utoipa::path(
    get,
    path = "/api/catalog/unit-categories",
    tag = "Catalog",
    responses(
        (status = 200, description = "Categorias do sistema e do tenant", body = Vec<UnitCategory>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_unit_categories(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsRead>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let categories = app_state
        .catalog_service
        .list_unit_categories(&mut *rls_conn, tenant.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(categories))
}

// GET /api/catalog/units
#[utoipa::path(
    get,
    path = "/api/catalog/units",
    tag = "Catalog",
    params(UnitQuery),
    responses(
        (status = 200, description = "Unidades do sistema e do tenant", body = Vec<UnitOfMeasure>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_units(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsRead>,
    Query(query): Query<UnitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let units = app_state
        .catalog_service
        .list_units(&mut *rls_conn, tenant.0, query.category_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(units))
}

// =============================================================================
//  2. ITENS
// =============================================================================

// POST /api/catalog/items
#[utoipa::path(
    post,
    path = "/api/catalog/items",
    tag = "Catalog",
    request_body = CreateItemPayload,
    responses(
        (status = 201, description = "Item criado", body = Item),
        (status = 404, description = "Unidade-base não encontrada"),
        (status = 409, description = "Código já existe no tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsCreate>,
    Json(payload): Json<CreateItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let item = app_state
        .catalog_service
        .create_item(&mut *rls_conn, tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(item)))
}

// GET /api/catalog/items/{id}
#[utoipa::path(
    get,
    path = "/api/catalog/items/{id}",
    tag = "Catalog",
    responses(
        (status = 200, description = "Item", body = Item),
        (status = 404, description = "Item não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do item")),
    security(("api_jwt" = []))
)]
pub async fn get_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let item = app_state
        .catalog_service
        .get_item(&mut *rls_conn, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(item))
}

// =============================================================================
//  3. CONVERSÕES DO ITEM
// =============================================================================

// POST /api/catalog/items/{id}/conversions
#[utoipa::path(
    post,
    path = "/api/catalog/items/{id}/conversions",
    tag = "Catalog",
    request_body = AddUnitConversionPayload,
    responses(
        (status = 201, description = "Conversão adicionada", body = ItemUnitConversion),
        (status = 400, description = "Fator de conversão inválido"),
        (status = 409, description = "Unidade já configurada para o propósito")
    ),
    params(("id" = Uuid, Path, description = "ID do item")),
    security(("api_jwt" = []))
)]
pub async fn add_conversion(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsUpdate>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<AddUnitConversionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let conversion = app_state
        .catalog_service
        .add_conversion(&mut *rls_conn, tenant.0, item_id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(conversion)))
}

// GET /api/catalog/items/{id}/conversions
#[utoipa::path(
    get,
    path = "/api/catalog/items/{id}/conversions",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "ID do item"),
        ConversionQuery
    ),
    responses(
        (status = 200, description = "Conversões ativas, default primeiro", body = Vec<ItemUnitConversion>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_conversions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsRead>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<ConversionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let conversions = app_state
        .catalog_service
        .list_conversions(&mut *rls_conn, tenant.0, item_id, query.purpose)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(conversions))
}

// PUT /api/catalog/items/{id}/conversions/{conversion_id}/default
#[utoipa::path(
    put,
    path = "/api/catalog/items/{id}/conversions/{conversion_id}/default",
    tag = "Catalog",
    responses(
        (status = 200, description = "Conversão marcada como padrão do propósito", body = ItemUnitConversion),
        (status = 404, description = "Item ou conversão não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do item"),
        ("conversion_id" = Uuid, Path, description = "ID da conversão")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_default_conversion(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsUpdate>,
    Path((item_id, conversion_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let conversion = app_state
        .catalog_service
        .set_default_conversion(&mut *rls_conn, tenant.0, item_id, conversion_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(conversion))
}

// DELETE /api/catalog/items/{id}/conversions/{conversion_id}
#[utoipa::path(
    delete,
    path = "/api/catalog/items/{id}/conversions/{conversion_id}",
    tag = "Catalog",
    responses(
        (status = 204, description = "Conversão removida"),
        (status = 404, description = "Item ou conversão não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do item"),
        ("conversion_id" = Uuid, Path, description = "ID da conversão")
    ),
    security(("api_jwt" = []))
)]
pub async fn remove_conversion(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsUpdate>,
    Path((item_id, conversion_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .catalog_service
        .remove_conversion(&mut *rls_conn, tenant.0, item_id, conversion_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/catalog/items/{id}/convert
#[utoipa::path(
    post,
    path = "/api/catalog/items/{id}/convert",
    tag = "Catalog",
    request_body = ConvertQuantityPayload,
    responses(
        (status = 200, description = "Quantidade convertida", body = ConversionResult),
        (status = 400, description = "Unidade de origem ou destino não configurada no item")
    ),
    params(("id" = Uuid, Path, description = "ID do item")),
    security(("api_jwt" = []))
)]
pub async fn convert_quantity(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsRead>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<ConvertQuantityPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let result = app_state
        .catalog_service
        .convert_quantity(
            &mut *rls_conn,
            tenant.0,
            item_id,
            payload.from_unit_id,
            payload.to_unit_id,
            payload.quantity,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(result))
}

// GET /api/catalog/items/{id}/stock
#[utoipa::path(
    get,
    path = "/api/catalog/items/{id}/stock",
    tag = "Catalog",
    responses(
        (status = 200, description = "Estoque atual expresso em cada unidade configurada", body = StockInAllUnits),
        (status = 400, description = "Item não controla estoque")
    ),
    params(("id" = Uuid, Path, description = "ID do item")),
    security(("api_jwt" = []))
)]
pub async fn stock_in_all_units(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermItemsRead>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let stock = app_state
        .catalog_service
        .stock_in_all_units(&mut *rls_conn, tenant.0, item_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(stock))
}
