// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// Mapeia o ENUM 'unit_purpose' do Postgres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "unit_purpose", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitPurpose {
    Purchase,
    Storage,
    Consumption,
    Sale,
}

// Mapeia o ENUM 'item_type' do Postgres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "item_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Product,
    Service,
    FixedAsset,
    Tool,
    Material,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitCategory {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    #[schema(example = "QUANTITY")]
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitOfMeasure {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub category_id: Uuid,
    #[schema(example = "BOX")]
    pub code: String,
    #[schema(example = "Caixa")]
    pub name: String,
    pub symbol: Option<String>,
    // Quantas unidades-base da categoria cabem em 1 desta unidade
    #[schema(value_type = f64, example = 12.0)]
    pub conversion_factor: Decimal,
    pub is_base_unit: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "PROD-001")]
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    pub base_unit_id: Uuid,
    pub is_inventoriable: bool,
    #[schema(value_type = Option<f64>)]
    pub current_stock: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub deleted_at: Option<DateTime<Utc>>,
}

// Vínculo Item <-> Unidade para um propósito (compra, estoque, consumo, venda)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemUnitConversion {
    pub id: Uuid,
    pub item_id: Uuid,
    pub unit_id: Uuid,
    pub purpose: UnitPurpose,
    // Quantas unidades-base DO ITEM cabem em 1 desta unidade
    #[schema(value_type = f64, example = 12.0)]
    pub factor: Decimal,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    pub code: Option<String>,
    pub barcode: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// Payloads
// ---

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemPayload {
    #[validate(length(min = 1, max = 50, message = "O código é obrigatório."))]
    #[schema(example = "PROD-001")]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "O nome é obrigatório."))]
    pub name: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    pub base_unit_id: Uuid,
    #[serde(default = "default_true")]
    pub is_inventoriable: bool,
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = Option<f64>)]
    pub current_stock: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddUnitConversionPayload {
    pub purpose: UnitPurpose,
    pub unit_id: Uuid,
    #[schema(value_type = f64, example = 12.0)]
    pub factor: Decimal,
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    #[validate(length(max = 100))]
    pub code: Option<String>,
    #[validate(length(max = 100))]
    pub barcode: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ConversionQuery {
    pub purpose: Option<UnitPurpose>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertQuantityPayload {
    pub from_unit_id: Uuid,
    pub to_unit_id: Uuid,
    #[schema(value_type = f64, example = 3.0)]
    pub quantity: Decimal,
}

// ---
// Respostas
// ---

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub item_id: Uuid,
    pub from_unit_id: Uuid,
    pub to_unit_id: Uuid,
    #[schema(value_type = f64)]
    pub quantity: Decimal,
    // Quantidade na unidade-base do item
    #[schema(value_type = f64)]
    pub base_quantity: Decimal,
    #[schema(value_type = f64, example = 36.0)]
    pub converted_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockInUnit {
    pub purpose: UnitPurpose,
    pub unit_id: Uuid,
    #[schema(value_type = f64)]
    pub quantity: Decimal,
    pub is_default: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockInAllUnits {
    pub item_id: Uuid,
    pub item_code: String,
    pub base_unit_id: Uuid,
    #[schema(value_type = f64)]
    pub base_stock: Decimal,
    pub stock_in_units: Vec<StockInUnit>,
}

fn default_true() -> bool {
    true
}
