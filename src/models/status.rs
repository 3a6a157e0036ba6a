// src/models/status.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::common::pagination::PaginationQuery;

// Mapeia o ENUM 'status_type' do Postgres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "status_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusType {
    Initial,
    Intermediate,
    Final,
    Cancelled,
}

// ---
// Grupo de status: o "workflow" de um tipo de entidade (ex: INVENTORY / RECEIPT)
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusGroup {
    pub id: Uuid,
    // NULL = grupo do sistema, visível para todos os tenants
    pub tenant_id: Option<Uuid>,
    #[schema(example = "INV_RECEIPTS")]
    pub code: String,
    #[schema(example = "Recebimentos")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "INVENTORY")]
    pub module: String,
    #[schema(example = "RECEIPT")]
    pub entity_type: String,
    pub allow_custom_statuses: bool,
    pub require_workflow: bool,
    pub is_system_group: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub id: Uuid,
    pub status_group_id: Uuid,
    #[schema(example = "DRAFT")]
    pub code: String,
    #[schema(example = "Rascunho")]
    pub name: String,
    pub description: Option<String>,
    pub status_type: StatusType,
    pub display_order: i32,
    #[schema(example = "#9E9E9E")]
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_default: bool,
    pub is_editable: bool,
    pub is_deletable: bool,
    pub is_system_status: bool,
    pub requires_approval: bool,
    pub required_permission: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub deleted_at: Option<DateTime<Utc>>,
}

// Aresta permitida do workflow. from_status_id NULL = "a partir de qualquer status".
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub id: Uuid,
    pub status_group_id: Uuid,
    pub from_status_id: Option<Uuid>,
    pub to_status_id: Uuid,
    #[schema(example = "Concluir recebimento")]
    pub transition_name: String,
    pub requires_approval: bool,
    pub requires_reason: bool,
    #[schema(example = "INV:receipts:complete:tenant")]
    pub required_permission: Option<String>,
    #[schema(example = json!(["WAREHOUSE_MANAGER"]))]
    pub allowed_roles: Vec<String>,
    #[schema(value_type = Object)]
    pub validation_rules: Option<Value>,
    #[schema(value_type = Object, example = json!({ "updateStock": true }))]
    pub auto_actions: Option<Value>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// GET /api/status/groups/{code}
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusGroupDetail {
    #[serde(flatten)]
    pub group: StatusGroup,
    pub statuses: Vec<Status>,
    pub transitions: Vec<StatusTransition>,
}

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStatusGroupPayload {
    #[validate(length(min = 1, max = 50, message = "O código é obrigatório."))]
    #[schema(example = "SALES_ORDERS")]
    pub code: String,
    #[validate(length(min = 1, max = 100, message = "O nome é obrigatório."))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "O módulo é obrigatório."))]
    pub module: String,
    #[validate(length(min = 1, max = 50, message = "O tipo de entidade é obrigatório."))]
    pub entity_type: String,
    #[serde(default)]
    pub allow_custom_statuses: bool,
    #[serde(default = "default_true")]
    pub require_workflow: bool,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusGroupPayload {
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub allow_custom_statuses: Option<bool>,
    pub require_workflow: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StatusGroupQuery {
    pub module: Option<String>,
    pub entity_type: Option<String>,
    #[validate(range(min = 1))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
    pub search: Option<String>,
}

impl StatusGroupQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            limit: self.limit,
            search: self.search.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStatusPayload {
    #[validate(length(min = 1, max = 50, message = "O código é obrigatório."))]
    #[schema(example = "APPROVED")]
    pub code: String,
    #[validate(length(min = 1, max = 100, message = "O nome é obrigatório."))]
    pub name: String,
    pub description: Option<String>,
    pub status_type: StatusType,
    #[serde(default)]
    pub display_order: i32,
    #[validate(length(max = 20))]
    pub color: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_editable: bool,
    #[serde(default = "default_true")]
    pub is_deletable: bool,
    #[serde(default)]
    pub requires_approval: bool,
    pub required_permission: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub status_type: Option<StatusType>,
    pub display_order: Option<i32>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_default: Option<bool>,
    pub is_editable: Option<bool>,
    pub is_deletable: Option<bool>,
    pub requires_approval: Option<bool>,
    pub required_permission: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransitionPayload {
    pub from_status_id: Option<Uuid>,
    pub to_status_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "O nome da transição é obrigatório."))]
    pub transition_name: String,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub requires_reason: bool,
    pub required_permission: Option<String>,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[schema(value_type = Object, example = json!({ "requireFields": ["approvedBy"] }))]
    pub validation_rules: Option<Value>,
    #[schema(value_type = Object, example = json!({ "sendNotification": true, "updateStock": true }))]
    pub auto_actions: Option<Value>,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransitionPayload {
    pub from_status_id: Option<Uuid>,
    // true = remove o "from" e a transição passa a valer a partir de qualquer status
    #[serde(default)]
    pub from_any_status: bool,
    pub to_status_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub transition_name: Option<String>,
    pub requires_approval: Option<bool>,
    pub requires_reason: Option<bool>,
    pub required_permission: Option<String>,
    pub allowed_roles: Option<Vec<String>>,
    #[schema(value_type = Object)]
    pub validation_rules: Option<Value>,
    #[schema(value_type = Object)]
    pub auto_actions: Option<Value>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

// POST /api/status/groups/{code}/transitions/apply
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTransitionPayload {
    #[validate(length(min = 1, message = "O tipo da entidade é obrigatório."))]
    #[schema(example = "RECEIPT")]
    pub entity_type: String,
    pub entity_id: Uuid,
    #[validate(length(min = 1, message = "O status atual é obrigatório."))]
    #[schema(example = "DRAFT")]
    pub current_status_code: String,
    #[validate(length(min = 1, message = "O status de destino é obrigatório."))]
    #[schema(example = "RECEIVING")]
    pub target_status_code: String,
    pub reason: Option<String>,
    pub comments: Option<String>,
}

// Ação automática declarada na transição: reportada ao chamador, nunca executada aqui.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoAction {
    #[schema(example = "updateStock")]
    pub action: String,
    #[schema(value_type = Object)]
    pub params: Value,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub entity_id: Uuid,
    pub previous_status: Status,
    pub new_status: Status,
    pub transition: StatusTransition,
    pub auto_actions: Vec<AutoAction>,
    pub reason: Option<String>,
    pub comments: Option<String>,
}

fn default_true() -> bool {
    true
}
