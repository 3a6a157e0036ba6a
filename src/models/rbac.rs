// src/models/rbac.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// O que sai do banco (Tabela permissions)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440001")]
    pub id: Uuid,

    // NULL = permissão global (do sistema)
    pub tenant_id: Option<Uuid>,

    #[schema(example = "MDM:items:read:tenant")]
    pub code: String,

    #[schema(example = "Read Items")]
    pub name: String,

    pub description: Option<String>,

    #[schema(example = "MASTER_DATA")]
    pub module: String,
    #[schema(example = "items")]
    pub resource: String,
    #[schema(example = "read")]
    pub action: String,
    #[schema(example = "TENANT")]
    pub scope: String,

    pub is_system_permission: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

// O que sai do banco (Tabela roles)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,

    #[schema(ignore)]
    pub tenant_id: Uuid,

    #[schema(example = "WAREHOUSE_CLERK")]
    pub code: String,

    #[schema(example = "Auxiliar de Estoque")]
    pub name: String,

    pub description: Option<String>,

    // Hierarquia apenas informativa: o avaliador não herda permissões do pai.
    pub parent_role_id: Option<Uuid>,
    pub level: i32,

    pub is_system_role: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionPayload {
    #[validate(length(min = 7, max = 100, message = "O código é obrigatório."))]
    #[schema(example = "INV:receipts:approve:tenant")]
    pub code: String,

    #[validate(length(min = 1, max = 100, message = "O nome é obrigatório."))]
    #[schema(example = "Approve Receipts")]
    pub name: String,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 50, message = "O módulo é obrigatório."))]
    #[schema(example = "INVENTORY")]
    pub module: String,

    #[validate(length(min = 1, max = 50, message = "O recurso é obrigatório."))]
    #[schema(example = "receipts")]
    pub resource: String,

    #[validate(length(min = 1, max = 50, message = "A ação é obrigatória."))]
    #[schema(example = "approve")]
    pub action: String,

    // Padrão: TENANT
    #[schema(example = "TENANT")]
    pub scope: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionPayload {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRolePayload {
    #[validate(length(min = 1, max = 50, message = "O código é obrigatório."))]
    #[schema(example = "WAREHOUSE_CLERK")]
    pub code: String,

    #[validate(length(min = 1, max = 100, message = "O nome é obrigatório."))]
    #[schema(example = "Auxiliar de Estoque")]
    pub name: String,

    #[schema(example = "Pode apenas visualizar produtos e dar entrada em notas")]
    pub description: Option<String>,

    pub parent_role_id: Option<Uuid>,

    #[serde(default)]
    #[schema(example = json!(["MDM:items:read:tenant", "INV:*:read:tenant"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRolePayload {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

// Substitui o conjunto de permissões (por código)
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignPermissionsPayload {
    #[schema(example = json!(["MDM:status:read:tenant"]))]
    pub permissions: Vec<String>,
}

// Resposta completa (Cargo + Lista de Permissões)
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    #[serde(flatten)]
    pub role: Role,

    #[schema(example = json!(["MDM:items:read:tenant"]))]
    pub permissions: Vec<String>,
}
