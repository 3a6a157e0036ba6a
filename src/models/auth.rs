// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub email: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token: String,
    pub is_valid: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginUserPayload {
    #[validate(length(min = 1, message = "O código da empresa é obrigatório."))]
    #[schema(example = "SUNSET")]
    pub tenant_code: String,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    #[schema(example = "admin@sunset.com")]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenPayload {
    #[validate(length(min = 1, message = "O refresh token é obrigatório."))]
    pub refresh_token: String,
}

// Resposta de autenticação com os tokens
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
}

// GET /api/auth/me
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub full_name: String,
    #[schema(example = json!(["ADMIN"]))]
    pub roles: Vec<String>,
    #[schema(example = json!(["ADM:*:*:*"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,
    #[validate(length(min = 8, message = "A senha deve ter no mínimo 8 caracteres."))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "O nome é obrigatório."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "O sobrenome é obrigatório."))]
    pub last_name: String,
}

// Cadastro público: o tenant vem pelo código, como no login
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserPayload {
    #[validate(length(min = 1, message = "O código da empresa é obrigatório."))]
    #[schema(example = "SUNSET")]
    pub tenant_code: String,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,
    #[validate(length(min = 8, message = "A senha deve ter no mínimo 8 caracteres."))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "O nome é obrigatório."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "O sobrenome é obrigatório."))]
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    #[validate(length(min = 1, max = 100, message = "O nome não pode ser vazio."))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "O sobrenome não pode ser vazio."))]
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    #[validate(length(min = 1, message = "A senha atual é obrigatória."))]
    pub current_password: String,
    #[validate(length(min = 8, message = "A nova senha deve ter no mínimo 8 caracteres."))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRolesPayload {
    #[schema(example = json!(["ADMIN", "VIEWER"]))]
    pub roles: Vec<String>,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid,       // Subject (ID do usuário)
    pub tenant_id: Uuid, // Empresa do usuário
    pub email: String,
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}
