// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// Categoria do erro exposta ao cliente (campo "kind" da resposta)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ValidationError,
    PermissionDenied,
    Unauthenticated,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // --- NotFound ---
    #[error("{resource} '{key}' não encontrado")]
    NotFound { resource: &'static str, key: String },

    // --- Conflict ---
    #[error("{resource} com código '{code}' já existe")]
    AlreadyExists { resource: &'static str, code: String },

    #[error("{0} do sistema não pode ser alterado")]
    SystemResourceImmutable(&'static str),

    #[error("Cargo '{0}' possui usuários atribuídos")]
    RoleHasAssignedUsers(String),

    // --- ValidationError (regras de negócio) ---
    #[error("Código de permissão inválido: '{0}'")]
    InvalidPermissionCode(String),

    #[error("Transição ilegal de '{from}' para '{to}'")]
    IllegalTransition { from: String, to: String },

    #[error("A transição '{0}' exige um motivo")]
    ReasonRequired(String),

    #[error("Status '{status}' não pertence ao grupo '{group}'")]
    StatusOutsideGroup { status: String, group: String },

    #[error("Grupo de status '{0}' ainda possui status")]
    StatusGroupHasStatuses(String),

    #[error("Unidade de origem não configurada para o item")]
    SourceUnitNotConfigured,

    #[error("Unidade de destino não configurada para o item")]
    TargetUnitNotConfigured,

    #[error("Fator de conversão inválido: {0}")]
    InvalidConversionFactor(String),

    #[error("Quantidade fora do intervalo suportado: {0}")]
    QuantityOutOfRange(String),

    #[error("Item não é inventariável ou não possui estoque")]
    ItemNotInventoriable,

    #[error("Senha atual incorreta")]
    CurrentPasswordIncorrect,

    // --- PermissionDenied ---
    #[error("Permissões insuficientes: {}", .0.join(", "))]
    PermissionDenied(Vec<String>),

    #[error("Nenhum dos cargos exigidos: {}", .0.join(", "))]
    RoleNotAllowed(Vec<String>),

    // --- Unauthenticated ---
    #[error("Usuário não autenticado")]
    Unauthenticated,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn not_found(resource: &'static str, key: impl ToString) -> Self {
        AppError::NotFound { resource, key: key.to_string() }
    }

    pub fn already_exists(resource: &'static str, code: impl ToString) -> Self {
        AppError::AlreadyExists { resource, code: code.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound { .. } => ErrorKind::NotFound,

            AppError::AlreadyExists { .. }
            | AppError::SystemResourceImmutable(_)
            | AppError::RoleHasAssignedUsers(_) => ErrorKind::Conflict,

            AppError::ValidationError(_)
            | AppError::InvalidPermissionCode(_)
            | AppError::IllegalTransition { .. }
            | AppError::ReasonRequired(_)
            | AppError::StatusOutsideGroup { .. }
            | AppError::StatusGroupHasStatuses(_)
            | AppError::SourceUnitNotConfigured
            | AppError::TargetUnitNotConfigured
            | AppError::InvalidConversionFactor(_)
            | AppError::QuantityOutOfRange(_)
            | AppError::ItemNotInventoriable
            | AppError::CurrentPasswordIncorrect => ErrorKind::ValidationError,

            AppError::PermissionDenied(_) | AppError::RoleNotAllowed(_) => {
                ErrorKind::PermissionDenied
            }

            AppError::Unauthenticated | AppError::InvalidCredentials | AppError::InvalidToken => {
                ErrorKind::Unauthenticated
            }

            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => ErrorKind::Internal,
        }
    }

    /// Chave do catálogo de mensagens e os argumentos que preenchem os `{}`.
    fn message_key(&self) -> (&'static str, Vec<String>) {
        match self {
            AppError::ValidationError(_) => ("validation.invalid_fields", vec![]),
            AppError::NotFound { resource, key } => {
                ("error.not_found", vec![resource.to_string(), key.clone()])
            }
            AppError::AlreadyExists { resource, code } => {
                ("error.already_exists", vec![resource.to_string(), code.clone()])
            }
            AppError::SystemResourceImmutable(resource) => {
                ("error.system_immutable", vec![resource.to_string()])
            }
            AppError::RoleHasAssignedUsers(code) => ("error.role_has_users", vec![code.clone()]),
            AppError::InvalidPermissionCode(code) => {
                ("error.invalid_permission_code", vec![code.clone()])
            }
            AppError::IllegalTransition { from, to } => {
                ("workflow.illegal_transition", vec![from.clone(), to.clone()])
            }
            AppError::ReasonRequired(name) => ("workflow.reason_required", vec![name.clone()]),
            AppError::StatusOutsideGroup { status, group } => {
                ("workflow.status_outside_group", vec![status.clone(), group.clone()])
            }
            AppError::StatusGroupHasStatuses(code) => {
                ("workflow.group_has_statuses", vec![code.clone()])
            }
            AppError::SourceUnitNotConfigured => ("catalog.source_unit_not_configured", vec![]),
            AppError::TargetUnitNotConfigured => ("catalog.target_unit_not_configured", vec![]),
            AppError::InvalidConversionFactor(factor) => {
                ("catalog.invalid_factor", vec![factor.clone()])
            }
            AppError::QuantityOutOfRange(quantity) => {
                ("catalog.quantity_out_of_range", vec![quantity.clone()])
            }
            AppError::ItemNotInventoriable => ("catalog.item_not_inventoriable", vec![]),
            AppError::CurrentPasswordIncorrect => ("auth.current_password_incorrect", vec![]),
            AppError::PermissionDenied(missing) => {
                ("auth.permission_denied", vec![missing.join(", ")])
            }
            AppError::RoleNotAllowed(roles) => ("auth.role_not_allowed", vec![roles.join(", ")]),
            AppError::Unauthenticated => ("auth.unauthenticated", vec![]),
            AppError::InvalidCredentials => ("auth.invalid_credentials", vec![]),
            AppError::InvalidToken => ("auth.invalid_token", vec![]),
            _ => ("error.internal", vec![]),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            AppError::PermissionDenied(missing) => Some(json!({ "missingPermissions": missing })),
            AppError::RoleNotAllowed(roles) => Some(json!({ "allowedRoles": roles })),
            _ => None,
        }
    }

    /// Converte o erro de domínio na resposta HTTP, traduzida para o idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let kind = self.kind();

        if kind == ErrorKind::Internal {
            // O detalhe fica só no log; o cliente recebe a mensagem genérica.
            tracing::error!("Erro Interno do Servidor: {:?}", self);
        }

        let (key, args) = self.message_key();
        ApiError {
            status: kind.status(),
            kind,
            error: store.translate(&locale.0, key, &args),
            details: self.details(),
        }
    }
}

// A resposta de erro que sai para o cliente
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.error,
            "kind": self.kind,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

// Fora dos handlers (middlewares) não temos o Locale: usa o idioma padrão.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), I18nStore::embedded())
            .into_response()
    }
}

/// Converte violação de chave única em `AlreadyExists`; os demais erros seguem como `DatabaseError`.
pub(crate) fn conflict_on_unique<'a>(
    resource: &'static str,
    code: &'a str,
) -> impl FnOnce(sqlx::Error) -> AppError + 'a {
    move |e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return AppError::already_exists(resource, code);
            }
        }
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_status() {
        assert_eq!(AppError::not_found("Role", "X").kind().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::already_exists("Role", "X").kind().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::SystemResourceImmutable("Status").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::IllegalTransition { from: "A".into(), to: "B".into() }.kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            AppError::PermissionDenied(vec!["INV:x:y:z".into()]).kind().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Unauthenticated.kind().status(), StatusCode::UNAUTHORIZED);
        // senha atual errada não é falha de autenticação: a sessão continua válida
        assert_eq!(AppError::CurrentPasswordIncorrect.kind(), ErrorKind::ValidationError);
        assert_eq!(
            AppError::InternalServerError(anyhow::anyhow!("boom")).kind().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn permission_denied_names_missing_codes_without_internal_detail() {
        let err = AppError::PermissionDenied(vec!["INV:warehouses:delete:tenant".into()]);
        let api = err.to_api_error(&Locale("en".into()), I18nStore::embedded());

        assert_eq!(api.status, StatusCode::FORBIDDEN);
        assert!(api.error.contains("INV:warehouses:delete:tenant"));
        assert_eq!(
            api.details,
            Some(json!({ "missingPermissions": ["INV:warehouses:delete:tenant"] }))
        );
    }

    #[test]
    fn internal_errors_hide_the_cause() {
        let err = AppError::InternalServerError(anyhow::anyhow!("senha do banco: hunter2"));
        let api = err.to_api_error(&Locale("en".into()), I18nStore::embedded());
        assert!(!api.error.contains("hunter2"));
    }
}
