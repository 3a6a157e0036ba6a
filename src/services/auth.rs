// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{RbacRepository, TenantRepository, UserRepository},
    models::auth::{AuthResponse, Claims, MeResponse, RegisterUserPayload, User},
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    tenant_repo: TenantRepository,
    rbac_repo: RbacRepository,
    jwt_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    pool: PgPool,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        tenant_repo: TenantRepository,
        rbac_repo: RbacRepository,
        jwt_secret: String,
        access_ttl: Duration,
        refresh_ttl: Duration,
        pool: PgPool,
    ) -> Self {
        Self { user_repo, tenant_repo, rbac_repo, jwt_secret, access_ttl, refresh_ttl, pool }
    }

    pub async fn login_user(
        &self,
        tenant_code: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, AppError> {
        // Tenant inexistente e senha errada dão a mesma resposta
        let tenant = self
            .tenant_repo
            .find_active_by_code(tenant_code)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let user = self
            .user_repo
            .find_by_email(tenant.id, email)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let mut tx = self.pool.begin().await?;
        let refresh_token = Uuid::new_v4().simple().to_string();
        self.user_repo
            .create_session(&mut *tx, user.id, &refresh_token, Utc::now() + self.refresh_ttl)
            .await?;
        self.user_repo.touch_last_login(&mut *tx, user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, tenant = %tenant.code, "login efetuado");

        Ok(AuthResponse {
            access_token: self.create_token(&user)?,
            refresh_token,
        })
    }

    /// Cadastro público de um usuário no tenant informado pelo código.
    /// O usuário nasce sem cargos: o acesso vem de quem administra o tenant.
    pub async fn register(&self, payload: RegisterUserPayload) -> Result<User, AppError> {
        let tenant = self
            .tenant_repo
            .find_active_by_code(&payload.tenant_code)
            .await?
            .ok_or_else(|| AppError::not_found("Tenant", &payload.tenant_code))?;

        let password_hash = hash_password(&payload.password).await?;
        let user = self
            .user_repo
            .create_user(
                &self.pool,
                tenant.id,
                &payload.email,
                &password_hash,
                &payload.first_name,
                &payload.last_name,
            )
            .await?;

        tracing::info!(user_id = %user.id, tenant = %tenant.code, "usuário cadastrado");
        Ok(user)
    }

    /// Troca um refresh token válido por um par novo; o antigo deixa de valer.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AppError> {
        let mut tx = self.pool.begin().await?;

        let session = self
            .user_repo
            .find_valid_session_for_update(&mut *tx, refresh_token)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let user = self
            .user_repo
            .find_by_id(session.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidToken)?;

        let new_refresh = Uuid::new_v4().simple().to_string();
        self.user_repo
            .rotate_session(&mut *tx, session.id, &new_refresh, Utc::now() + self.refresh_ttl)
            .await?;
        tx.commit().await?;

        Ok(AuthResponse {
            access_token: self.create_token(&user)?,
            refresh_token: new_refresh,
        })
    }

    /// Valida o access token e devolve o usuário e o tenant das claims.
    pub async fn validate_token(&self, token: &str) -> Result<(User, Uuid), AppError> {
        let claims = self.decode_token(token)?;

        let user = self
            .user_repo
            .find_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active && u.tenant_id == claims.tenant_id)
            .ok_or(AppError::InvalidToken)?;

        if !self.tenant_repo.is_active(claims.tenant_id).await? {
            return Err(AppError::InvalidToken);
        }

        Ok((user, claims.tenant_id))
    }

    pub async fn me(&self, user: User) -> Result<MeResponse, AppError> {
        let roles = self.rbac_repo.user_role_codes(&self.pool, user.id).await?;
        let permissions = self.rbac_repo.effective_permission_codes(&self.pool, user.id).await?;
        Ok(MeResponse {
            full_name: user.full_name(),
            user,
            roles,
            permissions,
        })
    }

    fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;
        Ok(token_data.claims)
    }

    fn create_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + self.access_ttl;

        let claims = Claims {
            sub: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        // Usa '?' para um tratamento de erro mais limpo
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

/// Verificação bcrypt em um thread separado.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password_clone = password.to_owned();
    let password_hash_clone = password_hash.to_owned();
    let is_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
    Ok(is_valid)
}

/// Hash bcrypt fora do runtime assíncrono.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password_clone = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service(secret: &str) -> AuthService {
        // Pool preguiçoso: nenhum teste abaixo toca o banco
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        AuthService::new(
            UserRepository::new(pool.clone()),
            TenantRepository::new(pool.clone()),
            RbacRepository::new(pool.clone()),
            secret.to_string(),
            Duration::minutes(15),
            Duration::days(7),
            pool,
        )
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "admin@sunset.com".into(),
            password_hash: String::new(),
            first_name: "Ana".into(),
            last_name: "Souza".into(),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn token_round_trip_carries_user_and_tenant() {
        let svc = service("segredo");
        let user = user();
        let token = svc.create_token(&user).unwrap();

        let claims = svc.decode_token(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.tenant_id, user.tenant_id);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let token = service("a").create_token(&user()).unwrap();
        assert!(matches!(service("b").decode_token(&token), Err(AppError::InvalidToken)));
        assert!(matches!(service("a").decode_token("lixo"), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hashed = hash_password("s3nha-forte").await.unwrap();
        assert!(verify_password("s3nha-forte", &hashed).await.unwrap());
        assert!(!verify_password("outra", &hashed).await.unwrap());
    }
}
