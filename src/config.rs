// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{CatalogRepository, RbacRepository, StatusRepository, TenantRepository, UserRepository},
    services::{
        auth::AuthService, catalog_service::CatalogService, rbac_service::RbacService,
        status_service::StatusService, user_service::UserService,
    },
};

/// Tenant e administrador criados na inicialização, se configurados.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub tenant_code: String,
    pub tenant_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub max_connections: u32,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub bootstrap: Option<BootstrapConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 5)?;
        let access_minutes = parse_var("ACCESS_TOKEN_TTL_MINUTES", 15)?;
        let refresh_days = parse_var("REFRESH_TOKEN_TTL_DAYS", 7)?;

        // Bootstrap só acontece com as quatro variáveis presentes
        let bootstrap = match (
            env::var("BOOTSTRAP_TENANT_CODE"),
            env::var("BOOTSTRAP_ADMIN_EMAIL"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(tenant_code), Ok(admin_email), Ok(admin_password)) => Some(BootstrapConfig {
                tenant_name: env::var("BOOTSTRAP_TENANT_NAME").unwrap_or_else(|_| tenant_code.clone()),
                tenant_code,
                admin_email,
                admin_password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            server_addr,
            max_connections,
            access_token_ttl: chrono::Duration::minutes(access_minutes),
            refresh_token_ttl: chrono::Duration::days(refresh_days),
            bootstrap,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("{name} inválida: {raw}")),
        Err(_) => Ok(default),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub i18n_store: Arc<I18nStore>,

    pub rbac_repo: RbacRepository,

    pub auth_service: AuthService,
    pub rbac_service: RbacService,
    pub user_service: UserService,
    pub status_service: StatusService,
    pub catalog_service: CatalogService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::with_pool(db_pool, config))
    }

    /// Monta o gráfico de dependências sobre uma pool já criada.
    pub fn with_pool(db_pool: PgPool, config: Config) -> Self {
        let user_repo = UserRepository::new(db_pool.clone());
        let tenant_repo = TenantRepository::new(db_pool.clone());
        let rbac_repo = RbacRepository::new(db_pool.clone());

        let auth_service = AuthService::new(
            user_repo.clone(),
            tenant_repo,
            rbac_repo.clone(),
            config.jwt_secret.clone(),
            config.access_token_ttl,
            config.refresh_token_ttl,
            db_pool.clone(),
        );
        let rbac_service = RbacService::new(rbac_repo.clone());
        let user_service = UserService::new(user_repo, rbac_repo.clone(), rbac_service.clone());
        let status_service = StatusService::new(StatusRepository::new());
        let catalog_service = CatalogService::new(CatalogRepository::new());

        Self {
            db_pool,
            config: Arc::new(config),
            i18n_store: Arc::new(I18nStore::embedded().clone()),
            rbac_repo,
            auth_service,
            rbac_service,
            user_service,
            status_service,
            catalog_service,
        }
    }
}
