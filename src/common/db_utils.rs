// src/common/db_utils.rs

use sqlx::pool::PoolConnection;
use sqlx::Postgres;

use crate::common::error::AppError;
use crate::config::AppState;
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::tenancy::TenantContext;

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
/// Adquire uma conexão da pool e define as variáveis RLS da requisição.
/// Valem para a sessão inteira (não só para a próxima transação), porque os
/// serviços abrem e fecham várias transações na mesma conexão.
pub(crate) async fn get_rls_connection(
    app_state: &AppState,
    tenant_ctx: &TenantContext,
    user: &AuthenticatedUser,
) -> Result<PoolConnection<Postgres>, AppError> {
    // 1. Adquire conexão
    let mut conn = app_state.db_pool.acquire().await?;

    // 2. Define Tenant ID e User ID numa ida só
    sqlx::query("SELECT set_config('app.tenant_id', $1, false), set_config('app.user_id', $2, false)")
        .bind(tenant_ctx.0.to_string())
        .bind(user.0.id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(conn)
}

// Banco real para testes de serviço/repositório. Cada teste roda numa transação
// descartada no drop. Sem DATABASE_URL acessível o teste é pulado.
#[cfg(test)]
pub(crate) mod test_db {
    use sqlx::{postgres::PgPoolOptions, PgConnection, Postgres, Transaction};
    use uuid::Uuid;

    pub(crate) async fn transaction() -> Option<Transaction<'static, Postgres>> {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = match PgPoolOptions::new().max_connections(1).connect(&url).await {
            Ok(pool) => pool,
            Err(e) => {
                eprintln!("banco de testes indisponível ({e}); teste pulado");
                return None;
            }
        };
        sqlx::migrate!().run(&pool).await.expect("migrações do banco de testes");
        Some(pool.begin().await.expect("transação de teste"))
    }

    pub(crate) fn unique_code(prefix: &str) -> String {
        format!("{prefix}_{}", Uuid::new_v4().simple()).to_uppercase()
    }

    pub(crate) async fn tenant(conn: &mut PgConnection) -> Uuid {
        let code = unique_code("T");
        sqlx::query_scalar("INSERT INTO tenants (code, name) VALUES ($1, $1) RETURNING id")
            .bind(&code)
            .fetch_one(conn)
            .await
            .expect("tenant de teste")
    }
}
