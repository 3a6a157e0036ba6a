// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

pub fn build_router(app_state: AppState) -> Router {
    // Define as rotas públicas
    let public_routes = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/refresh", post(handlers::auth::refresh));

    let user_routes = Router::new()
        .route("/", post(handlers::users::create_user).get(handlers::users::list_users))
        .route(
            "/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/{id}/change-password", post(handlers::users::change_password))
        .route("/{id}/roles", put(handlers::users::assign_roles))
        .route(
            "/{id}/permissions",
            get(handlers::users::get_effective_permissions).put(handlers::users::assign_permissions),
        );

    let rbac_routes = Router::new()
        .route(
            "/permissions",
            post(handlers::rbac::create_permission).get(handlers::rbac::list_permissions),
        )
        .route("/permissions/module/{module}", get(handlers::rbac::list_permissions_by_module))
        .route(
            "/permissions/{id}",
            get(handlers::rbac::get_permission)
                .put(handlers::rbac::update_permission)
                .delete(handlers::rbac::delete_permission),
        )
        .route("/roles", post(handlers::rbac::create_role).get(handlers::rbac::list_roles))
        .route(
            "/roles/{id}",
            get(handlers::rbac::get_role)
                .put(handlers::rbac::update_role)
                .delete(handlers::rbac::delete_role),
        )
        .route("/roles/{id}/permissions", put(handlers::rbac::assign_role_permissions));

    let status_routes = Router::new()
        .route("/groups", post(handlers::status::create_group).get(handlers::status::list_groups))
        .route(
            "/groups/{code}",
            get(handlers::status::get_group)
                .put(handlers::status::update_group)
                .delete(handlers::status::delete_group),
        )
        .route(
            "/groups/{code}/statuses",
            post(handlers::status::create_status).get(handlers::status::list_statuses),
        )
        .route(
            "/groups/{code}/statuses/{status_code}",
            put(handlers::status::update_status).delete(handlers::status::delete_status),
        )
        .route(
            "/groups/{code}/statuses/{status_code}/next",
            get(handlers::status::next_transitions),
        )
        .route(
            "/groups/{code}/transitions",
            post(handlers::status::create_transition).get(handlers::status::list_transitions),
        )
        .route("/groups/{code}/transitions/apply", post(handlers::status::apply_transition))
        .route(
            "/groups/{code}/transitions/{id}",
            put(handlers::status::update_transition).delete(handlers::status::delete_transition),
        );

    let catalog_routes = Router::new()
        .route("/unit-categories", get(handlers::catalog::list_unit_categories))
        .route("/units", get(handlers::catalog::list_units))
        .route("/items", post(handlers::catalog::create_item))
        .route("/items/{id}", get(handlers::catalog::get_item))
        .route(
            "/items/{id}/conversions",
            post(handlers::catalog::add_conversion).get(handlers::catalog::list_conversions),
        )
        .route(
            "/items/{id}/conversions/{conversion_id}",
            axum::routing::delete(handlers::catalog::remove_conversion),
        )
        .route(
            "/items/{id}/conversions/{conversion_id}/default",
            put(handlers::catalog::set_default_conversion),
        )
        .route("/items/{id}/convert", post(handlers::catalog::convert_quantity))
        .route("/items/{id}/stock", get(handlers::catalog::stock_in_all_units));

    // Tudo abaixo exige bearer token; o tenant sai das claims
    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::get_me))
        .nest("/api/users", user_routes)
        .nest("/api/rbac", rbac_routes)
        .nest("/api/status", status_routes)
        .nest("/api/catalog", catalog_routes)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    // Pool preguiçoso: as rotas testadas aqui respondem antes de tocar o banco
    fn app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let config = Config {
            database_url: "postgres://localhost/unused".into(),
            jwt_secret: "segredo-de-teste".into(),
            server_addr: "127.0.0.1:0".into(),
            max_connections: 1,
            access_token_ttl: chrono::Duration::minutes(15),
            refresh_token_ttl: chrono::Duration::days(7),
            bootstrap: None,
        };
        build_router(AppState::with_pool(pool, config))
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_without_bearer_is_unauthorized() {
        let response = app()
            .oneshot(Request::get("/api/status/groups").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let request = Request::get("/api/auth/me")
            .header(header::AUTHORIZATION, "Bearer nao-e-um-jwt")
            .header(header::ACCEPT_LANGUAGE, "pt-BR")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_is_public_and_validates_before_the_database() {
        let body = serde_json::json!({
            "tenantCode": "SUNSET",
            "email": "nao-e-email",
            "password": "curta",
            "firstName": "Ana",
            "lastName": "Souza"
        });
        let request = Request::post("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn user_management_routes_require_a_bearer() {
        for (method, uri) in [
            ("GET", "/api/users"),
            ("DELETE", "/api/users/00000000-0000-0000-0000-000000000001"),
            ("POST", "/api/users/00000000-0000-0000-0000-000000000001/change-password"),
        ] {
            let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
            let response = app().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let response = app()
            .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
