use axum::{
    extract::Request, http::StatusCode, response::IntoResponse, routing::get, Router,
    ServiceExt,
};
use futures::FutureExt;
use tower::Layer as _;
use tower_http::normalize_path::NormalizePathLayer;
use tracing::info;
use yamdb_app::{
    auth::{auth_router, token::TokenLayer},
    rest_api::{category, comment, genre, review, title},
    state::AppState,
    user::users_router,
};

use crate::{build_state, config::ServerConfig, error::Result};

pub const API_PREFIX: &str = "/api/v1";

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    run_with_state(args, state).await
}

pub async fn run_with_state(args: ServerConfig, state: AppState) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let mut app = main_router(state);

    if args.cors {
        app = app.layer(tower_http::cors::CorsLayer::very_permissive());
    }
    // Paths are accepted with and without trailing slash
    let app = NormalizePathLayer::trim_trailing_slash().layer(app);

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(feature = "openapi")]
fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::openapi::Components;

    #[derive(utoipa::OpenApi)]
    #[openapi(modifiers(&SecurityAddon), security(("bearer" = [])))]
    struct OpenApi;

    struct SecurityAddon;

    impl utoipa::Modify for SecurityAddon {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

            openapi
                .components
                .get_or_insert_with(Components::new)
                .add_security_scheme(
                    "bearer",
                    SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
                );
        }
    }

    use utoipa::OpenApi as _;
    OpenApi::openapi()
        .nest("/api/v1/auth", yamdb_app::auth::api_docs())
        .nest("/api/v1/categories", category::api_docs())
        .nest("/api/v1/genres", genre::api_docs())
        .nest("/api/v1/titles", title::api_docs())
        .nest("/api/v1/titles/{title_id}/reviews", review::api_docs())
        .nest(
            "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
            comment::api_docs(),
        )
        .nest("/api/v1/users", yamdb_app::user::api_docs())
}

fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_router())
        .nest("/categories", category::router())
        .nest("/genres", genre::router())
        .nest("/titles", title::router())
        .nest("/titles/{title_id}/reviews", review::router())
        .nest(
            "/titles/{title_id}/reviews/{review_id}/comments",
            comment::router(),
        )
        .nest("/users", users_router())
}

pub fn main_router(state: AppState) -> Router<()> {
    #[allow(unused_mut)]
    let mut router = Router::new()
        .nest(API_PREFIX, api_router())
        // Principal from bearer token is available to all API routes
        .layer(TokenLayer::new(state.clone()))
        .with_state(state)
        .route("/health", get(health));

    #[cfg(feature = "openapi")]
    {
        let docs = api_docs();
        router = router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs),
        );
    }
    router
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
