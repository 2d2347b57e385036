//! # scribe: blog backend
//!
//! `scribe` serves a small blog API: public article listing and detail,
//! authenticated article writes and comments, and cookie-based JWT
//! authentication with access and refresh tokens.
//!
//! ## Architecture
//!
//! The crate is an Axum application over a pluggable store:
//!
//! - **[`api`]**: route handlers and request/response models
//! - **[`auth`]**: token codec, password hashing, route guards and the
//!   resource authorization policy
//! - **[`db`]**: the [`BlogStore`](db::store::BlogStore) trait with a
//!   PostgreSQL implementation and an in-memory one
//! - **[`config`]**: YAML + environment configuration via figment
//! - **[`openapi`]**: generated OpenAPI document, served at `/docs`
//! - **[`telemetry`]**: console logging and optional OTLP export
//!
//! ### Request flow
//!
//! A request to a protected route passes through
//! [`require_access_token`](auth::middleware::require_access_token), which
//! reads the access token cookie, verifies it and loads the user. The handler
//! receives a [`CurrentUser`](api::models::users::CurrentUser), loads the
//! target resource and asks [`auth::permissions`] whether the caller may act
//! on it. Errors convert to JSON bodies through [`errors::Error`].
//!
//! ### Soft delete
//!
//! Articles and comments are never removed. Deleting an article flips its
//! `is_active` flag and that of all its comments in one store operation;
//! inactive records are invisible to every read endpoint.
//!
//! ## Quick start
//!
//! ```bash
//! SCRIBE_SECRET_KEY=change-me \
//! SCRIBE_ADMIN_EMAIL=admin@example.com SCRIBE_ADMIN_PASSWORD=change-me-too \
//! cargo run
//! ```
//!
//! Without `DATABASE_URL` (or `database.type: external`) the server runs on
//! the in-memory store.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    http::{self, HeaderValue},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use crate::{
    api::handlers::{articles, auth as auth_handlers, healthz},
    auth::{
        middleware::{require_access_token, require_refresh_token},
        password::{self, Argon2Params},
        tokens::TokenCodec,
    },
    config::{CorsOrigin, DatabaseConfig},
    db::{
        memory::MemoryStore,
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
        store::{BlogStore, PostgresStore},
    },
    openapi::ApiDoc,
    types::{Capability, UserId, abbrev_uuid},
};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .store(Arc::new(MemoryStore::new()))
///     .tokens(Arc::new(TokenCodec::from_config(&config)?))
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub store: Arc<dyn BlogStore>,
    pub config: Config,
    pub tokens: Arc<TokenCodec>,
}

/// Get the scribe database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Ensure the configured superuser exists.
///
/// Idempotent. An existing user with `admin_email` is promoted to superuser
/// and, when `admin_password` is set, gets that password. Returns `None` when
/// no `admin_email` is configured.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(store: &dyn BlogStore, config: &Config) -> anyhow::Result<Option<UserId>> {
    let Some(email) = config.admin_email.as_deref() else {
        debug!("No admin_email configured, skipping admin bootstrap");
        return Ok(None);
    };

    let password_hash = match config.admin_password.clone() {
        Some(pwd) => Some(
            password::hash_password_blocking(pwd, Argon2Params::from(&config.auth.native.password))
                .await
                .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?,
        ),
        None => None,
    };

    if let Some(existing) = store.find_identity_by_email(email).await? {
        store
            .update_identity(
                existing.id,
                &UserUpdateDBRequest {
                    password_hash,
                    is_superuser: Some(true),
                },
            )
            .await?;
        info!(user_id = %abbrev_uuid(&existing.id), "Admin user already exists");
        return Ok(Some(existing.id));
    }

    let created = store
        .create_identity(&UserCreateDBRequest {
            username: config.admin_username.clone(),
            email: email.to_string(),
            password_hash,
            is_superuser: true,
            permissions: Capability::ALL.into_iter().collect(),
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create admin user: {e}"))?;

    info!(user_id = %abbrev_uuid(&created.id), "Created admin user");
    Ok(Some(created.id))
}

/// Connect the configured store, running migrations for PostgreSQL.
#[instrument(skip_all)]
pub async fn setup_store(config: &Config) -> anyhow::Result<Arc<dyn BlogStore>> {
    let store: Arc<dyn BlogStore> = match &config.database {
        DatabaseConfig::External { url, max_connections } => {
            info!("Connecting to external database");
            let pool = PgPoolOptions::new().max_connections(*max_connections).connect(url).await?;
            migrator().run(&pool).await?;
            Arc::new(PostgresStore::new(pool))
        }
        DatabaseConfig::InMemory => {
            info!("Using in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    create_initial_admin_user(store.as_ref(), config).await?;

    Ok(store)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// The API lives under `/api/v1`. Protected routes sit behind the access
/// token guard, `/refresh` behind the refresh token guard. Everything else
/// is public.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let protected = Router::new()
        .route("/user", get(auth_handlers::get_current_user))
        .route("/articles/create", post(articles::create_article))
        .route("/articles/edit/{id}", patch(articles::edit_article))
        .route("/articles/delete/{id}", delete(articles::delete_article))
        .route("/articles/{id}/comments", post(articles::create_comment))
        .route_layer(from_fn_with_state(state.clone(), require_access_token));

    let refresh = Router::new()
        .route("/refresh", post(auth_handlers::refresh))
        .route_layer(from_fn_with_state(state.clone(), require_refresh_token));

    let public = Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/logout", post(auth_handlers::logout))
        .route("/articles", get(articles::list_articles))
        .route("/articles/{id}", get(articles::get_article));

    let api = Router::new().merge(public).merge(protected).merge(refresh);

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .nest("/api/v1", api)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// A configured server, ready to bind.
///
/// 1. [`Application::new`] connects the store, bootstraps the admin user and builds the router
/// 2. [`Application::serve`] binds and serves until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting scribe with configuration: {:#?}", config);

        let store = setup_store(&config).await?;
        Self::with_store(config, store)
    }

    /// Build around an existing store. No admin bootstrap is done.
    pub fn with_store(config: Config, store: Arc<dyn BlogStore>) -> anyhow::Result<Self> {
        let tokens = TokenCodec::from_config(&config)?;
        let state = AppState::builder()
            .store(store)
            .config(config.clone())
            .tokens(Arc::new(tokens))
            .build();

        let router = build_router(&state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("scribe listening on http://{}, docs at http://localhost:{}/docs", bind_addr, self.config.port);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        auth::password::verify_password,
        test_utils::{create_test_config, create_test_state},
    };
    use axum::http::{StatusCode, header};

    fn admin_config() -> Config {
        let mut config = create_test_config();
        config.admin_email = Some("admin@example.com".to_string());
        config.admin_password = Some("bootstrap-password".to_string());
        config
    }

    #[test_log::test(tokio::test)]
    async fn test_create_initial_admin_user_new_user() {
        let store = MemoryStore::new();
        let config = admin_config();

        let user_id = create_initial_admin_user(&store, &config).await.unwrap().unwrap();

        let admin = store.find_identity_by_id(user_id).await.unwrap().unwrap();
        assert!(admin.is_superuser);
        assert_eq!(admin.username, "admin");
        assert_eq!(admin.permissions.len(), Capability::ALL.len());
        assert!(verify_password(&admin, "bootstrap-password").unwrap());
    }

    #[test_log::test(tokio::test)]
    async fn test_create_initial_admin_user_is_idempotent() {
        let store = MemoryStore::new();
        let mut config = admin_config();

        let first = create_initial_admin_user(&store, &config).await.unwrap();
        config.admin_password = Some("rotated-password".to_string());
        let second = create_initial_admin_user(&store, &config).await.unwrap();

        assert_eq!(first, second);
        let admin = store.find_identity_by_email("admin@example.com").await.unwrap().unwrap();
        assert!(verify_password(&admin, "rotated-password").unwrap());
    }

    #[test_log::test(tokio::test)]
    async fn test_admin_bootstrap_skipped_without_email() {
        let store = MemoryStore::new();
        assert_eq!(create_initial_admin_user(&store, &create_test_config()).await.unwrap(), None);
    }

    #[test_log::test(tokio::test)]
    async fn test_application_serves_health_and_docs() {
        let server = Application::with_store(create_test_config(), Arc::new(MemoryStore::new()))
            .unwrap()
            .into_test_server();

        server.get("/healthz").await.assert_status_ok();

        let response = server.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/articles"].is_object());
    }

    #[test_log::test(tokio::test)]
    async fn test_bootstrapped_admin_can_log_in() {
        let config = admin_config();
        let store: Arc<dyn BlogStore> = Arc::new(MemoryStore::new());
        create_initial_admin_user(store.as_ref(), &config).await.unwrap();
        let server = Application::with_store(config, store).unwrap().into_test_server();

        let response = server
            .post("/api/v1/login")
            .json(&serde_json::json!({"email": "admin@example.com", "password": "bootstrap-password"}))
            .await;

        response.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_cors_preflight_allows_configured_origin() {
        let state = create_test_state(create_test_config());
        let server = axum_test::TestServer::new(build_router(&state).unwrap()).unwrap();

        let response = server
            .method(http::Method::OPTIONS, "/api/v1/articles")
            .add_header(header::ORIGIN, HeaderValue::from_static("http://localhost:3000"))
            .add_header(header::ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("POST"))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
    }
}
