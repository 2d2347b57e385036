//! Test utilities for integration testing (available with `test-utils` feature).

use std::sync::Arc;

use axum::http::{HeaderValue, header};
use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use serde_json::json;

use crate::{
    AppState,
    api::models::auth::TokenResponse,
    auth::{
        password::{self, Argon2Params},
        tokens::TokenCodec,
    },
    config::Config,
    db::{
        memory::MemoryStore,
        models::{
            articles::{ArticleCreateDBRequest, ArticleDBResponse, ArticleType},
            comments::{CommentCreateDBRequest, CommentDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    types::{ArticleId, Capability, UserId},
};

/// Config for tests: a fixed secret, plain-HTTP cookies and cheap Argon2.
pub fn create_test_config() -> Config {
    let mut config = Config {
        secret_key: Some("test-secret-key-for-scribe".to_string()),
        ..Default::default()
    };
    config.auth.native.cookies.secure = false;
    config.auth.native.password.argon2_memory_kib = 1024;
    config.auth.native.password.argon2_iterations = 1;
    config
}

/// State over a fresh in-memory store.
pub fn create_test_state(config: Config) -> AppState {
    let tokens = TokenCodec::from_config(&config).expect("test config has a secret");
    AppState::builder()
        .store(Arc::new(MemoryStore::new()))
        .config(config)
        .tokens(Arc::new(tokens))
        .build()
}

pub fn create_test_app(config: Config) -> TestServer {
    let state = create_test_state(config);
    TestServer::new(crate::build_router(&state).expect("Failed to build router")).expect("Failed to create test server")
}

pub async fn create_test_user(state: &AppState, username: &str, email: &str, password: &str, permissions: &[Capability]) -> UserDBResponse {
    let password_hash = password::hash_password_with_params(password, Some(Argon2Params::from(&state.config.auth.native.password)))
        .expect("Failed to hash test password");

    state
        .store
        .create_identity(&UserCreateDBRequest {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some(password_hash),
            is_superuser: false,
            permissions: permissions.iter().copied().collect(),
        })
        .await
        .expect("Failed to create test user")
}

/// Log in through the API and return the issued tokens.
pub async fn login(server: &TestServer, email: &str, password: &str) -> TokenResponse {
    let response = server.post("/api/v1/login").json(&json!({"email": email, "password": password})).await;
    response.assert_status_ok();
    response.json()
}

/// A `Cookie` header carrying a single cookie.
pub fn cookie_header(name: &str, value: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{name}={value}")).expect("Invalid cookie header")
}

/// Access token cookie for `user`, minted directly with the user's stored permissions.
pub fn access_cookie(state: &AppState, user: &UserDBResponse) -> HeaderValue {
    let token = state
        .tokens
        .issue_access_token(user.id, &user.permissions)
        .expect("Failed to issue test token");
    cookie_header(&state.config.auth.native.cookies.access_cookie_name, &token)
}

/// All `Set-Cookie` header values of a response.
pub fn set_cookies(response: &TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().expect("Non-ASCII Set-Cookie").to_string())
        .collect()
}

pub async fn create_test_article(state: &AppState, author_id: Option<UserId>, title: &str) -> ArticleDBResponse {
    state
        .store
        .create_article(&ArticleCreateDBRequest {
            title: title.to_string(),
            description: format!("About {title}"),
            creation_date: Utc::now(),
            rating: 50.0,
            article_type: ArticleType::InformationSecurity,
            author_id,
        })
        .await
        .expect("Failed to create test article")
}

pub async fn create_test_comment(state: &AppState, article_id: ArticleId, author_id: Option<UserId>, content: &str) -> CommentDBResponse {
    state
        .store
        .create_comment(&CommentCreateDBRequest {
            article_id,
            author_id,
            content: content.to_string(),
        })
        .await
        .expect("Failed to create test comment")
}
