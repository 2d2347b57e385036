use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};
use tracing::{debug, info};

use crate::{
    AppState,
    api::models::{
        auth::{LoginRequest, MessageResponse, RegisterRequest, RegisterResponse, TokenResponse, WithCookies},
        users::{CurrentUser, UserResponse},
    },
    auth::{password, tokens::TokenPair},
    config::CookieConfig,
    db::{errors::DbError, models::users::UserCreateDBRequest},
    errors::Error,
    types::abbrev_uuid,
};

/// Register a new user account
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = RegisterResponse),
        (status = 400, description = "Invalid input or registration disabled"),
        (status = 409, description = "Username or email already taken"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), Error> {
    if !state.config.auth.native.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let username = request.username.trim();
    let email = request.email.trim();
    if username.is_empty() {
        return Err(Error::BadRequest {
            message: "Username must not be empty".to_string(),
        });
    }
    if !email.contains('@') {
        return Err(Error::BadRequest {
            message: "A valid email address is required".to_string(),
        });
    }

    // Validate password length
    let password_config = &state.config.auth.native.password;
    let password_length = request.password.chars().count();
    if password_length < password_config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", password_config.min_length),
        });
    }
    if password_length > password_config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", password_config.max_length),
        });
    }

    if state.store.find_identity_by_email(email).await?.is_some() {
        return Err(Error::DuplicateIdentity {
            field: "email".to_string(),
        });
    }
    if state.store.find_identity_by_username(username).await?.is_some() {
        return Err(Error::DuplicateIdentity {
            field: "username".to_string(),
        });
    }

    let password_hash = password::hash_password_blocking(request.password, password_config.into()).await?;

    let create_request = UserCreateDBRequest {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: Some(password_hash),
        is_superuser: false,
        permissions: state.config.auth.default_user_permissions.iter().copied().collect(),
    };

    // A concurrent registration can still win the race past the checks above
    let created_user = state
        .store
        .create_identity(&create_request)
        .await
        .map_err(|e| match e.conflicting_user_field() {
            Some(field) if e.is_user_conflict() => Error::DuplicateIdentity { field: field.to_string() },
            _ => Error::Database(e),
        })?;

    info!(user_id = %abbrev_uuid(&created_user.id), "Registered new user");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from(created_user),
            message: "Registration successful".to_string(),
        }),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful; tokens are also set as cookies", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<WithCookies<TokenResponse>, Error> {
    let user = state
        .store
        .find_identity_by_email(request.email.trim())
        .await?
        .ok_or(Error::InvalidCredentials)?;

    if !user.is_active {
        debug!(user_id = %abbrev_uuid(&user.id), "Login attempt for inactive user");
        return Err(Error::InvalidCredentials);
    }

    let user_id = user.id;
    let permissions = user.permissions.clone();
    if !password::verify_password_blocking(user, request.password).await? {
        return Err(Error::InvalidCredentials);
    }

    let pair = state.tokens.issue_pair(user_id, &permissions)?;
    info!(user_id = %abbrev_uuid(&user_id), "User logged in");

    Ok(session_response(pair, &state))
}

/// Trade the refresh token cookie for a new token pair
///
/// The refresh token used here stays valid until it expires.
#[utoipa::path(
    post,
    path = "/refresh",
    tag = "authentication",
    responses(
        (status = 200, description = "New tokens issued; also set as cookies", body = TokenResponse),
        (status = 401, description = "Missing, invalid or expired refresh token"),
    ),
    security(("RefreshCookie" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn refresh(State(state): State<AppState>, current_user: CurrentUser) -> Result<WithCookies<TokenResponse>, Error> {
    let pair = state.tokens.issue_pair(current_user.id, &current_user.permissions)?;
    debug!("Issued refreshed token pair");

    Ok(session_response(pair, &state))
}

/// Clear the token cookies
///
/// Tokens are not revoked; a copy of either stays valid until it expires.
#[utoipa::path(
    post,
    path = "/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Cookies cleared", body = MessageResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> WithCookies<MessageResponse> {
    let cookies = &state.config.auth.native.cookies;

    WithCookies {
        body: MessageResponse {
            message: "success".to_string(),
        },
        cookies: vec![
            token_cookie(&cookies.access_cookie_name, "", Duration::ZERO, cookies),
            token_cookie(&cookies.refresh_cookie_name, "", Duration::ZERO, cookies),
        ],
    }
}

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/user",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(("AccessCookie" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    let user = state
        .store
        .find_identity_by_id(current_user.id)
        .await?
        .ok_or(Error::Database(DbError::NotFound))?;

    Ok(Json(UserResponse::from(user)))
}

/// Token body plus cookies that expire together with the tokens
fn session_response(pair: TokenPair, state: &AppState) -> WithCookies<TokenResponse> {
    let cookies = &state.config.auth.native.cookies;

    WithCookies {
        cookies: vec![
            token_cookie(&cookies.access_cookie_name, &pair.access_token, state.tokens.access_ttl(), cookies),
            token_cookie(&cookies.refresh_cookie_name, &pair.refresh_token, state.tokens.refresh_ttl(), cookies),
        ],
        body: TokenResponse::from(pair),
    }
}

/// `Set-Cookie` value for a token. A zero `max_age` clears the cookie.
fn token_cookie(name: &str, value: &str, max_age: Duration, config: &CookieConfig) -> String {
    let secure = if config.secure { " Secure;" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly;{} SameSite={}; Max-Age={}",
        name,
        value,
        secure,
        config.same_site,
        max_age.as_secs()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::tokens::{AccessClaims, TokenCodec, TokenType},
        test_utils::{access_cookie, cookie_header, create_test_app, create_test_config, create_test_state, create_test_user, login, set_cookies},
        types::Capability,
    };
    use axum::http::{HeaderValue, header};
    use axum_test::TestServer;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    /// Both guarded surfaces must turn the cookie away
    async fn assert_access_cookie_rejected(server: &TestServer, cookie: HeaderValue) {
        server
            .get("/api/v1/user")
            .add_header(header::COOKIE, cookie.clone())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .post("/api/v1/articles/create")
            .add_header(header::COOKIE, cookie)
            .json(&json!({"title": "Hello", "description": "First post", "rating": 42.5, "type": "IT"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_token_cookie_format() {
        let config = CookieConfig::default();
        let cookie = token_cookie("accessToken", "abc", Duration::from_secs(900), &config);
        assert_eq!(cookie, "accessToken=abc; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=900");

        let insecure = CookieConfig {
            secure: false,
            same_site: "Strict".to_string(),
            ..Default::default()
        };
        let cookie = token_cookie("refreshToken", "", Duration::ZERO, &insecure);
        assert_eq!(cookie, "refreshToken=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0");
    }

    #[test_log::test(tokio::test)]
    async fn test_register_success() {
        let server = create_test_app(create_test_config());

        let response = server
            .post("/api/v1/register")
            .json(&json!({"username": "writer", "email": "writer@example.com", "password": "password123"}))
            .await;

        response.assert_status(StatusCode::CREATED);
        // Registration does not log the user in
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let body: RegisterResponse = response.json();
        assert_eq!(body.user.email, "writer@example.com");
        assert_eq!(body.message, "Registration successful");
        assert!(!body.user.is_superuser);
        assert!(body.user.permissions.contains(&Capability::AddArticle));
    }

    #[test_log::test(tokio::test)]
    async fn test_register_duplicate_email_creates_nothing() {
        let state = create_test_state(create_test_config());
        create_test_user(&state, "first", "taken@example.com", "password123", &[]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        let response = server
            .post("/api/v1/register")
            .json(&json!({"username": "second", "email": "taken@example.com", "password": "password123"}))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "duplicate_identity");
        assert!(state.store.find_identity_by_username("second").await.unwrap().is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_register_duplicate_username() {
        let state = create_test_state(create_test_config());
        create_test_user(&state, "writer", "one@example.com", "password123", &[]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        let response = server
            .post("/api/v1/register")
            .json(&json!({"username": "writer", "email": "two@example.com", "password": "password123"}))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "A user with this username already exists");
    }

    #[test_log::test(tokio::test)]
    async fn test_register_disabled() {
        let mut config = create_test_config();
        config.auth.native.allow_registration = false;
        let server = create_test_app(config);

        let response = server
            .post("/api/v1/register")
            .json(&json!({"username": "writer", "email": "writer@example.com", "password": "password123"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_register_password_validation() {
        let mut config = create_test_config();
        config.auth.native.password.min_length = 10;
        let server = create_test_app(config);

        let response = server
            .post("/api/v1/register")
            .json(&json!({"username": "writer", "email": "writer@example.com", "password": "short"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_login_sets_both_cookies() {
        let state = create_test_state(create_test_config());
        let user = create_test_user(&state, "writer", "writer@example.com", "password123", &[Capability::AddArticle]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        let response = server
            .post("/api/v1/login")
            .json(&json!({"email": "writer@example.com", "password": "password123"}))
            .await;

        response.assert_status_ok();

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("HttpOnly")));
        // Cookies live exactly as long as the tokens: 15 minutes and 7 days
        assert!(cookies.iter().any(|c| c.starts_with("accessToken=") && c.ends_with("Max-Age=900")));
        assert!(cookies.iter().any(|c| c.starts_with("refreshToken=") && c.ends_with("Max-Age=604800")));

        let body: TokenResponse = response.json();
        let (subject, permissions) = state.tokens.decode_access_token(&body.access_token).unwrap();
        assert_eq!(subject, user.id);
        assert!(permissions.contains(&Capability::AddArticle));
        assert_eq!(state.tokens.decode_refresh_token(&body.refresh_token).unwrap(), user.id);
    }

    #[test_log::test(tokio::test)]
    async fn test_login_wrong_password() {
        let state = create_test_state(create_test_config());
        create_test_user(&state, "writer", "writer@example.com", "password123", &[]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        let response = server
            .post("/api/v1/login")
            .json(&json!({"email": "writer@example.com", "password": "not-the-password"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid_credentials");
    }

    #[test_log::test(tokio::test)]
    async fn test_login_unknown_email() {
        let server = create_test_app(create_test_config());

        let response = server
            .post("/api/v1/login")
            .json(&json!({"email": "nobody@example.com", "password": "password123"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid_credentials");
    }

    #[test_log::test(tokio::test)]
    async fn test_login_inactive_user() {
        let state = create_test_state(create_test_config());
        let user = create_test_user(&state, "writer", "writer@example.com", "password123", &[]).await;
        state.store.deactivate_identity(user.id).await.unwrap();
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        let response = server
            .post("/api/v1/login")
            .json(&json!({"email": "writer@example.com", "password": "password123"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_get_current_user() {
        let state = create_test_state(create_test_config());
        create_test_user(&state, "writer", "writer@example.com", "password123", &[]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();
        let tokens = login(&server, "writer@example.com", "password123").await;

        let response = server
            .get("/api/v1/user")
            .add_header(header::COOKIE, cookie_header("accessToken", &tokens.access_token))
            .await;

        response.assert_status_ok();
        let body: UserResponse = response.json();
        assert_eq!(body.username, "writer");
    }

    #[test_log::test(tokio::test)]
    async fn test_get_current_user_requires_cookie() {
        let server = create_test_app(create_test_config());

        let response = server.get("/api/v1/user").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "unauthenticated");
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_token_is_not_an_access_token() {
        let state = create_test_state(create_test_config());
        create_test_user(&state, "writer", "writer@example.com", "password123", &[]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();
        let tokens = login(&server, "writer@example.com", "password123").await;

        let response = server
            .get("/api/v1/user")
            .add_header(header::COOKIE, cookie_header("accessToken", &tokens.refresh_token))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_issues_new_pair_and_keeps_old_token_valid() {
        let state = create_test_state(create_test_config());
        let user = create_test_user(&state, "writer", "writer@example.com", "password123", &[]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();
        let tokens = login(&server, "writer@example.com", "password123").await;

        let response = server
            .post("/api/v1/refresh")
            .add_header(header::COOKIE, cookie_header("refreshToken", &tokens.refresh_token))
            .await;
        response.assert_status_ok();
        assert_eq!(set_cookies(&response).len(), 2);

        let refreshed: TokenResponse = response.json();
        assert_eq!(state.tokens.decode_access_token(&refreshed.access_token).unwrap().0, user.id);

        // No rotation: the first refresh token still works
        let again = server
            .post("/api/v1/refresh")
            .add_header(header::COOKIE, cookie_header("refreshToken", &tokens.refresh_token))
            .await;
        again.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_picks_up_new_permissions() {
        let state = create_test_state(create_test_config());
        let user = create_test_user(&state, "writer", "writer@example.com", "password123", &[]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();
        let tokens = login(&server, "writer@example.com", "password123").await;

        let granted: BTreeSet<Capability> = [Capability::AddComment].into_iter().collect();
        state.store.set_permissions(user.id, &granted).await.unwrap();

        // The old access token keeps its snapshot
        let (_, old) = state.tokens.decode_access_token(&tokens.access_token).unwrap();
        assert!(old.is_empty());

        let response = server
            .post("/api/v1/refresh")
            .add_header(header::COOKIE, cookie_header("refreshToken", &tokens.refresh_token))
            .await;
        let refreshed: TokenResponse = response.json();
        let (_, new) = state.tokens.decode_access_token(&refreshed.access_token).unwrap();
        assert_eq!(new, granted);
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_rejects_access_token_and_missing_cookie() {
        let state = create_test_state(create_test_config());
        create_test_user(&state, "writer", "writer@example.com", "password123", &[]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();
        let tokens = login(&server, "writer@example.com", "password123").await;

        server.post("/api/v1/refresh").await.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/api/v1/refresh")
            .add_header(header::COOKIE, cookie_header("refreshToken", &tokens.access_token))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_for_deactivated_user_is_rejected() {
        let state = create_test_state(create_test_config());
        let user = create_test_user(&state, "writer", "writer@example.com", "password123", &[]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();
        let tokens = login(&server, "writer@example.com", "password123").await;

        state.store.deactivate_identity(user.id).await.unwrap();

        let response = server
            .post("/api/v1/refresh")
            .add_header(header::COOKIE, cookie_header("refreshToken", &tokens.refresh_token))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_clears_cookies() {
        let server = create_test_app(create_test_config());

        let response = server.post("/api/v1/logout").await;
        response.assert_status_ok();

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
        assert!(cookies.iter().any(|c| c.starts_with("accessToken=;")));
        assert!(cookies.iter().any(|c| c.starts_with("refreshToken=;")));

        let body: MessageResponse = response.json();
        assert_eq!(body.message, "success");
    }

    #[test_log::test(tokio::test)]
    async fn test_access_token_for_unknown_subject_is_rejected() {
        let state = create_test_state(create_test_config());
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        let token = state
            .tokens
            .issue_access_token(Uuid::new_v4(), &BTreeSet::from([Capability::AddArticle]))
            .unwrap();

        assert_access_cookie_rejected(&server, cookie_header("accessToken", &token)).await;
    }

    #[test_log::test(tokio::test)]
    async fn test_access_token_for_deactivated_user_is_rejected() {
        let state = create_test_state(create_test_config());
        let user = create_test_user(&state, "writer", "writer@example.com", "password123", &[Capability::AddArticle]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();
        let cookie = access_cookie(&state, &user);

        server.get("/api/v1/user").add_header(header::COOKIE, cookie.clone()).await.assert_status_ok();

        state.store.deactivate_identity(user.id).await.unwrap();
        assert_access_cookie_rejected(&server, cookie).await;
    }

    #[test_log::test(tokio::test)]
    async fn test_expired_access_token_is_rejected() {
        let state = create_test_state(create_test_config());
        let user = create_test_user(&state, "writer", "writer@example.com", "password123", &[Capability::AddArticle]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user.id.to_string(),
            permissions: user.permissions.clone(),
            token_type: TokenType::Access,
            iat: now - 3600,
            exp: now - 60,
        };
        let secret = state.config.secret_key.as_deref().unwrap();
        let token = jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();

        assert_access_cookie_rejected(&server, cookie_header("accessToken", &token)).await;
    }

    #[test_log::test(tokio::test)]
    async fn test_access_token_signed_with_another_secret_is_rejected() {
        let state = create_test_state(create_test_config());
        let user = create_test_user(&state, "writer", "writer@example.com", "password123", &[Capability::AddArticle]).await;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        let forger = TokenCodec::new(b"some-other-secret", Duration::from_secs(900), Duration::from_secs(3600));
        let token = forger.issue_access_token(user.id, &user.permissions).unwrap();

        assert_access_cookie_rejected(&server, cookie_header("accessToken", &token)).await;
    }
}
