//! Route guards.
//!
//! Both guards are plain `from_fn_with_state` middleware and are composed onto
//! the protected routes with `route_layer`. A rejected request never reaches
//! the handler.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument};

use crate::{
    AppState,
    auth::current_user::{cookie_value, resolve_identity},
    errors::Error,
};

/// Require a valid access token cookie.
///
/// The caller gets the permission snapshot embedded in the token.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn require_access_token(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, Error> {
    let cookie_name = &state.config.auth.native.cookies.access_cookie_name;
    let token = cookie_value(request.headers(), cookie_name).ok_or_else(|| {
        debug!("No access token cookie");
        Error::Unauthenticated { message: None }
    })?;

    let (user_id, permissions) = state.tokens.decode_access_token(token).map_err(|e| {
        debug!("Rejected access token: {e}");
        Error::Unauthenticated { message: None }
    })?;

    let user = resolve_identity(&state, user_id, Some(permissions)).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Require a valid refresh token cookie.
///
/// Refresh tokens carry no permissions, so the caller gets the current set from the store.
#[instrument(skip_all)]
pub async fn require_refresh_token(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, Error> {
    let cookie_name = &state.config.auth.native.cookies.refresh_cookie_name;
    let token = cookie_value(request.headers(), cookie_name).ok_or_else(|| {
        debug!("No refresh token cookie");
        Error::Unauthenticated { message: None }
    })?;

    let user_id = state.tokens.decode_refresh_token(token).map_err(|e| {
        debug!("Rejected refresh token: {e}");
        Error::Unauthenticated { message: None }
    })?;

    let user = resolve_identity(&state, user_id, None).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
