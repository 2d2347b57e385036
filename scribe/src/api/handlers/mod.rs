//! HTTP request handlers for all API endpoints.
//!
//! - [`auth`]: registration, login, token refresh, logout and the current user
//! - [`articles`]: article listing, detail, create, edit, delete and comments
//!
//! # Authentication
//!
//! Handlers that take a [`CurrentUser`](crate::api::models::users::CurrentUser)
//! sit behind one of the guards in [`crate::auth::middleware`]; the guard has
//! already rejected the request if no valid token cookie was sent.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts to the matching
//! status code and a JSON `{"error", "message"}` body.

pub mod articles;
pub mod auth;

/// Liveness probe
pub async fn healthz() -> &'static str {
    "OK"
}
