//! Authentication and authorization.
//!
//! # Tokens
//!
//! Login issues two HS256 JWTs, both delivered as HttpOnly cookies and in the
//! response body:
//!
//! - an **access token** (`accessToken` cookie) carrying the user id and a
//!   snapshot of the user's capabilities, valid for
//!   `auth.security.access_token_expiry`;
//! - a **refresh token** (`refreshToken` cookie) carrying only the user id,
//!   valid for `auth.security.refresh_token_expiry`, which `/refresh` trades
//!   for a new pair.
//!
//! Tokens are stateless. Logout clears the cookies but a copied token stays
//! valid until it expires, and refreshing does not invalidate the old refresh
//! token.
//!
//! # Authorization
//!
//! Protected routes are wrapped in [`middleware::require_access_token`], which
//! resolves the caller into a [`CurrentUser`](crate::api::models::users::CurrentUser).
//! Handlers then ask [`permissions`] whether that caller may create or mutate
//! the target resource.
//!
//! ```ignore
//! use scribe::{api::models::users::CurrentUser, auth::permissions};
//!
//! async fn edit(current_user: CurrentUser, /* .. */) -> Result<Json<ArticleResponse>> {
//!     let article = /* load */;
//!     permissions::can_mutate(&current_user, Operation::Update, Resource::Articles, &article)?;
//!     // ...
//! }
//! ```
//!
//! # Modules
//!
//! - [`tokens`]: token codec
//! - [`password`]: Argon2 hashing and verification
//! - [`middleware`]: route guards
//! - [`current_user`]: cookie parsing and the `CurrentUser` extractor
//! - [`permissions`]: the authorization policy

pub mod current_user;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod tokens;
