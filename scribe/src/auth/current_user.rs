//! Request-side authentication helpers.
//!
//! The [`require_access_token`](super::middleware::require_access_token) and
//! [`require_refresh_token`](super::middleware::require_refresh_token)
//! middleware resolve the caller once per request and stash a [`CurrentUser`]
//! in the request extensions. Handlers pick it up with the extractor below.

use std::collections::BTreeSet;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{Error, Result},
    types::{Capability, UserId, abbrev_uuid},
};

/// Value of the named cookie, if the request carries it.
///
/// Empty values (a cleared cookie) are skipped, so a later non-empty cookie
/// of the same name still wins.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(cookie_name, value)| *cookie_name == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Turn a decoded token subject into the caller.
///
/// Unknown and inactive identities are rejected as unauthenticated. The
/// permission set comes from the caller: the token snapshot for access
/// tokens, a fresh store read for refresh.
#[instrument(skip(state, permissions), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub(crate) async fn resolve_identity(state: &AppState, user_id: UserId, permissions: Option<BTreeSet<Capability>>) -> Result<CurrentUser> {
    let identity = match state.store.find_identity_by_id(user_id).await? {
        Some(identity) if identity.is_active => identity,
        Some(_) => {
            debug!("Token subject is inactive");
            return Err(Error::Unauthenticated { message: None });
        }
        None => {
            debug!("Token subject does not exist");
            return Err(Error::Unauthenticated { message: None });
        }
    };

    let permissions = match permissions {
        Some(permissions) => permissions,
        None => state.store.get_permissions(user_id).await?,
    };

    trace!(is_superuser = identity.is_superuser, "Resolved caller");
    Ok(CurrentUser::from_identity(identity, permissions))
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(Error::Unauthenticated { message: None })
    }
}
