//! API request/response models for users.

use std::collections::BTreeSet;

use crate::db::models::users::UserDBResponse;
use crate::types::{Capability, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated caller, as resolved by the auth middleware.
///
/// `permissions` is the snapshot carried by the access token; the superuser
/// flag comes from the store at request time.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_superuser: bool,
    pub permissions: BTreeSet<Capability>,
}

impl CurrentUser {
    pub fn from_identity(db: UserDBResponse, permissions: BTreeSet<Capability>) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            is_superuser: db.is_superuser,
            permissions,
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.permissions.contains(&capability)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_superuser: bool,
    pub is_active: bool,
    pub permissions: BTreeSet<Capability>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            is_superuser: db.is_superuser,
            is_active: db.is_active,
            permissions: db.permissions,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
