//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, ArticleId, CommentId)
//! - The [`Capability`] enum carried in access tokens and stored per user
//! - Resource and operation enums used by the authorization policy
//!
//! # Capabilities
//!
//! Capabilities are granted per user and snapshotted into every access token.
//! They are a closed set: a codename that is not listed here cannot be
//! granted, serialized into a token, or parsed back out of storage.
//!
//! ```ignore
//! use scribe::types::{Capability, Operation, Resource};
//!
//! let required = Capability::required_for(Resource::Articles, Operation::Update);
//! assert_eq!(required, Capability::ChangeArticle);
//! ```

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type ArticleId = Uuid;
pub type CommentId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Mutations the policy layer reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Articles,
    Comments,
}

/// A single grantable permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    AddArticle,
    ChangeArticle,
    DeleteArticle,
    ViewArticle,
    AddComment,
    ChangeComment,
    DeleteComment,
    ViewComment,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::AddArticle,
        Capability::ChangeArticle,
        Capability::DeleteArticle,
        Capability::ViewArticle,
        Capability::AddComment,
        Capability::ChangeComment,
        Capability::DeleteComment,
        Capability::ViewComment,
    ];

    /// Storage and wire codename, e.g. `add_article`.
    pub fn codename(&self) -> &'static str {
        match self {
            Capability::AddArticle => "add_article",
            Capability::ChangeArticle => "change_article",
            Capability::DeleteArticle => "delete_article",
            Capability::ViewArticle => "view_article",
            Capability::AddComment => "add_comment",
            Capability::ChangeComment => "change_comment",
            Capability::DeleteComment => "delete_comment",
            Capability::ViewComment => "view_comment",
        }
    }

    /// The capability a non-superuser needs to perform `operation` on `resource`.
    pub fn required_for(resource: Resource, operation: Operation) -> Self {
        match (resource, operation) {
            (Resource::Articles, Operation::Create) => Capability::AddArticle,
            (Resource::Articles, Operation::Update) => Capability::ChangeArticle,
            (Resource::Articles, Operation::Delete) => Capability::DeleteArticle,
            (Resource::Comments, Operation::Create) => Capability::AddComment,
            (Resource::Comments, Operation::Update) => Capability::ChangeComment,
            (Resource::Comments, Operation::Delete) => Capability::DeleteComment,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown capability codename '{0}'")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.codename() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Articles => write!(f, "article"),
            Resource::Comments => write!(f, "comment"),
        }
    }
}
