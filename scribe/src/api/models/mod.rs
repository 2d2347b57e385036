//! API request and response data models.
//!
//! These structures define the public HTTP contract. They are separate from
//! the storage records in [`crate::db::models`] and carry `utoipa` schemas for
//! the generated OpenAPI document.
//!
//! - [`users`]: the authenticated caller and user profiles
//! - [`auth`]: login, registration and token responses
//! - [`articles`]: article create/update requests and responses
//! - [`comments`]: comment create requests and responses
//! - [`pagination`]: offset paging shared by list endpoints

pub mod articles;
pub mod auth;
pub mod comments;
pub mod pagination;
pub mod users;
