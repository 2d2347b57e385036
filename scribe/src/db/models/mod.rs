//! Database record models.
//!
//! These are the shapes the storage layer accepts and returns. They are kept
//! separate from the API models in [`crate::api::models`] so the wire format
//! and the schema can move independently.
//!
//! - [`users`]: identities and their capability sets
//! - [`articles`]: articles and the article filter used for listing
//! - [`comments`]: comments attached to articles

pub mod articles;
pub mod comments;
pub mod users;
