//! Database models for comments.

use chrono::{DateTime, Utc};

use crate::types::{ArticleId, CommentId, UserId};

/// Database request for creating a new comment
#[derive(Debug, Clone)]
pub struct CommentCreateDBRequest {
    pub article_id: ArticleId,
    pub author_id: Option<UserId>,
    pub content: String,
}

/// Database response for a comment
#[derive(Debug, Clone)]
pub struct CommentDBResponse {
    pub id: CommentId,
    pub content: String,
    pub article_id: ArticleId,
    pub author_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
