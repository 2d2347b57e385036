//! API request/response models for comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::comments::CommentDBResponse;
use crate::errors::Error;
use crate::types::{ArticleId, CommentId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentCreate {
    pub content: String,
}

impl CommentCreate {
    pub fn validate(&self) -> Result<(), Error> {
        if self.content.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Comment must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CommentId,
    pub content: String,
    #[schema(value_type = String, format = "uuid")]
    pub article_id: ArticleId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub author_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl From<CommentDBResponse> for CommentResponse {
    fn from(db: CommentDBResponse) -> Self {
        Self {
            id: db.id,
            content: db.content,
            article_id: db.article_id,
            author_id: db.author_id,
            created_at: db.created_at,
        }
    }
}
