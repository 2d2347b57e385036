//! Database repository for comments.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::comments::{CommentCreateDBRequest, CommentDBResponse},
};
use crate::types::{ArticleId, CommentId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

const COMMENT_COLUMNS: &str = "id, content, article_id, author_id, is_active, created_at, updated_at";

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Comment {
    pub id: CommentId,
    pub content: String,
    pub article_id: ArticleId,
    pub author_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentDBResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            article_id: comment.article_id,
            author_id: comment.author_id,
            is_active: comment.is_active,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

pub struct Comments<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Comments<'c> {
    type CreateRequest = CommentCreateDBRequest;
    type Response = CommentDBResponse;
    type Id = CommentId;

    #[instrument(skip(self, request), fields(article_id = %abbrev_uuid(&request.article_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (id, content, article_id, author_id) VALUES ($1, $2, $3, $4) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.content)
        .bind(request.article_id)
        .bind(request.author_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(comment.into())
    }

    #[instrument(skip(self), fields(comment_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let comment = sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(comment.map(Into::into))
    }
}

impl<'c> Comments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Active comments on an article, oldest first.
    #[instrument(skip(self), fields(article_id = %abbrev_uuid(&article_id)), err)]
    pub async fn list_active_for_article(&mut self, article_id: ArticleId) -> Result<Vec<CommentDBResponse>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE article_id = $1 AND is_active ORDER BY created_at, id"
        ))
        .bind(article_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(comments.into_iter().map(Into::into).collect())
    }
}
