//! API request/response models for articles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::comments::CommentResponse;
use crate::db::models::articles::{ArticleCreateDBRequest, ArticleDBResponse, ArticleType, ArticleUpdateDBRequest};
use crate::errors::Error;
use crate::types::{ArticleId, UserId};

pub const MAX_TITLE_LENGTH: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArticleCreate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to the time of the request
    pub creation_date: Option<DateTime<Utc>>,
    /// Between 0 and 100
    pub rating: f64,
    #[serde(rename = "type")]
    pub article_type: ArticleType,
}

/// Partial article update. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub rating: Option<f64>,
    #[serde(rename = "type")]
    pub article_type: Option<ArticleType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArticleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ArticleId,
    pub title: String,
    pub description: String,
    pub creation_date: DateTime<Utc>,
    pub rating: f64,
    #[serde(rename = "type")]
    pub article_type: ArticleType,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub author_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An article together with its active comments
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArticleDetailResponse {
    #[serde(flatten)]
    pub article: ArticleResponse,
    pub comments: Vec<CommentResponse>,
}

fn validate_title(title: &str) -> Result<(), Error> {
    if title.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Title must not be empty".to_string(),
        });
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(Error::BadRequest {
            message: format!("Title must be at most {MAX_TITLE_LENGTH} characters"),
        });
    }
    Ok(())
}

fn validate_rating(rating: f64) -> Result<(), Error> {
    if !(0.0..=100.0).contains(&rating) {
        return Err(Error::BadRequest {
            message: "Rating must be between 0 and 100".to_string(),
        });
    }
    Ok(())
}

impl ArticleCreate {
    pub fn validate(&self) -> Result<(), Error> {
        validate_title(&self.title)?;
        validate_rating(self.rating)
    }

    /// Build the storage request, recording `author_id` as the author.
    pub fn into_db_request(self, author_id: UserId) -> ArticleCreateDBRequest {
        ArticleCreateDBRequest {
            title: self.title,
            description: self.description,
            creation_date: self.creation_date.unwrap_or_else(Utc::now),
            rating: self.rating,
            article_type: self.article_type,
            author_id: Some(author_id),
        }
    }
}

impl ArticleUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(())
    }
}

impl From<ArticleUpdate> for ArticleUpdateDBRequest {
    fn from(update: ArticleUpdate) -> Self {
        Self {
            title: update.title,
            description: update.description,
            creation_date: update.creation_date,
            rating: update.rating,
            article_type: update.article_type,
        }
    }
}

impl From<ArticleDBResponse> for ArticleResponse {
    fn from(db: ArticleDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            description: db.description,
            creation_date: db.creation_date,
            rating: db.rating,
            article_type: db.article_type,
            author_id: db.author_id,
            is_active: db.is_active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
