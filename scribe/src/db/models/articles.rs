//! Database models for articles.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{ArticleId, UserId};

/// Subject area of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ArticleType {
    /// Information technologies
    #[serde(rename = "IT")]
    InformationTechnologies,
    /// Information security
    #[serde(rename = "IS")]
    InformationSecurity,
}

impl ArticleType {
    pub fn code(&self) -> &'static str {
        match self {
            ArticleType::InformationTechnologies => "IT",
            ArticleType::InformationSecurity => "IS",
        }
    }
}

impl fmt::Display for ArticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ArticleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IT" => Ok(ArticleType::InformationTechnologies),
            "IS" => Ok(ArticleType::InformationSecurity),
            other => Err(format!("unknown article type '{other}'")),
        }
    }
}

/// Database request for creating a new article
#[derive(Debug, Clone)]
pub struct ArticleCreateDBRequest {
    pub title: String,
    pub description: String,
    pub creation_date: DateTime<Utc>,
    pub rating: f64,
    pub article_type: ArticleType,
    pub author_id: Option<UserId>,
}

/// Database request for a partial article update. The author is never changed.
#[derive(Debug, Clone, Default)]
pub struct ArticleUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub rating: Option<f64>,
    pub article_type: Option<ArticleType>,
}

/// Database response for an article
#[derive(Debug, Clone)]
pub struct ArticleDBResponse {
    pub id: ArticleId,
    pub title: String,
    pub description: String,
    pub creation_date: DateTime<Utc>,
    pub rating: f64,
    pub article_type: ArticleType,
    pub author_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing active articles
#[derive(Debug, Clone)]
pub struct ArticleFilter {
    pub skip: i64,
    pub limit: i64,
}

impl ArticleFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}
