//! Database repository for articles.

use crate::db::{
    errors::{DbError, Result},
    handlers::{comments::Comments, repository::Repository},
    models::{
        articles::{ArticleCreateDBRequest, ArticleDBResponse, ArticleFilter, ArticleType, ArticleUpdateDBRequest},
        comments::CommentDBResponse,
    },
};
use crate::types::{ArticleId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

const ARTICLE_COLUMNS: &str = "id, title, description, creation_date, rating, article_type, author_id, is_active, created_at, updated_at";

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Article {
    pub id: ArticleId,
    pub title: String,
    pub description: String,
    pub creation_date: DateTime<Utc>,
    pub rating: f64,
    pub article_type: String,
    pub author_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<Article> for ArticleDBResponse {
    type Error = DbError;

    fn try_from(article: Article) -> Result<Self> {
        let article_type = article
            .article_type
            .parse::<ArticleType>()
            .map_err(|e| DbError::Other(anyhow::anyhow!(e)))?;

        Ok(Self {
            id: article.id,
            title: article.title,
            description: article.description,
            creation_date: article.creation_date,
            rating: article.rating,
            article_type,
            author_id: article.author_id,
            is_active: article.is_active,
            created_at: article.created_at,
            updated_at: article.updated_at,
        })
    }
}

pub struct Articles<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Articles<'c> {
    type CreateRequest = ArticleCreateDBRequest;
    type Response = ArticleDBResponse;
    type Id = ArticleId;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "INSERT INTO articles (id, title, description, creation_date, rating, article_type, author_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.creation_date)
        .bind(request.rating)
        .bind(request.article_type.code())
        .bind(request.author_id)
        .fetch_one(&mut *self.db)
        .await?;

        article.try_into()
    }

    #[instrument(skip(self), fields(article_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let article = sqlx::query_as::<_, Article>(&format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        article.map(ArticleDBResponse::try_from).transpose()
    }
}

impl<'c> Articles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Active articles, newest first, plus the total number of active articles.
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list_active(&mut self, filter: &ArticleFilter) -> Result<(Vec<ArticleDBResponse>, i64)> {
        let articles = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE is_active \
             ORDER BY creation_date DESC, created_at DESC, id \
             LIMIT $1 OFFSET $2"
        ))
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        let total_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles WHERE is_active")
            .fetch_one(&mut *self.db)
            .await?;

        let articles = articles.into_iter().map(ArticleDBResponse::try_from).collect::<Result<Vec<_>>>()?;
        Ok((articles, total_count))
    }

    /// An active article and its active comments, read in one `REPEATABLE READ` transaction.
    #[instrument(skip(self), fields(article_id = %abbrev_uuid(&id)), err)]
    pub async fn get_active_with_comments(&mut self, id: ArticleId) -> Result<Option<(ArticleDBResponse, Vec<CommentDBResponse>)>> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let article = Articles::new(&mut tx).get_by_id(id).await?;
        let Some(article) = article.filter(|a| a.is_active) else {
            tx.rollback().await?;
            return Ok(None);
        };
        let comments = Comments::new(&mut tx).list_active_for_article(id).await?;

        tx.commit().await?;
        Ok(Some((article, comments)))
    }

    /// Partial update of an active article. Inactive or unknown articles are `NotFound`.
    #[instrument(skip(self, request), fields(article_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&mut self, id: ArticleId, request: &ArticleUpdateDBRequest) -> Result<ArticleDBResponse> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "UPDATE articles SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                creation_date = COALESCE($4, creation_date), \
                rating = COALESCE($5, rating), \
                article_type = COALESCE($6, article_type), \
                updated_at = NOW() \
             WHERE id = $1 AND is_active \
             RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.creation_date)
        .bind(request.rating)
        .bind(request.article_type.map(|t| t.code()))
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        article.try_into()
    }

    /// Soft-delete the article and every comment on it in one transaction.
    ///
    /// Returns false when the article does not exist or is already inactive.
    #[instrument(skip(self), fields(article_id = %abbrev_uuid(&id)), err)]
    pub async fn deactivate_with_comments(&mut self, id: ArticleId) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("UPDATE articles SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE comments SET is_active = FALSE, updated_at = NOW() WHERE article_id = $1 AND is_active")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
