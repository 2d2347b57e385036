//! Storage abstraction used by the HTTP layer.
//!
//! Handlers and the auth middleware only ever talk to a [`BlogStore`]. Two
//! implementations exist: [`PostgresStore`] for deployments and
//! [`MemoryStore`](crate::db::memory::MemoryStore) for development and tests.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    db::{
        errors::Result,
        handlers::{Articles, Comments, Repository, Users},
        models::{
            articles::{ArticleCreateDBRequest, ArticleDBResponse, ArticleFilter, ArticleUpdateDBRequest},
            comments::{CommentCreateDBRequest, CommentDBResponse},
            users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
        },
    },
    types::{ArticleId, Capability, UserId},
};

/// Persistence operations for identities, articles and comments.
///
/// Lookups return inactive rows too; callers decide what "inactive" means for
/// them. Errors are [`DbError`](crate::db::errors::DbError)s with the same
/// categories for every implementation: unique violations on `users` carry the
/// `users_email_key` / `users_username_key` constraint names.
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn find_identity_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn find_identity_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;

    /// Insert a new identity with its capability set.
    async fn create_identity(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    /// Change password hash and/or superuser flag.
    async fn update_identity(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse>;

    async fn get_permissions(&self, id: UserId) -> Result<BTreeSet<Capability>>;

    /// Replace an identity's capability set. Tokens already issued keep their snapshot.
    async fn set_permissions(&self, id: UserId, permissions: &BTreeSet<Capability>) -> Result<()>;

    /// Mark an identity inactive. Returns false if it was unknown or already inactive.
    async fn deactivate_identity(&self, id: UserId) -> Result<bool>;

    async fn find_article(&self, id: ArticleId) -> Result<Option<ArticleDBResponse>>;

    /// An active article and its active comments, read from one snapshot.
    ///
    /// None when the article is unknown or inactive. A concurrent delete is
    /// seen either entirely or not at all.
    async fn find_active_article_with_comments(&self, id: ArticleId) -> Result<Option<(ArticleDBResponse, Vec<CommentDBResponse>)>>;

    /// One page of active articles and the total active count.
    async fn list_articles(&self, filter: &ArticleFilter) -> Result<(Vec<ArticleDBResponse>, i64)>;

    async fn create_article(&self, request: &ArticleCreateDBRequest) -> Result<ArticleDBResponse>;

    async fn update_article(&self, id: ArticleId, request: &ArticleUpdateDBRequest) -> Result<ArticleDBResponse>;

    /// Deactivate an article and all its comments atomically.
    async fn deactivate_article_and_comments(&self, id: ArticleId) -> Result<bool>;

    async fn create_comment(&self, request: &CommentCreateDBRequest) -> Result<CommentDBResponse>;

    async fn list_active_comments(&self, article_id: ArticleId) -> Result<Vec<CommentDBResponse>>;
}

/// [`BlogStore`] backed by PostgreSQL.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlogStore for PostgresStore {
    async fn find_identity_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_by_id(id).await
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_user_by_email(email).await
    }

    async fn find_identity_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_user_by_username(username).await
    }

    async fn create_identity(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).create(request).await
    }

    async fn update_identity(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).update(id, request).await
    }

    async fn get_permissions(&self, id: UserId) -> Result<BTreeSet<Capability>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_permissions(id).await
    }

    async fn set_permissions(&self, id: UserId, permissions: &BTreeSet<Capability>) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).set_permissions(id, permissions).await
    }

    async fn deactivate_identity(&self, id: UserId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).deactivate(id).await
    }

    async fn find_article(&self, id: ArticleId) -> Result<Option<ArticleDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Articles::new(&mut conn).get_by_id(id).await
    }

    async fn find_active_article_with_comments(&self, id: ArticleId) -> Result<Option<(ArticleDBResponse, Vec<CommentDBResponse>)>> {
        let mut conn = self.pool.acquire().await?;
        Articles::new(&mut conn).get_active_with_comments(id).await
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> Result<(Vec<ArticleDBResponse>, i64)> {
        let mut conn = self.pool.acquire().await?;
        Articles::new(&mut conn).list_active(filter).await
    }

    async fn create_article(&self, request: &ArticleCreateDBRequest) -> Result<ArticleDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Articles::new(&mut conn).create(request).await
    }

    async fn update_article(&self, id: ArticleId, request: &ArticleUpdateDBRequest) -> Result<ArticleDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Articles::new(&mut conn).update(id, request).await
    }

    async fn deactivate_article_and_comments(&self, id: ArticleId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Articles::new(&mut conn).deactivate_with_comments(id).await
    }

    async fn create_comment(&self, request: &CommentCreateDBRequest) -> Result<CommentDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Comments::new(&mut conn).create(request).await
    }

    async fn list_active_comments(&self, article_id: ArticleId) -> Result<Vec<CommentDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Comments::new(&mut conn).list_active_for_article(article_id).await
    }
}
