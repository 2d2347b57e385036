//! In-process [`BlogStore`] used for `database.type = in_memory` and in tests.
//!
//! All state sits behind one `RwLock`, so every operation (including the
//! article + comments cascade) is a single critical section. Constraint
//! failures are reported with the same [`DbError`] variants and constraint
//! names as the PostgreSQL schema.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::{
        errors::{DbError, Result},
        models::{
            articles::{ArticleCreateDBRequest, ArticleDBResponse, ArticleFilter, ArticleUpdateDBRequest},
            comments::{CommentCreateDBRequest, CommentDBResponse},
            users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
        },
        store::BlogStore,
    },
    types::{ArticleId, Capability, CommentId, UserId},
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserDBResponse>,
    articles: HashMap<ArticleId, ArticleDBResponse>,
    comments: HashMap<CommentId, CommentDBResponse>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unique_violation(constraint: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some("users".to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

fn check_rating(rating: f64) -> Result<()> {
    if (0.0..=100.0).contains(&rating) {
        Ok(())
    } else {
        Err(DbError::CheckViolation {
            constraint: Some("articles_rating_range".to_string()),
            table: Some("articles".to_string()),
            message: format!("rating {rating} is outside 0..=100"),
        })
    }
}

/// Active comments on an article, oldest first
fn active_comments(state: &State, article_id: ArticleId) -> Vec<CommentDBResponse> {
    let mut comments: Vec<CommentDBResponse> = state
        .comments
        .values()
        .filter(|c| c.article_id == article_id && c.is_active)
        .cloned()
        .collect();
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    comments
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn find_identity_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_identity_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_identity(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.username == request.username) {
            return Err(unique_violation("users_username_key"));
        }
        if state.users.values().any(|u| u.email == request.email) {
            return Err(unique_violation("users_email_key"));
        }

        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            is_superuser: request.is_superuser,
            is_active: true,
            permissions: request.permissions.clone(),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_identity(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(DbError::NotFound)?;

        if let Some(hash) = &request.password_hash {
            user.password_hash = Some(hash.clone());
        }
        if let Some(is_superuser) = request.is_superuser {
            user.is_superuser = is_superuser;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn get_permissions(&self, id: UserId) -> Result<BTreeSet<Capability>> {
        let state = self.state.read().await;
        // Same as an empty row set in the permissions table
        Ok(state.users.get(&id).map(|u| u.permissions.clone()).unwrap_or_default())
    }

    async fn set_permissions(&self, id: UserId, permissions: &BTreeSet<Capability>) -> Result<()> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(DbError::NotFound)?;
        user.permissions = permissions.clone();
        Ok(())
    }

    async fn deactivate_identity(&self, id: UserId) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&id) {
            Some(user) if user.is_active => {
                user.is_active = false;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_article(&self, id: ArticleId) -> Result<Option<ArticleDBResponse>> {
        Ok(self.state.read().await.articles.get(&id).cloned())
    }

    async fn find_active_article_with_comments(&self, id: ArticleId) -> Result<Option<(ArticleDBResponse, Vec<CommentDBResponse>)>> {
        let state = self.state.read().await;

        let Some(article) = state.articles.get(&id).filter(|a| a.is_active).cloned() else {
            return Ok(None);
        };
        Ok(Some((article, active_comments(&state, id))))
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> Result<(Vec<ArticleDBResponse>, i64)> {
        let state = self.state.read().await;

        let mut active: Vec<&ArticleDBResponse> = state.articles.values().filter(|a| a.is_active).collect();
        active.sort_by(|a, b| {
            b.creation_date
                .cmp(&a.creation_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        let total_count = active.len() as i64;
        let page = active
            .into_iter()
            .skip(filter.skip.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total_count))
    }

    async fn create_article(&self, request: &ArticleCreateDBRequest) -> Result<ArticleDBResponse> {
        check_rating(request.rating)?;

        let mut state = self.state.write().await;
        let now = Utc::now();
        let article = ArticleDBResponse {
            id: Uuid::new_v4(),
            title: request.title.clone(),
            description: request.description.clone(),
            creation_date: request.creation_date,
            rating: request.rating,
            article_type: request.article_type,
            author_id: request.author_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn update_article(&self, id: ArticleId, request: &ArticleUpdateDBRequest) -> Result<ArticleDBResponse> {
        if let Some(rating) = request.rating {
            check_rating(rating)?;
        }

        let mut state = self.state.write().await;
        let article = state.articles.get_mut(&id).filter(|a| a.is_active).ok_or(DbError::NotFound)?;

        if let Some(title) = &request.title {
            article.title = title.clone();
        }
        if let Some(description) = &request.description {
            article.description = description.clone();
        }
        if let Some(creation_date) = request.creation_date {
            article.creation_date = creation_date;
        }
        if let Some(rating) = request.rating {
            article.rating = rating;
        }
        if let Some(article_type) = request.article_type {
            article.article_type = article_type;
        }
        article.updated_at = Utc::now();
        Ok(article.clone())
    }

    async fn deactivate_article_and_comments(&self, id: ArticleId) -> Result<bool> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        match state.articles.get_mut(&id) {
            Some(article) if article.is_active => {
                article.is_active = false;
                article.updated_at = now;
            }
            _ => return Ok(false),
        }

        for comment in state.comments.values_mut().filter(|c| c.article_id == id && c.is_active) {
            comment.is_active = false;
            comment.updated_at = now;
        }
        Ok(true)
    }

    async fn create_comment(&self, request: &CommentCreateDBRequest) -> Result<CommentDBResponse> {
        let mut state = self.state.write().await;

        if !state.articles.contains_key(&request.article_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("comments_article_id_fkey".to_string()),
                table: Some("comments".to_string()),
                message: format!("article {} does not exist", request.article_id),
            });
        }

        let now = Utc::now();
        let comment = CommentDBResponse {
            id: Uuid::new_v4(),
            content: request.content.clone(),
            article_id: request.article_id,
            author_id: request.author_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn list_active_comments(&self, article_id: ArticleId) -> Result<Vec<CommentDBResponse>> {
        let state = self.state.read().await;
        Ok(active_comments(&state, article_id))
    }
}
