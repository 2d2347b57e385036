use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        articles::{ArticleCreate, ArticleDetailResponse, ArticleResponse, ArticleUpdate},
        comments::{CommentCreate, CommentResponse},
        pagination::{PaginatedResponse, Pagination},
        users::CurrentUser,
    },
    auth::permissions::{can_create, can_delete, can_mutate},
    db::{
        errors::DbError,
        models::{
            articles::{ArticleDBResponse, ArticleFilter},
            comments::CommentCreateDBRequest,
        },
    },
    errors::{Error, Result},
    types::{ArticleId, Operation, Resource, abbrev_uuid},
};

fn article_not_found(id: ArticleId) -> Error {
    Error::NotFound {
        resource: "Article".to_string(),
        id: id.to_string(),
    }
}

/// Load an article that has not been deleted
async fn find_active_article(state: &AppState, id: ArticleId) -> Result<ArticleDBResponse> {
    match state.store.find_article(id).await? {
        Some(article) if article.is_active => Ok(article),
        _ => Err(article_not_found(id)),
    }
}

/// List active articles, newest first
#[utoipa::path(
    get,
    path = "/articles",
    tag = "articles",
    params(Pagination),
    responses(
        (status = 200, description = "Page of active articles", body = PaginatedResponse<ArticleResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_articles(State(state): State<AppState>, Query(pagination): Query<Pagination>) -> Result<Json<PaginatedResponse<ArticleResponse>>> {
    let (skip, limit) = pagination.params();
    let (articles, total_count) = state.store.list_articles(&ArticleFilter::new(skip, limit)).await?;

    Ok(Json(PaginatedResponse::new(
        articles.into_iter().map(ArticleResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Get an article with its comments
#[utoipa::path(
    get,
    path = "/articles/{id}",
    tag = "articles",
    params(("id" = uuid::Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article with its active comments", body = ArticleDetailResponse),
        (status = 404, description = "Article not found or deleted"),
    )
)]
#[tracing::instrument(skip_all, fields(article_id = %abbrev_uuid(&id)))]
pub async fn get_article(State(state): State<AppState>, Path(id): Path<ArticleId>) -> Result<Json<ArticleDetailResponse>> {
    let (article, comments) = state
        .store
        .find_active_article_with_comments(id)
        .await?
        .ok_or_else(|| article_not_found(id))?;

    Ok(Json(ArticleDetailResponse {
        article: ArticleResponse::from(article),
        comments: comments.into_iter().map(CommentResponse::from).collect(),
    }))
}

/// Create an article authored by the caller
#[utoipa::path(
    post,
    path = "/articles/create",
    tag = "articles",
    request_body = ArticleCreate,
    responses(
        (status = 201, description = "Article created", body = ArticleResponse),
        (status = 400, description = "Invalid article data"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing add_article permission"),
    ),
    security(("AccessCookie" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_article(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<ArticleCreate>,
) -> Result<(StatusCode, Json<ArticleResponse>)> {
    can_create(&current_user, Resource::Articles)?;
    create.validate()?;

    let article = state.store.create_article(&create.into_db_request(current_user.id)).await?;
    info!(article_id = %abbrev_uuid(&article.id), "Created article");

    Ok((StatusCode::CREATED, Json(ArticleResponse::from(article))))
}

/// Edit an article
///
/// Only the author may edit, and only with the `change_article` permission.
/// Superusers may edit any article.
#[utoipa::path(
    patch,
    path = "/articles/edit/{id}",
    tag = "articles",
    params(("id" = uuid::Uuid, Path, description = "Article ID")),
    request_body = ArticleUpdate,
    responses(
        (status = 200, description = "Article updated", body = ArticleResponse),
        (status = 400, description = "Invalid article data"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author, or missing change_article permission"),
        (status = 404, description = "Article not found or deleted"),
    ),
    security(("AccessCookie" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), article_id = %abbrev_uuid(&id)))]
pub async fn edit_article(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ArticleId>,
    Json(update): Json<ArticleUpdate>,
) -> Result<Json<ArticleResponse>> {
    let article = find_active_article(&state, id).await?;
    can_mutate(&current_user, Operation::Update, Resource::Articles, &article)?;
    update.validate()?;

    // Deleted since it was loaded
    let updated = state.store.update_article(id, &update.into()).await.map_err(|e| match e {
        DbError::NotFound => article_not_found(id),
        e => Error::Database(e),
    })?;
    info!("Updated article");

    Ok(Json(ArticleResponse::from(updated)))
}

/// Delete an article
///
/// The article and its comments are deactivated, not removed.
#[utoipa::path(
    delete,
    path = "/articles/delete/{id}",
    tag = "articles",
    params(("id" = uuid::Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article deactivated", body = ArticleResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author, or missing delete_article permission"),
        (status = 404, description = "Article not found or already deleted"),
    ),
    security(("AccessCookie" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), article_id = %abbrev_uuid(&id)))]
pub async fn delete_article(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<ArticleId>) -> Result<Json<ArticleResponse>> {
    let mut article = find_active_article(&state, id).await?;
    can_delete(&current_user, Resource::Articles, &article, &state.config.auth.policy)?;

    // Lost a race with another delete
    if !state.store.deactivate_article_and_comments(id).await? {
        return Err(article_not_found(id));
    }
    info!("Deactivated article and its comments");

    article.is_active = false;
    Ok(Json(ArticleResponse::from(article)))
}

/// Comment on an article
#[utoipa::path(
    post,
    path = "/articles/{id}/comments",
    tag = "comments",
    params(("id" = uuid::Uuid, Path, description = "Article ID")),
    request_body = CommentCreate,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Empty comment"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing add_comment permission"),
        (status = 404, description = "Article not found or deleted"),
    ),
    security(("AccessCookie" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), article_id = %abbrev_uuid(&id)))]
pub async fn create_comment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ArticleId>,
    Json(create): Json<CommentCreate>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    can_create(&current_user, Resource::Comments)?;
    create.validate()?;
    find_active_article(&state, id).await?;

    let comment = state
        .store
        .create_comment(&CommentCreateDBRequest {
            article_id: id,
            author_id: Some(current_user.id),
            content: create.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}
