//! Database repository for users.

use std::collections::BTreeSet;

use crate::types::{Capability, UserId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_superuser, is_active, created_at, updated_at";

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub is_superuser: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl From<(BTreeSet<Capability>, User)> for UserDBResponse {
    fn from((permissions, user): (BTreeSet<Capability>, User)) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_superuser: user.is_superuser,
            is_active: user.is_active,
            permissions,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Parse stored codenames. An unknown codename is a data error, never skipped.
fn parse_permissions(codenames: Vec<String>) -> Result<BTreeSet<Capability>> {
    codenames
        .into_iter()
        .map(|codename| codename.parse::<Capability>().map_err(|e| DbError::Other(e.into())))
        .collect()
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user_id = Uuid::new_v4();

        let mut tx = self.db.begin().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, email, password_hash, is_superuser) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(request.is_superuser)
        .fetch_one(&mut *tx)
        .await?;

        for permission in &request.permissions {
            sqlx::query("INSERT INTO user_permissions (user_id, codename) VALUES ($1, $2)")
                .bind(user_id)
                .bind(permission.codename())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(UserDBResponse::from((request.permissions.clone(), user)))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        self.with_permissions(user).await
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        self.with_permissions(user).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;

        self.with_permissions(user).await
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&mut self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                password_hash = COALESCE($2, password_hash), \
                is_superuser = COALESCE($3, is_superuser), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&request.password_hash)
        .bind(request.is_superuser)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        let permissions = self.get_permissions(id).await?;
        Ok(UserDBResponse::from((permissions, user)))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn get_permissions(&mut self, id: UserId) -> Result<BTreeSet<Capability>> {
        let codenames = sqlx::query_scalar::<_, String>("SELECT codename FROM user_permissions WHERE user_id = $1")
            .bind(id)
            .fetch_all(&mut *self.db)
            .await?;

        parse_permissions(codenames)
    }

    /// Replace the user's capability set.
    #[instrument(skip(self, permissions), fields(user_id = %abbrev_uuid(&id), count = permissions.len()), err)]
    pub async fn set_permissions(&mut self, id: UserId, permissions: &BTreeSet<Capability>) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(DbError::NotFound);
        }

        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for permission in permissions {
            sqlx::query("INSERT INTO user_permissions (user_id, codename) VALUES ($1, $2)")
                .bind(id)
                .bind(permission.codename())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn deactivate(&mut self, id: UserId) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn with_permissions(&mut self, user: Option<User>) -> Result<Option<UserDBResponse>> {
        match user {
            Some(user) => {
                let permissions = self.get_permissions(user.id).await?;
                Ok(Some(UserDBResponse::from((permissions, user))))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn user_request(username: &str, email: &str, permissions: &[Capability]) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some("$argon2id$stored".to_string()),
            is_superuser: false,
            permissions: permissions.iter().copied().collect(),
        }
    }

    #[test]
    fn test_parse_permissions_rejects_unknown_codenames() {
        let parsed = parse_permissions(vec!["add_article".to_string(), "view_comment".to_string()]).unwrap();
        assert_eq!(parsed, BTreeSet::from([Capability::AddArticle, Capability::ViewComment]));

        let result = parse_permissions(vec!["add_article".to_string(), "blog.add_article".to_string()]);
        assert!(matches!(result, Err(DbError::Other(_))));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_with_permissions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo
            .create(&user_request("alice", "alice@example.com", &[Capability::AddArticle, Capability::ChangeArticle]))
            .await
            .unwrap();
        assert!(created.is_active);
        assert!(!created.is_superuser);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
        assert_eq!(by_id.password_hash.as_deref(), Some("$argon2id$stored"));
        assert_eq!(by_id.permissions, BTreeSet::from([Capability::AddArticle, Capability::ChangeArticle]));

        let by_email = repo.get_user_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        let by_username = repo.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_username.id, created.id);

        assert!(repo.get_user_by_email("nobody@example.com").await.unwrap().is_none());
        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_user_reports_conflicting_column(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        repo.create(&user_request("alice", "alice@example.com", &[])).await.unwrap();

        let err = repo.create(&user_request("bob", "alice@example.com", &[])).await.unwrap_err();
        assert!(err.is_user_conflict());
        assert_eq!(err.conflicting_user_field(), Some("email"));

        let err = repo.create(&user_request("alice", "other@example.com", &[])).await.unwrap_err();
        assert!(err.is_user_conflict());
        assert_eq!(err.conflicting_user_field(), Some("username"));

        // The failed inserts left nothing behind
        assert!(repo.get_user_by_username("bob").await.unwrap().is_none());
        assert!(repo.get_user_by_email("other@example.com").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_only_touches_given_fields(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let user = repo.create(&user_request("alice", "alice@example.com", &[Capability::AddArticle])).await.unwrap();

        let updated = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    is_superuser: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_superuser);
        assert_eq!(updated.password_hash.as_deref(), Some("$argon2id$stored"));
        assert_eq!(updated.permissions, BTreeSet::from([Capability::AddArticle]));

        let updated = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    password_hash: Some("$argon2id$rotated".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_superuser);
        assert_eq!(updated.password_hash.as_deref(), Some("$argon2id$rotated"));

        let missing = repo.update(Uuid::new_v4(), &UserUpdateDBRequest::default()).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_set_permissions_replaces_the_set(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let user = repo
            .create(&user_request("alice", "alice@example.com", &[Capability::AddArticle, Capability::AddComment]))
            .await
            .unwrap();

        let replacement = BTreeSet::from([Capability::DeleteArticle]);
        repo.set_permissions(user.id, &replacement).await.unwrap();
        assert_eq!(repo.get_permissions(user.id).await.unwrap(), replacement);

        repo.set_permissions(user.id, &BTreeSet::new()).await.unwrap();
        assert!(repo.get_permissions(user.id).await.unwrap().is_empty());

        let missing = repo.set_permissions(Uuid::new_v4(), &replacement).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_stored_codename_is_an_error(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn).create(&user_request("alice", "alice@example.com", &[])).await.unwrap();

        sqlx::query("INSERT INTO user_permissions (user_id, codename) VALUES ($1, 'blog.add_article')")
            .bind(user.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        let mut repo = Users::new(&mut conn);
        assert!(matches!(repo.get_permissions(user.id).await, Err(DbError::Other(_))));
        assert!(matches!(repo.get_by_id(user.id).await, Err(DbError::Other(_))));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deactivate_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let user = repo.create(&user_request("alice", "alice@example.com", &[])).await.unwrap();

        assert!(repo.deactivate(user.id).await.unwrap());
        assert!(!repo.deactivate(user.id).await.unwrap());
        assert!(!repo.deactivate(Uuid::new_v4()).await.unwrap());

        // Still found, but inactive
        assert!(!repo.get_by_id(user.id).await.unwrap().unwrap().is_active);
    }
}
