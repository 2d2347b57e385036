//! Repository implementations for PostgreSQL.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open
//! transaction) and exposes strongly-typed operations for one table:
//!
//! - [`Users`]: identities and their capability rows
//! - [`Articles`]: articles, including the cascading soft delete
//! - [`Comments`]: comments attached to articles
//!
//! ```ignore
//! use scribe::db::handlers::{Repository, Users};
//!
//! let mut tx = pool.begin().await?;
//! let mut users = Users::new(&mut tx);
//! let user = users.get_user_by_email("user@example.com").await?;
//! tx.commit().await?;
//! ```

pub mod articles;
pub mod comments;
pub mod repository;
pub mod users;

pub use articles::Articles;
pub use comments::Comments;
pub use repository::Repository;
pub use users::Users;
