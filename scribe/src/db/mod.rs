//! Data access layer.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, auth middleware)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  BlogStore  │  (db::store - the trait handlers depend on)
//! └──────┬──────┘
//!        │
//!   ┌────┴─────────────┐
//!   ↓                  ↓
//! ┌─────────────┐  ┌─────────────┐
//! │ Repositories│  │ MemoryStore │
//! └──────┬──────┘  └─────────────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! - [`store`]: the [`BlogStore`](store::BlogStore) trait and its PostgreSQL implementation
//! - [`memory`]: the in-process implementation
//! - [`handlers`]: per-table repositories over a `PgConnection`
//! - [`models`]: records passed in and out of the store
//! - [`errors`]: storage error categories
//!
//! # Migrations
//!
//! Schema migrations live in `migrations/` and are embedded with `sqlx::migrate!`:
//!
//! ```ignore
//! scribe::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod store;
