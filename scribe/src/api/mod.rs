//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything is served under `/api/v1`:
//!
//! - **Authentication** (`/login`, `/register`, `/refresh`, `/logout`): token issue via cookies
//! - **Users** (`/user`): the authenticated caller's profile
//! - **Articles** (`/articles/*`): public reads, authenticated writes, comments
//!
//! `/healthz` sits outside the versioned prefix.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. The document is
//! served at `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;
