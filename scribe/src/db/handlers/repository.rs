//! Base repository trait for database operations.

/// Contains the Repository trait.
///
/// A repository is a data access layer for a postgres table. Each one wraps a
/// connection (or transaction) and returns the models in [`crate::db::models`].
use crate::db::errors::Result;

/// Base repository trait providing the operations every table supports
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// Create a new entity
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID, active or not
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;
}
