//! PurviewClient trait and test double

use async_trait::async_trait;

use super::{ApiError, EntityHeader, EntityMutationResponse};

/// The slice of the Purview Data Map API the bulk pipeline needs
///
/// Implementations are passed explicitly to the pipeline so every network
/// call can be replaced with a test double.
#[async_trait]
pub trait PurviewClient: Send + Sync {
    /// Look up an entity by guid; `Ok(None)` when it does not exist
    async fn get_entity(&self, guid: &str) -> Result<Option<EntityHeader>, ApiError>;

    /// Create or update an entity (upsert keyed on its qualifiedName)
    async fn create_or_update_entity(&self, entity: &serde_json::Value) -> Result<EntityMutationResponse, ApiError>;

    /// Replace a single attribute on an existing entity
    async fn update_entity_attribute(
        &self,
        guid: &str,
        attribute: &str,
        value: &serde_json::Value,
    ) -> Result<EntityMutationResponse, ApiError>;
}
