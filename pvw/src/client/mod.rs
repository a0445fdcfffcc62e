//! Purview client module
//!
//! The pipeline only sees the [`PurviewClient`] trait; [`PurviewHttpClient`]
//! is the production implementation.

use std::sync::Arc;

use tracing::debug;

mod error;
mod purview;
pub mod traits;
mod types;

pub use error::ApiError;
pub use purview::PurviewHttpClient;
pub use traits::PurviewClient;
pub use types::{EntityHeader, EntityMutationResponse};

use crate::config::PurviewConfig;

/// Create the production client from config
pub fn create_client(config: &PurviewConfig) -> eyre::Result<Arc<dyn PurviewClient>> {
    let resolved = config.resolve()?;
    debug!(endpoint = %resolved.endpoint, "create_client: creating Purview HTTP client");
    Ok(Arc::new(PurviewHttpClient::from_config(&resolved)?))
}
