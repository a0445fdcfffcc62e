//! Purview Data Map client over reqwest
//!
//! Talks to the Atlas v2 entity endpoints. Retrying is left to the caller's
//! retry policy; this layer only classifies failures.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tracing::debug;

use super::types::EntityWithExtInfo;
use super::{ApiError, EntityHeader, EntityMutationResponse, PurviewClient};
use crate::config::ResolvedPurviewConfig;

const ATLAS_PATH: &[&str] = &["datamap", "api", "atlas", "v2"];

/// Purview Data Map HTTP client
pub struct PurviewHttpClient {
    endpoint: Url,
    token: String,
    http: Client,
    timeout: Duration,
}

impl PurviewHttpClient {
    /// Create a new client from resolved configuration
    pub fn from_config(config: &ResolvedPurviewConfig) -> Result<Self, ApiError> {
        debug!(?config, "from_config: called");
        let http = Client::builder().timeout(config.timeout).build().map_err(ApiError::Network)?;
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ApiError::InvalidRequest(format!("bad endpoint {}: {}", config.endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!("bad endpoint {}", config.endpoint)));
        }

        Ok(Self {
            endpoint,
            token: config.token.clone(),
            http,
            timeout: config.timeout,
        })
    }

    /// Endpoint joined with the Atlas path and `segments`
    ///
    /// Each segment is percent-encoded as a single path segment, so values
    /// taken from CSV cells cannot add segments, a query, or a fragment.
    fn atlas_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(bad) = segments.iter().find(|s| s.is_empty() || **s == "." || **s == "..") {
            return Err(ApiError::InvalidRequest(format!("invalid path segment '{}'", bad)));
        }

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("bad endpoint {}", self.endpoint)))?
            .pop_if_empty()
            .extend(ATLAS_PATH)
            .extend(segments);
        Ok(url)
    }

    fn entity_url(&self) -> Result<Url, ApiError> {
        self.atlas_url(&["entity"])
    }

    fn entity_guid_url(&self, guid: &str) -> Result<Url, ApiError> {
        self.atlas_url(&["entity", "guid", guid])
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("content-type", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout(self.timeout)
                } else {
                    ApiError::Network(e)
                }
            })?;

        let status = response.status();
        debug!(status = status.as_u16(), "send: response received");

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers().get("retry-after").and_then(|v| v.to_str().ok()));
            return Err(ApiError::RateLimited { retry_after });
        }

        Ok(response)
    }

    async fn mutation(&self, request: RequestBuilder) -> Result<EntityMutationResponse, ApiError> {
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(ApiError::InvalidResponse(format!("empty body with HTTP {}", status.as_u16())));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Parse a Retry-After header, either delay-seconds or an HTTP date
///
/// None when the header is absent or unusable, leaving the delay to the
/// retry policy's backoff curve.
fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    let value = value?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

#[async_trait]
impl PurviewClient for PurviewHttpClient {
    async fn get_entity(&self, guid: &str) -> Result<Option<EntityHeader>, ApiError> {
        debug!(%guid, "get_entity: called");
        let request = self.http.get(self.entity_guid_url(guid)?).query(&[("minExtInfo", "true")]);
        let response = self.send(request).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%guid, "get_entity: not found");
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        let text = response.text().await?;
        let info: EntityWithExtInfo = serde_json::from_str(&text)?;
        Ok(Some(info.entity))
    }

    async fn create_or_update_entity(&self, entity: &serde_json::Value) -> Result<EntityMutationResponse, ApiError> {
        debug!(type_name = ?entity.get("typeName"), "create_or_update_entity: called");
        let body = serde_json::json!({ "entity": entity });
        self.mutation(self.http.post(self.entity_url()?).json(&body)).await
    }

    async fn update_entity_attribute(
        &self,
        guid: &str,
        attribute: &str,
        value: &serde_json::Value,
    ) -> Result<EntityMutationResponse, ApiError> {
        debug!(%guid, %attribute, "update_entity_attribute: called");
        let request = self
            .http
            .put(self.entity_guid_url(guid)?)
            .query(&[("name", attribute)])
            .json(value);
        self.mutation(request).await
    }
}
