use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::errors::{AppError, AppResult, UpstreamError, UpstreamResult};
use crate::models::ItemResult;
use crate::utils::UrlUtils;

/// Header both Emby and Jellyfin accept for API keys
const TOKEN_HEADER: &str = "X-Emby-Token";

/// Thin API client shared by the Emby and Jellyfin adapters
#[derive(Clone)]
pub struct MediaServerClient {
    client: Client,
    addr: String,
    api_key: String,
    /// Prefix in front of every API path, e.g. `/emby`
    base_path: &'static str,
}

impl MediaServerClient {
    pub fn new(
        addr: &str,
        api_key: &str,
        base_path: &'static str,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build media server client: {e}")))?;

        Ok(Self {
            client,
            addr: addr.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            base_path,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// `GET /Items?Ids={id}&Fields={fields}&Limit=1`
    pub async fn query_item(&self, id: &str, fields: &str) -> UpstreamResult<ItemResult> {
        let url = format!(
            "{}{}/Items?Ids={}&Fields={}&Limit=1",
            self.addr,
            self.base_path,
            urlencoding::encode(id),
            urlencoding::encode(fields)
        );
        debug!("Querying media server item: {}", UrlUtils::obfuscate_credentials(&url));

        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| UpstreamError::request(&url, &e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let result: ItemResult =
            response
                .json()
                .await
                .map_err(|e| UpstreamError::InvalidResponse {
                    url: url.clone(),
                    message: e.to_string(),
                })?;

        if result.items.is_empty() {
            return Err(UpstreamError::ItemNotFound { id: id.to_string() });
        }
        Ok(result)
    }
}
