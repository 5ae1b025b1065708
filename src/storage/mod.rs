//! Cloud storage endpoints backing Alist STRM entries

pub mod alist;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::AlistStrmConfig;
use crate::errors::{StorageError, StorageResult};

pub use alist::AlistClient;

/// One storage endpoint able to describe and serve files
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn file_size(&self, path: &str) -> StorageResult<i64>;

    async fn download_url(&self, path: &str) -> StorageResult<String>;
}

/// Providers keyed by endpoint address
#[derive(Clone, Default)]
pub struct StorageRegistry {
    providers: HashMap<String, Arc<dyn StorageProvider>>,
}

impl StorageRegistry {
    pub fn from_config(config: &AlistStrmConfig, timeout: Duration) -> StorageResult<Self> {
        let mut registry = Self::default();
        if !config.enable {
            return Ok(registry);
        }
        for endpoint in &config.list {
            let client = AlistClient::new(endpoint, timeout)?;
            // Keyed by the address exactly as configured; classification uses the same string
            registry
                .providers
                .insert(endpoint.addr.clone(), Arc::new(client));
        }
        info!(endpoints = registry.len(), "Storage endpoints registered");
        Ok(registry)
    }

    pub fn get(&self, endpoint: &str) -> StorageResult<Arc<dyn StorageProvider>> {
        self.providers
            .get(endpoint)
            .cloned()
            .ok_or_else(|| StorageError::UnknownEndpoint {
                endpoint: endpoint.to_string(),
            })
    }

    pub async fn file_size(&self, endpoint: &str, path: &str) -> StorageResult<i64> {
        self.get(endpoint)?.file_size(path).await
    }

    pub async fn download_url(&self, endpoint: &str, path: &str) -> StorageResult<String> {
        self.get(endpoint)?.download_url(path).await
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlistEndpointConfig;

    #[tokio::test]
    async fn test_unknown_endpoint_is_an_error() {
        let registry = StorageRegistry::default();
        let err = registry.file_size("http://nowhere", "/a").await.unwrap_err();
        assert!(matches!(err, StorageError::UnknownEndpoint { .. }));
    }

    #[test]
    fn test_disabled_config_registers_nothing() {
        let config = AlistStrmConfig {
            enable: false,
            transcode: false,
            list: vec![AlistEndpointConfig {
                addr: "http://alist:5244".to_string(),
                ..Default::default()
            }],
        };
        let registry = StorageRegistry::from_config(&config, Duration::from_secs(1)).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_endpoints_keyed_by_configured_addr() {
        let config = AlistStrmConfig {
            enable: true,
            transcode: false,
            list: vec![AlistEndpointConfig {
                addr: "http://alist:5244/".to_string(),
                token: Some("t".to_string()),
                ..Default::default()
            }],
        };
        let registry = StorageRegistry::from_config(&config, Duration::from_secs(1)).unwrap();
        assert!(registry.get("http://alist:5244/").is_ok());
    }
}
