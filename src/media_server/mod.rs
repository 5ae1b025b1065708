//! Backend adapters
//!
//! Emby and Jellyfin expose the same item and playback APIs with small
//! differences in paths, id formats and stream URL casing. Each difference is
//! one method on [`MediaServerAdapter`]; everything else in the gateway is
//! shared.

pub mod client;
pub mod emby;
pub mod jellyfin;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{MediaServerConfig, MediaServerKind};
use crate::errors::{AppResult, UpstreamResult};
use crate::models::{BaseItem, MediaSourceDescriptor};
use crate::playback::StreamPathTemplate;
use crate::routing::RoutePattern;

pub use client::MediaServerClient;
pub use emby::EmbyAdapter;
pub use jellyfin::JellyfinAdapter;

/// Fields the gateway needs from an item query
pub const ITEM_FIELDS: &str = "Path,MediaSources";

#[async_trait]
pub trait MediaServerAdapter: StreamPathTemplate {
    fn kind(&self) -> MediaServerKind;

    /// Upstream base address requests are proxied to
    fn upstream_addr(&self) -> &str;

    /// Look up one item by (already normalized) id
    async fn query_item(&self, id: &str) -> UpstreamResult<BaseItem>;

    /// Id form accepted by the item query
    fn normalize_id(&self, id: &str) -> String;

    /// Ordered interception patterns for this backend
    fn route_patterns(&self) -> &'static [RoutePattern];

    /// Item id embedded in a video stream path
    fn video_item_id(&self, path: &str) -> Option<String>;

    /// Whether `source` is the media source a client asked for
    fn is_requested_source(&self, source: &MediaSourceDescriptor, requested: &str) -> bool {
        source
            .id
            .as_deref()
            .is_some_and(|id| self.normalize_id(id) == self.normalize_id(requested))
    }
}

pub fn create_adapter(config: &MediaServerConfig) -> AppResult<Arc<dyn MediaServerAdapter>> {
    let adapter: Arc<dyn MediaServerAdapter> = match config.kind {
        MediaServerKind::Emby => Arc::new(EmbyAdapter::new(config)?),
        MediaServerKind::Jellyfin => Arc::new(JellyfinAdapter::new(config)?),
    };
    Ok(adapter)
}

/// Text of capture `group` when `regex` matches `path`
fn captured_item_id(regex: &regex::Regex, path: &str, group: usize) -> Option<String> {
    regex
        .captures(path)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str().to_string())
}
