use async_trait::async_trait;
use regex::Regex;

use crate::config::{MediaServerConfig, MediaServerKind};
use crate::errors::{AppError, AppResult, UpstreamError, UpstreamResult};
use crate::models::{BaseItem, MediaSourceDescriptor};
use crate::playback::StreamPathTemplate;
use crate::routing::{RouteAction, RoutePattern};

use super::{captured_item_id, MediaServerAdapter, MediaServerClient, ITEM_FIELDS};

const VIDEO_STREAM: &str = r"(?i)^/videos/([^/]+)/(stream|original)(\.\w+)?$";

static ROUTES: &[RoutePattern] = &[
    RoutePattern {
        action: RouteAction::PlaybackInfo,
        pattern: r"(?i)^/Items/[^/]+/PlaybackInfo$",
    },
    RoutePattern {
        action: RouteAction::VideoStream,
        pattern: VIDEO_STREAM,
    },
];

pub struct JellyfinAdapter {
    client: MediaServerClient,
    video_stream: Regex,
}

impl JellyfinAdapter {
    pub fn new(config: &MediaServerConfig) -> AppResult<Self> {
        let client =
            MediaServerClient::new(&config.addr, &config.api_key, "", config.request_timeout)?;
        let video_stream = Regex::new(VIDEO_STREAM)
            .map_err(|e| AppError::internal(format!("Invalid Jellyfin video pattern: {e}")))?;

        Ok(Self {
            client,
            video_stream,
        })
    }
}

impl StreamPathTemplate for JellyfinAdapter {
    fn build_stream_path(&self, item_id: &str) -> String {
        format!("/Videos/{item_id}/stream")
    }

    /// Jellyfin media sources share their id with the item
    fn item_id_for(&self, source: &MediaSourceDescriptor) -> Option<String> {
        source.id.clone()
    }
}

#[async_trait]
impl MediaServerAdapter for JellyfinAdapter {
    fn kind(&self) -> MediaServerKind {
        MediaServerKind::Jellyfin
    }

    fn upstream_addr(&self) -> &str {
        self.client.addr()
    }

    async fn query_item(&self, id: &str) -> UpstreamResult<BaseItem> {
        let result = self.client.query_item(id, ITEM_FIELDS).await?;
        result
            .items
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::ItemNotFound { id: id.to_string() })
    }

    fn normalize_id(&self, id: &str) -> String {
        id.to_string()
    }

    fn route_patterns(&self) -> &'static [RoutePattern] {
        ROUTES
    }

    fn video_item_id(&self, path: &str) -> Option<String> {
        captured_item_id(&self.video_stream, path, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> JellyfinAdapter {
        let config = MediaServerConfig {
            kind: MediaServerKind::Jellyfin,
            ..Default::default()
        };
        JellyfinAdapter::new(&config).unwrap()
    }

    #[test]
    fn test_stream_path_uses_source_id() {
        let adapter = adapter();
        let source = MediaSourceDescriptor {
            id: Some("a1b2c3".to_string()),
            ..Default::default()
        };
        assert_eq!(adapter.item_id_for(&source).as_deref(), Some("a1b2c3"));
        assert_eq!(adapter.build_stream_path("a1b2c3"), "/Videos/a1b2c3/stream");
    }

    #[test]
    fn test_video_item_id() {
        let adapter = adapter();
        assert_eq!(
            adapter.video_item_id("/Videos/a1b2c3/stream.mp4").as_deref(),
            Some("a1b2c3")
        );
        assert_eq!(adapter.video_item_id("/emby/videos/1/stream"), None);
    }

    #[test]
    fn test_ids_are_not_rewritten() {
        assert_eq!(adapter().normalize_id("mediasource_1"), "mediasource_1");
    }
}
