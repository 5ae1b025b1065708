use async_trait::async_trait;
use regex::Regex;

use crate::config::{MediaServerConfig, MediaServerKind};
use crate::errors::{AppError, AppResult, UpstreamError, UpstreamResult};
use crate::models::{BaseItem, MediaSourceDescriptor};
use crate::playback::StreamPathTemplate;
use crate::routing::{RouteAction, RoutePattern};

use super::{captured_item_id, MediaServerAdapter, MediaServerClient, ITEM_FIELDS};

const VIDEO_STREAM: &str = r"(?i)^(/emby)?/videos/([^/]+)/(stream|original)(\.\w+)?$";

/// Emby 4.9+ prefixes media source ids; the item query wants the bare id
const MEDIA_SOURCE_PREFIX: &str = "mediasource_";

static ROUTES: &[RoutePattern] = &[
    RoutePattern {
        action: RouteAction::PlaybackInfo,
        pattern: r"(?i)^(/emby)?/Items/[^/]+/PlaybackInfo$",
    },
    RoutePattern {
        action: RouteAction::VideoStream,
        pattern: VIDEO_STREAM,
    },
    RoutePattern {
        action: RouteAction::BaseHtmlPlayer,
        pattern: r"(?i)^/web/modules/htmlvideoplayer/basehtmlplayer\.js$",
    },
    RoutePattern {
        action: RouteAction::Subtitles,
        pattern: r"(?i)^(/emby)?/videos/[^/]+/[^/]+/subtitles/\d+(/\d+)?/stream\.\w+$",
    },
];

pub struct EmbyAdapter {
    client: MediaServerClient,
    video_stream: Regex,
}

impl EmbyAdapter {
    pub fn new(config: &MediaServerConfig) -> AppResult<Self> {
        let client = MediaServerClient::new(
            &config.addr,
            &config.api_key,
            "/emby",
            config.request_timeout,
        )?;
        let video_stream = Regex::new(VIDEO_STREAM)
            .map_err(|e| AppError::internal(format!("Invalid Emby video pattern: {e}")))?;

        Ok(Self {
            client,
            video_stream,
        })
    }
}

impl StreamPathTemplate for EmbyAdapter {
    fn build_stream_path(&self, item_id: &str) -> String {
        format!("/videos/{item_id}/stream")
    }

    fn item_id_for(&self, source: &MediaSourceDescriptor) -> Option<String> {
        source.item_id.clone()
    }
}

#[async_trait]
impl MediaServerAdapter for EmbyAdapter {
    fn kind(&self) -> MediaServerKind {
        MediaServerKind::Emby
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
        id.replacen(MEDIA_SOURCE_PREFIX, "", 1)
    }

    fn route_patterns(&self) -> &'static [RoutePattern] {
        ROUTES
    }

    fn video_item_id(&self, path: &str) -> Option<String> {
        captured_item_id(&self.video_stream, path, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routing::RouteTable;

    fn adapter() -> EmbyAdapter {
        EmbyAdapter::new(&MediaServerConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize_strips_prefix_once() {
        let adapter = adapter();
        assert_eq!(adapter.normalize_id("mediasource_31"), "31");
        assert_eq!(adapter.normalize_id("343121"), "343121");
    }

    #[test]
    fn test_video_item_id_from_both_path_styles() {
        let adapter = adapter();
        assert_eq!(
            adapter.video_item_id("/emby/videos/43609/stream").as_deref(),
            Some("43609")
        );
        assert_eq!(
            adapter.video_item_id("/Videos/77/original.mkv").as_deref(),
            Some("77")
        );
        assert_eq!(adapter.video_item_id("/videos/77/master.m3u8"), None);
    }

    #[test]
    fn test_requested_source_matches_prefixed_and_bare_ids() {
        let adapter = adapter();
        let source = MediaSourceDescriptor {
            id: Some("mediasource_31".to_string()),
            ..Default::default()
        };
        assert!(adapter.is_requested_source(&source, "mediasource_31"));
        assert!(adapter.is_requested_source(&source, "31"));
        assert!(!adapter.is_requested_source(&source, "32"));
    }

    #[test]
    fn test_route_order_and_matches() {
        let mut config = Config::default();
        config.subtitle.enable = true;
        config.subtitle.srt2ass = true;
        let table = RouteTable::build(adapter().route_patterns(), &config).unwrap();

        let action = |path: &str| table.match_path(path).map(|r| r.action());
        assert_eq!(action("/emby/Items/5/PlaybackInfo"), Some(RouteAction::PlaybackInfo));
        assert_eq!(action("/emby/videos/5/stream.mkv"), Some(RouteAction::VideoStream));
        assert_eq!(
            action("/web/modules/htmlvideoplayer/basehtmlplayer.js"),
            Some(RouteAction::BaseHtmlPlayer)
        );
        assert_eq!(
            action("/emby/videos/5/mediasource_5/Subtitles/2/Stream.srt"),
            Some(RouteAction::Subtitles)
        );
        assert_eq!(action("/emby/Items/5/Images/Primary"), None);
    }

    #[test]
    fn test_stream_path_uses_item_id() {
        let adapter = adapter();
        let source = MediaSourceDescriptor {
            id: Some("mediasource_5".to_string()),
            item_id: Some("5".to_string()),
            ..Default::default()
        };
        assert_eq!(adapter.item_id_for(&source).as_deref(), Some("5"));
        assert_eq!(adapter.build_stream_path("5"), "/videos/5/stream");
    }
}
