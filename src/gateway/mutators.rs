//! Response mutators for the intercepted routes

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderValue};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::errors::TransformError;
use crate::media_server::MediaServerAdapter;
use crate::models::{MediaSourceDescriptor, PlaybackInfoResponse};
use crate::playback::{apply_policy, PolicySettings};
use crate::proxy::{BufferedResponse, Mutation, RequestContext, ResponseMutator};
use crate::storage::StorageRegistry;
use crate::streaming::StrmClassifier;
use crate::subtitle;
use crate::utils::UrlUtils;

/// Rewrites `MediaSources` so clients direct-play STRM content
pub struct PlaybackInfoMutator {
    adapter: Arc<dyn MediaServerAdapter>,
    classifier: Arc<StrmClassifier>,
    storage: StorageRegistry,
    settings: PolicySettings,
}

impl PlaybackInfoMutator {
    pub fn new(
        adapter: Arc<dyn MediaServerAdapter>,
        classifier: Arc<StrmClassifier>,
        storage: StorageRegistry,
        settings: PolicySettings,
    ) -> Self {
        Self {
            adapter,
            classifier,
            storage,
            settings,
        }
    }

    /// Apply the policy to one source; `Ok(false)` when nothing changed
    async fn rewrite_source(&self, source: &mut MediaSourceDescriptor) -> Result<bool, String> {
        let Some(source_id) = source.id.clone() else {
            return Err("media source has no Id".to_string());
        };

        let item = self
            .adapter
            .query_item(&self.adapter.normalize_id(&source_id))
            .await
            .map_err(|e| e.to_string())?;
        let Some(item_path) = item.path.as_deref() else {
            return Err(format!("item {} has no Path", item.id));
        };

        let classification = self.classifier.classify(item_path);
        let outcome = apply_policy(source, &classification, &self.settings, &*self.adapter)
            .map_err(|e| e.to_string())?;

        if outcome.modified {
            info!(
                source = %source.display_name(),
                class = classification.label(),
                direct_stream_url = ?source.direct_stream_url.as_deref().map(UrlUtils::obfuscate_credentials),
                "Media source forced to direct play"
            );
        }

        let mut changed = outcome.modified;
        if let Some(lookup) = outcome.size_lookup {
            match self.storage.file_size(&lookup.endpoint, &lookup.path).await {
                Ok(size) => {
                    source.size = Some(size);
                    changed = true;
                    info!(source = %source.display_name(), size, "Media source size filled in");
                }
                Err(e) => warn!(
                    source = %source.display_name(),
                    endpoint = %lookup.endpoint,
                    "Failed to look up file size: {}",
                    e
                ),
            }
        }

        Ok(changed)
    }
}

#[async_trait]
impl ResponseMutator for PlaybackInfoMutator {
    fn name(&self) -> &'static str {
        "PlaybackInfo"
    }

    async fn mutate(
        &self,
        request: &RequestContext,
        response: &BufferedResponse,
    ) -> Result<Mutation, TransformError> {
        let is_playback = UrlUtils::query_value_case_insensitive(request.query(), "IsPlayback");
        if is_playback.is_some_and(|v| v.eq_ignore_ascii_case("false")) {
            debug!(path = %request.path(), "IsPlayback=false, leaving playback info untouched");
            return Ok(Mutation::Unchanged);
        }

        let original: serde_json::Value =
            serde_json::from_slice(&response.body).map_err(|source| TransformError::Decode {
                what: "playback info",
                source,
            })?;
        let mut playback: PlaybackInfoResponse = serde_json::from_value(original.clone())
            .map_err(|source| TransformError::Decode {
                what: "playback info",
                source,
            })?;

        let mut modified = false;
        for source in playback.media_sources.iter_mut() {
            match self.rewrite_source(source).await {
                Ok(changed) => modified |= changed,
                Err(reason) => warn!(
                    source = %source.display_name(),
                    "Skipping media source: {}",
                    reason
                ),
            }
        }

        if !modified {
            return Ok(Mutation::Unchanged);
        }

        let body = playback
            .to_value_preserving_nulls(&original)
            .and_then(|document| serde_json::to_vec(&document))
            .map_err(|source| TransformError::Encode {
                what: "playback info",
                source,
            })?;
        let mut headers = response.headers.clone();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(Mutation::Replaced {
            headers,
            body: Bytes::from(body),
        })
    }
}

/// Emby web player script: lets the browser load cross-origin redirected
/// sources without CORS
pub struct BaseHtmlPlayerMutator;

const CROSS_ORIGIN_EXPR: &str = r#"mediaSource.IsRemote&&"DirectPlay"===playMethod?null:"anonymous""#;

#[async_trait]
impl ResponseMutator for BaseHtmlPlayerMutator {
    fn name(&self) -> &'static str {
        "BaseHtmlPlayer"
    }

    async fn mutate(
        &self,
        _request: &RequestContext,
        response: &BufferedResponse,
    ) -> Result<Mutation, TransformError> {
        let script = std::str::from_utf8(&response.body).map_err(|_| TransformError::NotUtf8)?;
        if !script.contains(CROSS_ORIGIN_EXPR) {
            debug!("basehtmlplayer.js has no crossOrigin expression to patch");
            return Ok(Mutation::Unchanged);
        }

        let patched = script.replace(CROSS_ORIGIN_EXPR, "null");
        Ok(Mutation::Replaced {
            headers: response.headers.clone(),
            body: Bytes::from(patched),
        })
    }
}

/// SRT subtitles converted to ASS with the configured style
pub struct SubtitleMutator {
    style: Vec<String>,
}

impl SubtitleMutator {
    pub fn new(style: Vec<String>) -> Self {
        Self { style }
    }
}

#[async_trait]
impl ResponseMutator for SubtitleMutator {
    fn name(&self) -> &'static str {
        "Subtitles"
    }

    async fn mutate(
        &self,
        request: &RequestContext,
        response: &BufferedResponse,
    ) -> Result<Mutation, TransformError> {
        if !subtitle::is_srt(&response.body) {
            return Ok(Mutation::Unchanged);
        }
        let srt = std::str::from_utf8(&response.body).map_err(|_| TransformError::NotUtf8)?;
        let ass = subtitle::srt_to_ass(srt, &self.style);
        info!(path = %request.path(), "Converted SRT subtitle to ASS");

        let mut headers = response.headers.clone();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/x-ssa; charset=utf-8"),
        );
        Ok(Mutation::Replaced {
            headers,
            body: Bytes::from(ass),
        })
    }
}
