/*!
 * Playback Policy
 * ===============
 *
 * Rewrites the capability and URL fields of one media source so that clients
 * direct-play STRM content instead of asking the media server to transcode it.
 *
 * The rules depend only on the source, its classification and the per-class
 * `transcode` switch:
 *
 *     HttpStrm,  transcode off   direct play/stream on, transcoding hints
 *                                cleared, DirectStreamUrl rebuilt if present
 *     AlistStrm, transcode off   as above plus SupportsTranscoding off,
 *                                DirectStreamUrl always rebuilt, Container
 *                                taken from the file extension
 *     AlistStrm, transcode on    direct play/stream on, transcoding untouched
 *     Unknown                    nothing
 *
 * Alist sources without a `Size` additionally report a size lookup for the
 * caller to perform; the policy itself never does I/O.
 *
 * Every fallible step runs before the first write, so a source that fails is
 * left exactly as it was.
 */

use std::path::Path;

use crate::errors::TransformError;
use crate::models::MediaSourceDescriptor;
use crate::streaming::StrmClassification;

use super::params::extract_preserved_params;

/// Backend-specific shape of the same-origin stream URL
pub trait StreamPathTemplate: Send + Sync {
    /// `/videos/{id}/stream` style path for an item
    fn build_stream_path(&self, item_id: &str) -> String;

    /// Item id that belongs in the stream path of `source`
    fn item_id_for(&self, source: &MediaSourceDescriptor) -> Option<String>;
}

/// Per-class transcode switches
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicySettings {
    pub http_transcode: bool,
    pub alist_transcode: bool,
}

/// Size query the caller should run against a storage endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeLookup {
    pub endpoint: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub modified: bool,
    pub size_lookup: Option<SizeLookup>,
}

/// Apply the playback policy to one media source in place
pub fn apply_policy<T: StreamPathTemplate + ?Sized>(
    source: &mut MediaSourceDescriptor,
    classification: &StrmClassification,
    settings: &PolicySettings,
    template: &T,
) -> Result<PolicyOutcome, TransformError> {
    match classification {
        StrmClassification::HttpStrm => {
            if settings.http_transcode {
                return Ok(PolicyOutcome::default());
            }

            let direct_stream_url = match source.direct_stream_url.as_deref() {
                Some(existing) => Some(rebuild_direct_stream_url(source, existing, template)?),
                None => None,
            };

            force_direct(source);
            source.clear_transcoding();
            if direct_stream_url.is_some() {
                source.direct_stream_url = direct_stream_url;
            }

            Ok(PolicyOutcome {
                modified: true,
                size_lookup: None,
            })
        }

        StrmClassification::AlistStrm { endpoint } => {
            if !settings.alist_transcode {
                let existing = source.direct_stream_url.as_deref().unwrap_or_default();
                let direct_stream_url = rebuild_direct_stream_url(source, existing, template)?;
                let container = source.path.as_deref().and_then(container_from_path);

                force_direct(source);
                source.supports_transcoding = Some(false);
                source.clear_transcoding();
                source.direct_stream_url = Some(direct_stream_url);
                if container.is_some() {
                    source.container = container;
                }
            } else {
                force_direct(source);
            }

            let size_lookup = match (&source.size, &source.path) {
                (None, Some(path)) => Some(SizeLookup {
                    endpoint: endpoint.clone(),
                    path: path.clone(),
                }),
                _ => None,
            };

            Ok(PolicyOutcome {
                modified: true,
                size_lookup,
            })
        }

        StrmClassification::Unknown => Ok(PolicyOutcome::default()),
    }
}

fn force_direct(source: &mut MediaSourceDescriptor) {
    source.supports_direct_play = Some(true);
    source.supports_direct_stream = Some(true);
}

/// `{stream_path}?MediaSourceId={id}&Static=true[&{preserved}]`
pub fn rebuild_direct_stream_url<T: StreamPathTemplate + ?Sized>(
    source: &MediaSourceDescriptor,
    existing: &str,
    template: &T,
) -> Result<String, TransformError> {
    let media_source_id = source.id.as_deref().ok_or(TransformError::MissingField {
        field: "Id",
        what: "media source",
    })?;
    let item_id = template
        .item_id_for(source)
        .ok_or(TransformError::MissingField {
            field: "ItemId",
            what: "media source",
        })?;
    let preserved = extract_preserved_params(existing)?;

    let mut url = format!(
        "{}?MediaSourceId={}&Static=true",
        template.build_stream_path(&item_id),
        media_source_id
    );
    if !preserved.is_empty() {
        url.push('&');
        url.push_str(&preserved);
    }
    Ok(url)
}

/// Lower-cased file extension without its leading dot
fn container_from_path(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}
