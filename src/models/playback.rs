//! Playback-info documents as returned by Emby and Jellyfin.
//!
//! Only the fields the gateway reads or rewrites are modelled. Everything else
//! is captured in the flattened `extra` maps and written back verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One playable rendition of a library item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSourceDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Emby only; Jellyfin uses `Id` for both the item and its source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_direct_play: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_direct_stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_transcoding: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcoding_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcoding_sub_protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcoding_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_stream_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaSourceDescriptor {
    /// Whether the backend streams this source from a remote HTTP location
    pub fn is_http_protocol(&self) -> bool {
        self.protocol
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("http"))
    }

    /// Label used in log lines
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.path.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("<unnamed>")
    }

    /// Drop every transcoding hint together
    pub fn clear_transcoding(&mut self) {
        self.transcoding_url = None;
        self.transcoding_sub_protocol = None;
        self.transcoding_container = None;
    }
}

/// Body of `/Items/{id}/PlaybackInfo`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackInfoResponse {
    #[serde(rename = "MediaSources", default)]
    pub media_sources: Vec<MediaSourceDescriptor>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlaybackInfoResponse {
    /// Encode back to JSON, restoring keys that `original` carried as an
    /// explicit `null` and that are still unset
    pub fn to_value_preserving_nulls(&self, original: &Value) -> serde_json::Result<Value> {
        let mut document = serde_json::to_value(self)?;

        let before = original.get("MediaSources").and_then(Value::as_array);
        let after = document
            .get_mut("MediaSources")
            .and_then(Value::as_array_mut);
        if let (Some(before), Some(after)) = (before, after) {
            for (old, new) in before.iter().zip(after.iter_mut()) {
                let (Some(old), Some(new)) = (old.as_object(), new.as_object_mut()) else {
                    continue;
                };
                for (key, value) in old {
                    if value.is_null() && !new.contains_key(key) {
                        new.insert(key.clone(), Value::Null);
                    }
                }
            }
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let body = json!({
            "MediaSources": [{
                "Id": "mediasource_31",
                "ItemId": "31",
                "Path": "/mnt/http/movie.strm",
                "Protocol": "Http",
                "SupportsDirectPlay": false,
                "MediaStreams": [{"Codec": "h264"}],
                "RequiredHttpHeaders": {}
            }],
            "PlaySessionId": "abc"
        });

        let parsed: PlaybackInfoResponse = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(parsed.media_sources.len(), 1);
        let source = &parsed.media_sources[0];
        assert!(source.is_http_protocol());
        assert_eq!(source.item_id.as_deref(), Some("31"));
        assert_eq!(source.extra["MediaStreams"][0]["Codec"], "h264");

        let encoded = serde_json::to_value(&parsed).unwrap();
        assert_eq!(encoded, body);
    }

    #[test]
    fn test_clear_transcoding_removes_fields_from_output() {
        let mut source = MediaSourceDescriptor {
            transcoding_url: Some("/videos/1/master.m3u8".to_string()),
            transcoding_sub_protocol: Some("hls".to_string()),
            transcoding_container: Some("ts".to_string()),
            ..Default::default()
        };
        source.clear_transcoding();

        let encoded = serde_json::to_value(&source).unwrap();
        assert!(encoded.get("TranscodingUrl").is_none());
        assert!(encoded.get("TranscodingSubProtocol").is_none());
        assert!(encoded.get("TranscodingContainer").is_none());
    }

    #[test]
    fn test_explicit_nulls_are_restored() {
        let body = json!({
            "MediaSources": [
                { "Id": "1", "Size": null, "Container": null, "TranscodingUrl": "/t" },
                { "Id": "2", "Size": null }
            ]
        });
        let mut parsed: PlaybackInfoResponse = serde_json::from_value(body.clone()).unwrap();
        parsed.media_sources[0].clear_transcoding();
        parsed.media_sources[0].container = Some("mkv".to_string());
        parsed.media_sources[1].size = Some(42);

        let encoded = parsed.to_value_preserving_nulls(&body).unwrap();
        assert_eq!(
            encoded,
            json!({
                "MediaSources": [
                    { "Id": "1", "Size": null, "Container": "mkv" },
                    { "Id": "2", "Size": 42 }
                ]
            })
        );
    }

    #[test]
    fn test_display_name_falls_back() {
        let source = MediaSourceDescriptor {
            id: Some("7".to_string()),
            ..Default::default()
        };
        assert_eq!(source.display_name(), "7");
    }
}
