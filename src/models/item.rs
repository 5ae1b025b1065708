use serde::{Deserialize, Serialize};

use super::MediaSourceDescriptor;

/// Result of an `/Items` query against the media server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemResult {
    #[serde(default)]
    pub items: Vec<BaseItem>,
    #[serde(default)]
    pub total_record_count: i64,
}

/// Library item as far as the gateway cares about it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BaseItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub media_sources: Vec<MediaSourceDescriptor>,
}

impl BaseItem {
    /// STRM placeholders are recognised by their file extension
    pub fn is_strm(&self) -> bool {
        self.path
            .as_deref()
            .is_some_and(|p| p.to_ascii_lowercase().ends_with(".strm"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_result_parses_media_server_shape() {
        let body = r#"{
            "Items": [{
                "Id": "43609",
                "Path": "/mnt/strm/Movie (2020).STRM",
                "MediaSources": [{"Id": "mediasource_43609", "Path": "https://cdn/movie.mkv", "Protocol": "Http"}],
                "Type": "Movie"
            }],
            "TotalRecordCount": 1
        }"#;
        let result: ItemResult = serde_json::from_str(body).unwrap();
        let item = &result.items[0];
        assert!(item.is_strm());
        assert_eq!(item.media_sources.len(), 1);
        assert_eq!(result.total_record_count, 1);
    }

    #[test]
    fn test_item_without_path_is_not_strm() {
        let item = BaseItem::default();
        assert!(!item.is_strm());
    }
}
