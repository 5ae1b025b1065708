use crate::errors::TransformError;
use crate::utils::UrlUtils;

/// Query keys the gateway always writes itself
const REBUILT_KEYS: [&str; 2] = ["MediaSourceId", "Static"];

/// Collect the query pairs of an existing stream URL that must survive a rebuild.
///
/// Accepts absolute and root-relative URLs. Pairs are kept in their original
/// order and spelling, without decoding or re-encoding; only the keys the
/// rebuilt URL sets itself are dropped (compared case-insensitively).
///
/// Returns an empty string when nothing is left to preserve.
pub fn extract_preserved_params(existing_url: &str) -> Result<String, TransformError> {
    let parsed = UrlUtils::parse_lenient(existing_url)
        .map_err(|e| TransformError::invalid_url(existing_url, e.to_string()))?;

    let Some(query) = parsed.query() else {
        return Ok(String::new());
    };

    let preserved: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(k, _)| k);
            !REBUILT_KEYS.iter().any(|r| r.eq_ignore_ascii_case(key))
        })
        .collect();

    Ok(preserved.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_params_preserved_in_order() {
        let params = extract_preserved_params("http://x/stream?api_key=ABC&foo=1").unwrap();
        assert_eq!(params, "api_key=ABC&foo=1");
    }

    #[test]
    fn test_rebuilt_keys_excluded_case_insensitively() {
        let params = extract_preserved_params(
            "/videos/10/stream.mkv?mediasourceid=5&STATIC=true&api_key=ABC&PlaySessionId=xyz",
        )
        .unwrap();
        assert_eq!(params, "api_key=ABC&PlaySessionId=xyz");
    }

    #[test]
    fn test_values_are_not_reencoded() {
        let params = extract_preserved_params("/v?Tag=a%2Fb&empty=&flag").unwrap();
        assert_eq!(params, "Tag=a%2Fb&empty=&flag");
    }

    #[test]
    fn test_no_query_yields_empty() {
        assert_eq!(extract_preserved_params("/videos/1/stream").unwrap(), "");
        assert_eq!(
            extract_preserved_params("/videos/1/stream?Static=true&MediaSourceId=1").unwrap(),
            ""
        );
    }

    #[test]
    fn test_malformed_url_is_rejected() {
        let err = extract_preserved_params("http://[::1/stream?a=1").unwrap_err();
        assert!(matches!(err, TransformError::InvalidUrl { .. }));
    }
}
