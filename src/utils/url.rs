//! URL utilities for consistent URL handling
//!
//! Helpers shared by the resolver, the playback policy and the logging paths.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// URL utilities for consistent URL handling
pub struct UrlUtils;

/// Query parameters that carry secrets and must never be logged in clear
const SENSITIVE_PARAMS: &[&str] = &[
    "api_key",
    "x-emby-token",
    "x-mediabrowser-token",
    "token",
    "sign",
    "password",
    "pwd",
];

fn sensitive_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = SENSITIVE_PARAMS
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        // The pattern is built from static, escaped literals
        Regex::new(&format!(r"(?i)([?&](?:{alternation})=)[^&]*"))
            .expect("sensitive parameter pattern is valid")
    })
}

impl UrlUtils {
    /// Parse a URL that must be absolute and carry a scheme
    ///
    /// # Returns
    ///
    /// * `Ok(Url)` - absolute URL with a non-empty host
    /// * `Err(String)` - human readable reason
    pub fn parse_absolute(url: &str) -> Result<Url, String> {
        let parsed = Url::parse(url.trim()).map_err(|e| e.to_string())?;
        if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
            return Err("URL is not absolute".to_string());
        }
        Ok(parsed)
    }

    /// Parse an absolute or root-relative URL such as `/videos/1/stream?x=1`
    pub fn parse_lenient(url: &str) -> Result<Url, url::ParseError> {
        static BASE: OnceLock<Url> = OnceLock::new();
        let base = BASE.get_or_init(|| {
            Url::parse("http://localhost/").expect("static base URL is valid")
        });
        base.join(url.trim())
    }

    /// Look up a query parameter ignoring the case of its key.
    ///
    /// Returns the first value found, percent-decoded.
    pub fn query_value_case_insensitive(query: Option<&str>, key: &str) -> Option<String> {
        let query = query?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.into_owned())
    }

    /// Obfuscate tokens and credentials in URLs for safe logging
    ///
    /// ```rust
    /// use mediawarp::utils::url::UrlUtils;
    ///
    /// let url = "http://host/videos/1/stream?api_key=abc&Static=true";
    /// assert_eq!(
    ///     UrlUtils::obfuscate_credentials(url),
    ///     "http://host/videos/1/stream?api_key=****&Static=true"
    /// );
    /// ```
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        if let Ok(parsed) = Url::parse(url) {
            if !parsed.username().is_empty() || parsed.password().is_some() {
                let mut new_url = parsed.clone();
                let _ = new_url.set_username("****");
                let _ = new_url.set_password(Some("****"));
                obfuscated = new_url.to_string();
            }
        }

        sensitive_param_regex()
            .replace_all(&obfuscated, "${1}****")
            .to_string()
    }
}
