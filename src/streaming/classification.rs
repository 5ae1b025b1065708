/*!
 * STRM Classification
 * ===================
 *
 * Decides what kind of placeholder a STRM entry is, purely from its path:
 *
 *     - HttpStrm                  the STRM content is a remote HTTP(S) URL
 *     - AlistStrm { endpoint }    the path lives inside an Alist storage
 *     - Unknown                   anything else, left to the media server
 *
 * Rules are plain path prefixes, evaluated in configuration order: every
 * HTTP prefix first, then each Alist endpoint's prefixes in the order the
 * endpoints are listed. The first matching prefix wins, even when a later
 * prefix is longer.
 *
 * Disabled classes contribute no rules at all.
 */

use tracing::debug;

use crate::config::{AlistStrmConfig, HttpStrmConfig};

/// What a STRM path points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrmClassification {
    HttpStrm,
    /// `endpoint` is the configured address of the owning Alist server
    AlistStrm { endpoint: String },
    Unknown,
}

impl StrmClassification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::HttpStrm => "HttpStrm",
            Self::AlistStrm { .. } => "AlistStrm",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone)]
struct PrefixRule {
    prefix: String,
    class: StrmClassification,
}

/// Ordered prefix rules built once from configuration
#[derive(Debug, Clone, Default)]
pub struct StrmClassifier {
    rules: Vec<PrefixRule>,
}

impl StrmClassifier {
    pub fn from_config(http: &HttpStrmConfig, alist: &AlistStrmConfig) -> Self {
        let mut classifier = Self::default();
        if http.enable {
            for prefix in &http.prefix_list {
                classifier.push(prefix, StrmClassification::HttpStrm);
            }
        }
        if alist.enable {
            for endpoint in &alist.list {
                for prefix in &endpoint.prefix_list {
                    classifier.push(
                        prefix,
                        StrmClassification::AlistStrm {
                            endpoint: endpoint.addr.clone(),
                        },
                    );
                }
            }
        }
        classifier
    }

    /// Append a rule; it has lower priority than every rule already present
    pub fn push(&mut self, prefix: impl Into<String>, class: StrmClassification) {
        let prefix = prefix.into();
        // An empty prefix would swallow every path
        if prefix.is_empty() {
            return;
        }
        self.rules.push(PrefixRule { prefix, class });
    }

    pub fn classify(&self, path: &str) -> StrmClassification {
        for rule in &self.rules {
            if path.starts_with(&rule.prefix) {
                debug!(
                    path = %path,
                    prefix = %rule.prefix,
                    class = rule.class.label(),
                    "STRM path matched prefix"
                );
                return rule.class.clone();
            }
        }
        debug!(path = %path, "STRM path matched no prefix");
        StrmClassification::Unknown
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
