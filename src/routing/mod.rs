/*!
 * Route Table
 * ===========
 *
 * Ordered list of path regexes, each bound to one interception action. The
 * table is assembled once at startup from the backend's patterns; a request
 * path is tested against the rules in registration order and the first match
 * decides how the request is handled. Paths that match nothing are proxied
 * untouched.
 *
 * Feature-gated actions are filtered out while building, so a disabled
 * feature has no rule to test at request time.
 */

use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::errors::{AppError, AppResult};

/// What the gateway does with a matched request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteAction {
    /// Video stream requests, candidates for a STRM redirect
    VideoStream,
    /// Playback-info responses, rewritten to favour direct play
    PlaybackInfo,
    /// Emby web player script, patched so remote sources load
    BaseHtmlPlayer,
    /// Subtitle downloads, converted from SRT to ASS
    Subtitles,
}

impl RouteAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::VideoStream => "VideoStream",
            Self::PlaybackInfo => "PlaybackInfo",
            Self::BaseHtmlPlayer => "BaseHtmlPlayer",
            Self::Subtitles => "Subtitles",
        }
    }

    /// Whether the action is switched on by configuration
    fn enabled(&self, config: &Config) -> bool {
        match self {
            Self::Subtitles => config.subtitle.srt2ass_enabled(),
            _ => true,
        }
    }
}

/// Uncompiled pattern as supplied by a backend adapter
#[derive(Debug, Clone, Copy)]
pub struct RoutePattern {
    pub action: RouteAction,
    pub pattern: &'static str,
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    regex: Regex,
    action: RouteAction,
}

impl RouteRule {
    pub fn action(&self) -> RouteAction {
        self.action
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Compile `patterns` in order, skipping actions disabled in `config`
    pub fn build(patterns: &[RoutePattern], config: &Config) -> AppResult<Self> {
        let mut rules = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            if !pattern.action.enabled(config) {
                debug!(action = pattern.action.name(), "Route disabled by configuration");
                continue;
            }
            let regex = Regex::new(pattern.pattern).map_err(|e| {
                AppError::configuration(format!("Invalid route pattern '{}': {e}", pattern.pattern))
            })?;
            rules.push(RouteRule {
                regex,
                action: pattern.action,
            });
        }
        Ok(Self { rules })
    }

    /// First rule whose regex matches `path`
    pub fn match_path(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.regex.is_match(path))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
