use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub media_server: MediaServerConfig,
    #[serde(default)]
    pub http_strm: HttpStrmConfig,
    #[serde(default)]
    pub alist_strm: AlistStrmConfig,
    #[serde(default)]
    pub subtitle: SubtitleConfig,
    #[serde(default)]
    pub redirect: RedirectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which media server flavor sits behind the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaServerKind {
    #[default]
    Emby,
    Jellyfin,
}

impl MediaServerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emby => "emby",
            Self::Jellyfin => "jellyfin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaServerConfig {
    #[serde(rename = "type", default)]
    pub kind: MediaServerKind,
    #[serde(default = "default_media_server_addr")]
    pub addr: String,
    #[serde(default)]
    pub api_key: String,
    /// Timeout applied to item queries issued by the gateway itself
    #[serde(
        default = "default_media_server_timeout",
        with = "duration_serde::duration"
    )]
    pub request_timeout: Duration,
}

/// STRM files whose content is a plain HTTP(S) URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpStrmConfig {
    #[serde(default)]
    pub enable: bool,
    /// Keep server-side transcoding available for these entries
    #[serde(default)]
    pub transcode: bool,
    #[serde(default)]
    pub prefix_list: Vec<String>,
}

/// STRM files pointing at paths inside an Alist storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlistStrmConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub transcode: bool,
    #[serde(default)]
    pub list: Vec<AlistEndpointConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlistEndpointConfig {
    pub addr: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Static token, used instead of logging in when set
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub prefix_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub srt2ass: bool,
    #[serde(default = "default_ass_style")]
    pub ass_style: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    /// Overall budget for one resolution call
    #[serde(default = "default_redirect_timeout", with = "duration_serde::duration")]
    pub timeout: Duration,
    /// How long a resolved URL is reused
    #[serde(default = "default_cache_ttl", with = "duration_serde::duration")]
    pub cache_ttl: Duration,
    /// Maximum number of cached (seed, user agent) keys
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_media_server_addr() -> String {
    DEFAULT_MEDIA_SERVER_ADDR.to_string()
}

fn default_media_server_timeout() -> Duration {
    DEFAULT_MEDIA_SERVER_TIMEOUT
}

fn default_ass_style() -> Vec<String> {
    DEFAULT_ASS_STYLE.iter().map(|s| s.to_string()).collect()
}

fn default_redirect_timeout() -> Duration {
    DEFAULT_REDIRECT_TIMEOUT
}

fn default_cache_ttl() -> Duration {
    DEFAULT_REDIRECT_CACHE_TTL
}

fn default_cache_capacity() -> usize {
    DEFAULT_REDIRECT_CACHE_CAPACITY
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for MediaServerConfig {
    fn default() -> Self {
        Self {
            kind: MediaServerKind::default(),
            addr: default_media_server_addr(),
            api_key: String::new(),
            request_timeout: default_media_server_timeout(),
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            enable: false,
            srt2ass: false,
            ass_style: default_ass_style(),
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            timeout: default_redirect_timeout(),
            cache_ttl: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl SubtitleConfig {
    /// Whether the subtitle rewrite route should be registered at all
    pub fn srt2ass_enabled(&self) -> bool {
        self.enable && self.srt2ass
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.media_server.addr.trim().is_empty() {
            bail!("media_server.addr must not be empty");
        }
        url::Url::parse(&self.media_server.addr).map_err(|e| {
            anyhow::anyhow!("media_server.addr '{}' is not a valid URL: {e}", self.media_server.addr)
        })?;
        if self.redirect.cache_capacity == 0 {
            bail!("redirect.cache_capacity must be greater than zero");
        }
        if self.redirect.timeout.is_zero() {
            bail!("redirect.timeout must be greater than zero");
        }
        if self.alist_strm.enable {
            for endpoint in &self.alist_strm.list {
                url::Url::parse(&endpoint.addr).map_err(|e| {
                    anyhow::anyhow!("alist_strm endpoint '{}' is not a valid URL: {e}", endpoint.addr)
                })?;
            }
        }
        Ok(())
    }
}
