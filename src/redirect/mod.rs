/*!
 * Redirect Resolution
 * ===================
 *
 * Follows the redirect chain behind an HTTP STRM target so clients can be
 * sent straight to the final location.
 *
 * Every hop is a HEAD probe carrying the client's User-Agent (CDNs commonly
 * pick a target per agent). The walk is bounded three ways:
 *
 *     hop limit        MAX_REDIRECT_ATTEMPTS redirect responses
 *     cycle check      a URL seen earlier in the same walk aborts it
 *     overall timeout  one budget for the entire walk
 *
 * Successful results are cached per (seed URL, User-Agent).
 */

pub mod cache;

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use reqwest::header::{LOCATION, USER_AGENT};
use reqwest::{redirect, Client};
use tracing::{debug, warn};
use url::Url;

use crate::config::defaults::MAX_REDIRECT_ATTEMPTS;
use crate::config::RedirectConfig;
use crate::errors::{AppError, AppResult, ResolveError, ResolveResult};
use crate::utils::UrlUtils;

pub use cache::{CacheKey, ResolutionCache};

/// Visited set and ordered chain of one resolution walk
#[derive(Debug, Default)]
struct RedirectChainState {
    visited: std::collections::HashSet<String>,
    chain: Vec<String>,
}

impl RedirectChainState {
    /// Record `url`; fails when it was already visited
    fn visit(&mut self, url: &str) -> ResolveResult<()> {
        if !self.visited.insert(url.to_string()) {
            let mut chain = std::mem::take(&mut self.chain);
            chain.push(url.to_string());
            return Err(ResolveError::CyclicRedirect { chain });
        }
        self.chain.push(url.to_string());
        Ok(())
    }

    fn hops(&self) -> usize {
        self.chain.len()
    }
}

pub struct RedirectResolver {
    client: Client,
    cache: ResolutionCache,
    timeout: Duration,
    max_redirects: usize,
}

impl RedirectResolver {
    pub fn new(config: &RedirectConfig) -> AppResult<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build probe client: {e}")))?;

        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| AppError::configuration("redirect.cache_capacity must be > 0"))?;

        Ok(Self {
            client,
            cache: ResolutionCache::new(capacity, config.cache_ttl),
            timeout: config.timeout,
            max_redirects: MAX_REDIRECT_ATTEMPTS,
        })
    }

    /// Resolve `seed_url` to the URL of its first non-redirect response
    pub async fn resolve(&self, seed_url: &str, client_identity: &str) -> ResolveResult<String> {
        let seed = parse_seed(seed_url)?;
        let key = CacheKey {
            seed_url: seed.to_string(),
            client_identity: client_identity.to_string(),
        };

        self.cache
            .get_or_resolve(key, || self.resolve_uncached(seed, client_identity))
            .await
    }

    async fn resolve_uncached(&self, seed: Url, client_identity: &str) -> ResolveResult<String> {
        let started = Instant::now();
        let seed_display = UrlUtils::obfuscate_credentials(seed.as_str());

        let result = tokio::time::timeout(self.timeout, self.follow(seed, client_identity))
            .await
            .unwrap_or(Err(ResolveError::Timeout {
                timeout_ms: self.timeout.as_millis(),
            }));

        match &result {
            Ok(final_url) => debug!(
                seed = %seed_display,
                final_url = %UrlUtils::obfuscate_credentials(final_url),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Redirect chain resolved"
            ),
            Err(e) => warn!(
                seed = %seed_display,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "Redirect resolution failed"
            ),
        }
        result
    }

    async fn follow(&self, seed: Url, client_identity: &str) -> ResolveResult<String> {
        let mut state = RedirectChainState::default();
        let mut current = seed;

        // One probe for the seed plus one per followed redirect
        for _ in 0..=self.max_redirects {
            state.visit(current.as_str())?;

            let mut request = self.client.head(current.clone());
            if !client_identity.is_empty() {
                request = request.header(USER_AGENT, client_identity);
            }
            let response = request.send().await.map_err(|e| ResolveError::Probe {
                url: current.to_string(),
                message: e.to_string(),
            })?;

            if !response.status().is_redirection() {
                debug!(
                    hops = state.hops(),
                    status = response.status().as_u16(),
                    "Redirect chain terminated"
                );
                return Ok(response.url().to_string());
            }

            let next = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| current.join(location.trim()).ok())
                .ok_or_else(|| ResolveError::InvalidLocationHeader {
                    url: current.to_string(),
                })?;

            debug!(
                from = %UrlUtils::obfuscate_credentials(current.as_str()),
                to = %UrlUtils::obfuscate_credentials(next.as_str()),
                status = response.status().as_u16(),
                "Following redirect"
            );
            current = next;
        }

        Err(ResolveError::MaxRedirectsExceeded {
            max: self.max_redirects,
        })
    }

    #[cfg(test)]
    fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }
}

fn parse_seed(seed_url: &str) -> ResolveResult<Url> {
    let seed =
        UrlUtils::parse_absolute(seed_url).map_err(|m| ResolveError::invalid_url(seed_url, m))?;
    match seed.scheme() {
        "http" | "https" => Ok(seed),
        other => Err(ResolveError::invalid_url(
            seed_url,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver() -> RedirectResolver {
        RedirectResolver::new(&RedirectConfig::default()).unwrap()
    }

    async fn mount_hop(server: &MockServer, from: &str, to: &str) {
        Mock::given(method("HEAD"))
            .and(path(from))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", to))
            .mount(server)
            .await;
    }

    async fn mount_terminal(server: &MockServer, at: &str) {
        Mock::given(method("HEAD"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_chain_resolves_to_last_hop() {
        let server = MockServer::start().await;
        for i in 0..3 {
            mount_hop(&server, &format!("/hop{i}"), &format!("/hop{}", i + 1)).await;
        }
        mount_terminal(&server, "/hop3").await;

        let final_url = resolver()
            .resolve(&format!("{}/hop0", server.uri()), "vlc/3.0")
            .await
            .unwrap();
        assert_eq!(final_url, format!("{}/hop3", server.uri()));
    }

    #[tokio::test]
    async fn test_ten_redirects_are_allowed() {
        let server = MockServer::start().await;
        for i in 0..10 {
            mount_hop(&server, &format!("/h{i}"), &format!("/h{}", i + 1)).await;
        }
        mount_terminal(&server, "/h10").await;

        let final_url = resolver()
            .resolve(&format!("{}/h0", server.uri()), "ua")
            .await
            .unwrap();
        assert!(final_url.ends_with("/h10"));
    }

    #[tokio::test]
    async fn test_eleven_redirects_exceed_limit() {
        let server = MockServer::start().await;
        for i in 0..11 {
            mount_hop(&server, &format!("/h{i}"), &format!("/h{}", i + 1)).await;
        }
        mount_terminal(&server, "/h11").await;

        let err = resolver()
            .resolve(&format!("{}/h0", server.uri()), "ua")
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::MaxRedirectsExceeded { max: 10 });
    }

    #[tokio::test]
    async fn test_cycle_reports_chain() {
        let server = MockServer::start().await;
        mount_hop(&server, "/a", "/b").await;
        mount_hop(&server, "/b", "/a").await;

        let base = server.uri();
        let err = resolver()
            .resolve(&format!("{base}/a"), "ua")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::CyclicRedirect {
                chain: vec![
                    format!("{base}/a"),
                    format!("{base}/b"),
                    format!("{base}/a"),
                ]
            }
        );
    }

    #[tokio::test]
    async fn test_missing_location_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(301))
            .mount(&server)
            .await;

        let err = resolver()
            .resolve(&format!("{}/broken", server.uri()), "ua")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidLocationHeader { .. }));
    }

    #[tokio::test]
    async fn test_probe_carries_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ua"))
            .and(header("user-agent", "Infuse/7.0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        resolver()
            .resolve(&format!("{}/ua", server.uri()), "Infuse/7.0")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_seed_is_rejected() {
        let resolver = resolver();
        for seed in ["", "/relative/path", "movie.mkv", "ftp://host/file"] {
            let err = resolver.resolve(seed, "ua").await.unwrap_err();
            assert!(matches!(err, ResolveError::InvalidUrl { .. }), "{seed}");
        }
    }

    #[tokio::test]
    async fn test_timeout_bounds_whole_walk() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = RedirectConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let err = RedirectResolver::new(&config)
            .unwrap()
            .resolve(&format!("{}/slow", server.uri()), "ua")
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::Timeout { timeout_ms: 50 });
    }

    #[tokio::test]
    async fn test_successful_resolution_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/end"))
            .expect(1)
            .mount(&server)
            .await;
        mount_terminal(&server, "/end").await;

        let resolver = resolver();
        let seed = format!("{}/start", server.uri());
        let first = resolver.resolve(&seed, "ua").await.unwrap();
        let second = resolver.resolve(&seed, "ua").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_hop_limit_is_configurable_for_tests() {
        let server = MockServer::start().await;
        mount_hop(&server, "/x0", "/x1").await;
        mount_hop(&server, "/x1", "/x2").await;
        mount_terminal(&server, "/x2").await;

        let err = resolver()
            .with_max_redirects(1)
            .resolve(&format!("{}/x0", server.uri()), "ua")
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::MaxRedirectsExceeded { max: 1 });
    }
}
