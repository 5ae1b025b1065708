//! Transparent forwarding to the media server.
//!
//! Requests keep their method, path, query, headers and body. Responses are
//! either streamed straight back to the client or buffered whole so a
//! mutator can rewrite them. Redirects from the media server are returned to
//! the client as-is.

use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::http::{header, HeaderMap, HeaderName, Request, Response, StatusCode};
use bytes::Bytes;
use reqwest::{redirect, Client};
use tracing::{debug, error};
use url::Url;

use crate::errors::{AppError, AppResult, UpstreamError, UpstreamResult};
use crate::utils::UrlUtils;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Headers that describe one connection rather than the message
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Fully read upstream response
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BufferedResponse {
    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

pub struct UpstreamProxy {
    client: Client,
    base: Url,
}

impl UpstreamProxy {
    pub fn new(addr: &str) -> AppResult<Self> {
        let base = UrlUtils::parse_absolute(addr)
            .map_err(|m| AppError::configuration(format!("Invalid upstream address '{addr}': {m}")))?;

        // No total timeout: video bodies stream for as long as the client watches
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build upstream client: {e}")))?;

        Ok(Self { client, base })
    }

    /// Forward and stream the response back untouched
    pub async fn forward(&self, request: Request<Body>) -> Response<Body> {
        match self.send(request, false).await {
            Ok(upstream) => {
                let status = upstream.status();
                let headers = strip_hop_by_hop(upstream.headers());
                let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            Err(e) => bad_gateway(&e),
        }
    }

    /// Forward and read the whole response body.
    ///
    /// `Accept-Encoding` is dropped so the body arrives uncompressed and can be
    /// rewritten.
    pub async fn fetch_buffered(&self, request: Request<Body>) -> UpstreamResult<BufferedResponse> {
        let upstream = self.send(request, true).await?;
        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers());
        let url = upstream.url().to_string();
        let body = upstream
            .bytes()
            .await
            .map_err(|e| UpstreamError::request(url, &e))?;

        Ok(BufferedResponse {
            status,
            headers,
            body,
        })
    }

    /// Absolute upstream URL for an inbound path and query
    pub fn target_url(&self, path_and_query: &str) -> String {
        let base = self.base.as_str().trim_end_matches('/');
        format!("{base}{path_and_query}")
    }

    async fn send(
        &self,
        request: Request<Body>,
        identity_encoding: bool,
    ) -> UpstreamResult<reqwest::Response> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self.target_url(path_and_query);

        let mut headers = strip_hop_by_hop(&parts.headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        if identity_encoding {
            headers.remove(header::ACCEPT_ENCODING);
        }

        let body_length = body.size_hint().exact();

        debug!(
            method = %parts.method,
            url = %UrlUtils::obfuscate_credentials(&url),
            "Forwarding request upstream"
        );

        let mut builder = self
            .client
            .request(parts.method.clone(), &url)
            .headers(headers);
        // Request bodies stream through; a known length is passed on so
        // uploads are not re-framed as chunked
        match body_length {
            Some(0) => {}
            Some(length) => {
                builder = builder
                    .header(header::CONTENT_LENGTH, length)
                    .body(reqwest::Body::wrap_stream(body.into_data_stream()));
            }
            None => {
                builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
            }
        }

        builder
            .send()
            .await
            .map_err(|e| UpstreamError::request(UrlUtils::obfuscate_credentials(&url), &e))
    }
}

/// Copy of `headers` without connection-scoped entries, including any
/// header named in `Connection`
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let named_in_connection: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    let mut cleaned = headers.clone();
    for name in HOP_BY_HOP {
        cleaned.remove(name);
    }
    for name in named_in_connection {
        cleaned.remove(name);
    }
    cleaned
}

fn bad_gateway(err: &UpstreamError) -> Response<Body> {
    error!("Upstream request failed: {}", err);
    let mut response = Response::new(Body::from("Bad Gateway"));
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_hop_by_hop_headers_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-custom"));
        headers.insert("x-custom", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let cleaned = strip_hop_by_hop(&headers);
        assert!(cleaned.get(header::CONNECTION).is_none());
        assert!(cleaned.get("x-custom").is_none());
        assert!(cleaned.get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(cleaned.get(header::CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_target_url_joins_base_and_path() {
        let proxy = UpstreamProxy::new("http://emby:8096/").unwrap();
        assert_eq!(
            proxy.target_url("/emby/Items/1/PlaybackInfo?api_key=x"),
            "http://emby:8096/emby/Items/1/PlaybackInfo?api_key=x"
        );
    }

    #[tokio::test]
    async fn test_request_body_streams_to_upstream() {
        use wiremock::matchers::{body_string, header as header_eq, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emby/Items/1/Images/Primary"))
            .and(header_eq("content-length", "11"))
            .and(body_string("image-bytes"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let proxy = UpstreamProxy::new(&server.uri()).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/emby/Items/1/Images/Primary")
            .body(Body::from("image-bytes"))
            .unwrap();
        let response = proxy.forward(request).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_empty_request_body_sends_no_payload() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/System/Info"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let proxy = UpstreamProxy::new(&server.uri()).unwrap();

        let request = Request::builder()
            .uri("/System/Info")
            .body(Body::empty())
            .unwrap();
        let response = proxy.forward(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].body.is_empty());
        assert!(received[0].headers.get("transfer-encoding").is_none());
    }

    #[test]
    fn test_invalid_upstream_is_configuration_error() {
        assert!(matches!(
            UpstreamProxy::new("not a url"),
            Err(AppError::Configuration { .. })
        ));
    }
}
