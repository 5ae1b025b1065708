//! Video stream requests.
//!
//! ```text
//! HEAD ───────────────────────────────────────────────────────► forward
//! GET  ─► item key ─► lock ─► query item ─► not .strm ────────► forward
//!                                         └► classify
//!                                             ├ HttpStrm  ─► resolve ─► 302
//!                                             ├ AlistStrm ─► build   ─► 302
//!                                             └ Unknown   ────────────► forward
//! ```
//!
//! Every failure on the way degrades to forwarding the original request. The
//! per-item lock covers the decision only; forwarded bodies stream after it
//! has been released.

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::streaming::StrmClassification;
use crate::utils::UrlUtils;

use super::Gateway;

/// Outcome of the locked part of the flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoDecision {
    Redirect(String),
    Forward(&'static str),
}

pub(super) async fn handle(gateway: &Gateway, request: Request<Body>) -> Response<Body> {
    if request.method() == Method::HEAD {
        debug!(path = %request.uri().path(), "HEAD video request forwarded");
        return gateway.proxy.forward(request).await;
    }

    let Some(item_key) = gateway.adapter.video_item_id(request.uri().path()) else {
        return gateway.proxy.forward(request).await;
    };
    let requested_source =
        UrlUtils::query_value_case_insensitive(request.uri().query(), "MediaSourceId")
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| item_key.clone());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let decision = {
        let _guard = gateway.locks.acquire(&item_key).await;
        debug!(item = %item_key, source = %requested_source, "Processing video request");
        decide(gateway, &requested_source, &user_agent).await
    };

    match decision {
        VideoDecision::Redirect(location) => match found(&location) {
            Some(response) => {
                info!(
                    item = %item_key,
                    location = %UrlUtils::obfuscate_credentials(&location),
                    "Redirecting video request"
                );
                response
            }
            None => {
                warn!(item = %item_key, "Redirect target is not a valid header value");
                gateway.proxy.forward(request).await
            }
        },
        VideoDecision::Forward(reason) => {
            debug!(item = %item_key, reason, "Forwarding video request");
            gateway.proxy.forward(request).await
        }
    }
}

/// Decide between redirecting and forwarding; runs under the item lock
pub async fn decide(gateway: &Gateway, requested_source: &str, user_agent: &str) -> VideoDecision {
    let adapter = &gateway.adapter;

    let item = match adapter.query_item(&adapter.normalize_id(requested_source)).await {
        Ok(item) => item,
        Err(e) => {
            warn!(source = %requested_source, "Item query failed: {}", e);
            return VideoDecision::Forward("item query failed");
        }
    };
    if !item.is_strm() {
        return VideoDecision::Forward("not a STRM entry");
    }
    let Some(item_path) = item.path.as_deref() else {
        return VideoDecision::Forward("item has no path");
    };

    let classification = gateway.classifier.classify(item_path);
    let Some(source) = item
        .media_sources
        .iter()
        .find(|s| adapter.is_requested_source(s, requested_source))
    else {
        return VideoDecision::Forward("no matching media source");
    };
    let Some(source_path) = source.path.as_deref() else {
        return VideoDecision::Forward("media source has no path");
    };

    match classification {
        StrmClassification::HttpStrm => {
            if !source.is_http_protocol() {
                return VideoDecision::Forward("HTTP STRM source is not served over HTTP");
            }
            match gateway.resolver.resolve(source_path, user_agent).await {
                Ok(url) => VideoDecision::Redirect(url),
                Err(e) => {
                    warn!(
                        seed = %UrlUtils::obfuscate_credentials(source_path),
                        safety = e.is_safety_violation(),
                        "Redirect resolution failed: {}",
                        e
                    );
                    VideoDecision::Forward("redirect resolution failed")
                }
            }
        }
        StrmClassification::AlistStrm { endpoint } => {
            match gateway.storage.download_url(&endpoint, source_path).await {
                Ok(url) => VideoDecision::Redirect(url),
                Err(e) => {
                    warn!(endpoint = %endpoint, path = %source_path, "Download URL lookup failed: {}", e);
                    VideoDecision::Forward("download URL lookup failed")
                }
            }
        }
        StrmClassification::Unknown => VideoDecision::Forward("unclassified STRM entry"),
    }
}

fn found(location: &str) -> Option<Response<Body>> {
    let value = HeaderValue::from_str(location).ok()?;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    response.headers_mut().insert(header::LOCATION, value);
    Some(response)
}
