/*!
 * Response Mutation
 * =================
 *
 * Wraps the upstream proxy for routes whose responses are rewritten. The
 * upstream response is buffered in full, handed to a mutator, and whatever
 * the mutator decides is sent to the client:
 *
 *     Ok(Mutation::Replaced)  new headers and body, Content-Length recomputed
 *     Ok(Mutation::Unchanged) original bytes
 *     Err(TransformError)     original bytes, failure logged
 *     panic                   original bytes, panic logged with backtrace
 *
 * A client always receives a response once the upstream answered.
 */

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response, Uri};
use bytes::Bytes;
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::errors::TransformError;

use super::upstream::{BufferedResponse, UpstreamProxy};

/// Outcome of a successful mutation
#[derive(Debug, Clone)]
pub enum Mutation {
    Unchanged,
    Replaced { headers: HeaderMap, body: Bytes },
}

/// What a mutator may know about the request that produced the response
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }
}

#[async_trait]
pub trait ResponseMutator: Send + Sync {
    /// Name used in log records
    fn name(&self) -> &'static str;

    async fn mutate(
        &self,
        request: &RequestContext,
        response: &BufferedResponse,
    ) -> Result<Mutation, TransformError>;
}

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Record the backtrace of every panic on the panicking thread so the
/// catching frame can log where the panic came from.
fn install_backtrace_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture().to_string();
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Proxy `request` and let `mutator` rewrite the buffered response
pub async fn serve_with_mutator(
    proxy: &UpstreamProxy,
    mutator: &dyn ResponseMutator,
    request: Request<Body>,
) -> Response<Body> {
    install_backtrace_hook();

    let context = RequestContext {
        method: request.method().clone(),
        uri: request.uri().clone(),
        headers: request.headers().clone(),
    };

    let original = match proxy.fetch_buffered(request).await {
        Ok(response) => response,
        Err(e) => {
            error!(mutator = mutator.name(), path = %context.path(), "Upstream request failed: {}", e);
            let mut response = Response::new(Body::from("Bad Gateway"));
            *response.status_mut() = axum::http::StatusCode::BAD_GATEWAY;
            return response;
        }
    };

    if !original.status.is_success() {
        debug!(
            mutator = mutator.name(),
            status = original.status.as_u16(),
            "Skipping mutation of non-success response"
        );
        return original.into_response();
    }

    let outcome = AssertUnwindSafe(mutator.mutate(&context, &original))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(Mutation::Replaced { headers, body })) => {
            debug!(
                mutator = mutator.name(),
                path = %context.path(),
                original_len = original.body.len(),
                new_len = body.len(),
                "Response mutated"
            );
            replaced_response(original.status, headers, body)
        }
        Ok(Ok(Mutation::Unchanged)) => original.into_response(),
        Ok(Err(e)) => {
            warn!(
                mutator = mutator.name(),
                path = %context.path(),
                "Mutation failed, forwarding original response: {}",
                e
            );
            original.into_response()
        }
        Err(payload) => {
            let backtrace = PANIC_BACKTRACE
                .with(|slot| slot.borrow_mut().take())
                .unwrap_or_else(|| Backtrace::force_capture().to_string());
            error!(
                mutator = mutator.name(),
                path = %context.path(),
                panic = %panic_message(payload.as_ref()),
                backtrace = %backtrace,
                "Mutator panicked, forwarding original response"
            );
            original.into_response()
        }
    }
}

fn replaced_response(
    status: axum::http::StatusCode,
    mut headers: HeaderMap,
    body: Bytes,
) -> Response<Body> {
    headers.remove(header::CONTENT_ENCODING);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    BufferedResponse {
        status,
        headers,
        body,
    }
    .into_response()
}
