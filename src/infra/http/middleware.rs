use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Per-request identity shared by the logging layers.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    /// Route template such as `/posts/{id}`, not the concrete path.
    pub route: String,
}

impl RequestContext {
    fn for_request(request: &Request<Body>) -> Self {
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|path| path.as_str().to_string())
            .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
        Self {
            request_id: Uuid::new_v4().to_string(),
            route,
        }
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::for_request(&request);
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Log every request by route: failures at warn/error with the attached
/// [`ErrorReport`], successes at debug.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::for_request(&request));
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_success() {
        debug!(
            target = "hotposts::http::response",
            status = status.as_u16(),
            method = %method,
            route = %ctx.route,
            elapsed_ms,
            request_id = %ctx.request_id,
            "request served",
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, cause) = match report.as_ref() {
        Some(report) => (report.source, report.messages.join(": ")),
        None => ("unknown", String::from("no diagnostic available")),
    };

    if status.is_server_error() || status == StatusCode::SERVICE_UNAVAILABLE {
        error!(
            target = "hotposts::http::response",
            status = status.as_u16(),
            method = %method,
            route = %ctx.route,
            path = %path,
            elapsed_ms,
            source,
            cause = %cause,
            request_id = %ctx.request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "hotposts::http::response",
            status = status.as_u16(),
            method = %method,
            route = %ctx.route,
            path = %path,
            elapsed_ms,
            source,
            cause = %cause,
            request_id = %ctx.request_id,
            "request rejected",
        );
    }

    response
}
