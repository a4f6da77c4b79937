use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::trace::SpanContext;
use std::net::SocketAddr;
use tracing::field::Empty;
use tracing::Instrument;

use crate::auth::Principal;

/// Wraps the rest of the request in a span carrying who is calling and
/// from where, so every log line emitted by a handler includes it.
///
/// Runs inside the session middleware so the final principal is known.
/// `trace.id` and `span.id` are filled in when telemetry is enabled and an
/// OpenTelemetry span covers the request.
pub async fn request_context(req: Request, next: Next) -> Response {
    let user_name = user_name(req.extensions().get::<Principal>());
    let request_id = header_value(req.headers(), "x-request-id");
    let client_ip = client_ip(
        req.headers(),
        req.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0),
    );
    let user_agent = header_value(req.headers(), "user-agent");

    let span = tracing::info_span!(
        "request",
        user.name = %user_name,
        request.id = %request_id,
        client.ip = client_ip.as_deref().unwrap_or(""),
        user_agent.original = %user_agent,
        trace.id = Empty,
        span.id = Empty,
    );
    if let Some((trace_id, span_id)) = trace_ids(req.extensions().get::<SpanContext>()) {
        span.record("trace.id", trace_id.as_str());
        span.record("span.id", span_id.as_str());
    }

    next.run(req).instrument(span).await
}

/// Hex trace and span ids, when the context refers to a real span.
fn trace_ids(cx: Option<&SpanContext>) -> Option<(String, String)> {
    cx.filter(|cx| cx.is_valid())
        .map(|cx| (cx.trace_id().to_string(), cx.span_id().to_string()))
}

fn user_name(principal: Option<&Principal>) -> String {
    match principal {
        Some(p) => p.display_name().to_string(),
        None => "anonymous".to_string(),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// First `X-Forwarded-For` hop, else the socket peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
