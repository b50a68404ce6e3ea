use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::fmt;
use std::net::SocketAddr;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::error::ClickError;
use crate::handlers::AppState;
use crate::rate_limiter::Decision;
use crate::response::RateLimitedResponse;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Network origin of a request, used as the rate-limit identity.
/// Taken verbatim; never validated or normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tags the request with an id and a client identity, and logs it.
pub async fn request_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let identity = resolve_client_identity(&request, state.trust_proxy_headers);

    let method = request.method().clone();
    let uri = request.uri().clone();
    let span = tracing::info_span!("request", request_id = %request_id);

    info!(
        parent: &span,
        method = %method,
        uri = %uri,
        client_ip = %identity,
        "Incoming request"
    );

    request.extensions_mut().insert(identity);
    let mut response = next.run(request).instrument(span.clone()).await;

    info!(
        parent: &span,
        method = %method,
        uri = %uri,
        status = %response.status(),
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Admission check in front of the click route. Store errors reject the
/// request with a 500.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    request: Request,
    next: Next,
) -> Response {
    let settings = state.service.rate_limit_settings().clone();

    match state.service.admit(identity.as_str()).await {
        Ok(Decision::Admitted { remaining, .. }) => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static(RATE_LIMIT_LIMIT_HEADER),
                HeaderValue::from(settings.max_requests),
            );
            headers.insert(
                HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
                HeaderValue::from(remaining),
            );
            response
        }
        Ok(Decision::Rejected {
            retry_after_secs, ..
        }) => {
            let body = RateLimitedResponse::new(&settings, retry_after_secs);
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
        Err(e) => ClickError::store("Internal Server Error")(e).into_response(),
    }
}

/// Socket peer address by default. Behind a trusted proxy, the first
/// `x-forwarded-for` entry wins, then `x-real-ip`.
pub fn resolve_client_identity(request: &Request, trust_proxy_headers: bool) -> ClientIdentity {
    if trust_proxy_headers {
        if let Some(forwarded) = request.headers().get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    let first_ip = first_ip.trim();
                    if !first_ip.is_empty() {
                        return ClientIdentity(first_ip.to_string());
                    }
                }
            }
        }

        if let Some(real_ip) = request.headers().get("x-real-ip") {
            if let Ok(ip_str) = real_ip.to_str() {
                let ip_str = ip_str.trim();
                if !ip_str.is_empty() {
                    return ClientIdentity(ip_str.to_string());
                }
            }
        }
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => ClientIdentity(addr.ip().to_string()),
        None => ClientIdentity("unknown".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_from(addr: &str) -> Request {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        request
    }

    #[test]
    fn test_identity_is_peer_ip_without_port() {
        let request = request_from("192.0.2.10:51234");
        assert_eq!(
            resolve_client_identity(&request, false),
            ClientIdentity("192.0.2.10".to_string())
        );
    }

    #[test]
    fn test_forwarded_header_ignored_unless_trusted() {
        let mut request = request_from("192.0.2.10:51234");
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.7, 10.0.0.1"),
        );

        assert_eq!(resolve_client_identity(&request, false).as_str(), "192.0.2.10");
        assert_eq!(resolve_client_identity(&request, true).as_str(), "198.51.100.7");
    }

    #[test]
    fn test_real_ip_header_when_trusted() {
        let mut request = request_from("192.0.2.10:51234");
        request
            .headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));

        assert_eq!(resolve_client_identity(&request, true).as_str(), "203.0.113.1");
    }

    #[test]
    fn test_blank_proxy_headers_fall_back_to_peer() {
        let mut request = request_from("192.0.2.10:51234");
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static(" "));
        request
            .headers_mut()
            .insert("x-real-ip", HeaderValue::from_static(""));

        assert_eq!(resolve_client_identity(&request, true).as_str(), "192.0.2.10");
    }

    #[test]
    fn test_identity_fallback() {
        let request = Request::new(axum::body::Body::empty());
        assert_eq!(resolve_client_identity(&request, true).as_str(), "unknown");
    }
}
