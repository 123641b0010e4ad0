//! Middlewares for routes.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::ServerError;
use crate::error::Result;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Address of the caller.
fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_owned();
        }
    }

    peer.ip().to_canonical().to_string()
}

fn has_valid_token(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match (provided, expected) {
        (Some(provided), Some(expected)) if !expected.is_empty() => {
            provided.len() == expected.len()
                && provided
                    .bytes()
                    .zip(expected.bytes())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
        },
        _ => false,
    }
}

/// Middleware admitting allowlisted addresses holding the API key.
pub async fn secure_access(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let ip = client_ip(req.headers(), peer, state.config.security.trust_forwarded_for);

    if !state.store.is_ip_allowed(&ip).await? {
        tracing::warn!(%ip, "request from unauthorized address");
        return Err(ServerError::UnauthorizedIp(ip));
    }

    if !has_valid_token(req.headers(), state.config.security.api_key.as_deref()) {
        tracing::warn!(%ip, "request with invalid api token");
        return Err(ServerError::InvalidToken);
    }

    Ok(next.run(req).await)
}
