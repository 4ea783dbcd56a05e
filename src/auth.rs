//! Request identity and admin checks
//!
//! Authentication itself happens upstream: the gateway passes the
//! authenticated user id in `x-user-id`. Admin listings additionally require
//! `x-admin-token` to match the configured token.

use axum::http::HeaderMap;
use std::net::SocketAddr;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::models::UserId;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Authenticated user, if the gateway supplied one
///
/// A header that is present but unparsable counts as unauthenticated.
pub fn user_id_from_headers(headers: &HeaderMap) -> Option<UserId> {
    let raw = headers.get(USER_ID_HEADER)?;
    match raw.to_str().ok().and_then(|v| v.trim().parse::<UserId>().ok()) {
        Some(id) if id > 0 => Some(id),
        _ => {
            debug!("Ignoring malformed {} header", USER_ID_HEADER);
            None
        }
    }
}

/// Check the admin token; `expected` of `None` disables admin access
pub fn require_admin(headers: &HeaderMap, expected: Option<&str>) -> CoreResult<()> {
    let Some(expected) = expected else {
        return Err(CoreError::Forbidden(
            "Admin endpoints are disabled".to_string(),
        ));
    };

    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(CoreError::NotAuthenticated)?;

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(CoreError::Forbidden("Invalid admin token".to_string()))
    }
}

/// Source address of a submission: first `x-forwarded-for` hop, else the peer
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_user_id_header() {
        assert_eq!(user_id_from_headers(&headers(&[("x-user-id", "42")])), Some(42));
        assert_eq!(user_id_from_headers(&headers(&[("x-user-id", "abc")])), None);
        assert_eq!(user_id_from_headers(&headers(&[("x-user-id", "-3")])), None);
        assert_eq!(user_id_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_admin_token() {
        let ok = headers(&[("x-admin-token", "letmein")]);
        assert!(require_admin(&ok, Some("letmein")).is_ok());

        let wrong = headers(&[("x-admin-token", "letmeout")]);
        let prefix = headers(&[("x-admin-token", "letme")]);
        assert!(matches!(
            require_admin(&prefix, Some("letmein")),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            require_admin(&wrong, Some("letmein")),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            require_admin(&HeaderMap::new(), Some("letmein")),
            Err(CoreError::NotAuthenticated)
        ));
        assert!(matches!(
            require_admin(&ok, None),
            Err(CoreError::Forbidden(_))
        ));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        let forwarded = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);

        assert_eq!(client_ip(&forwarded, Some(peer)).as_deref(), Some("203.0.113.9"));
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)).as_deref(), Some("10.1.2.3"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
