//! Shared-secret authentication for the webhook endpoint.
//!
//! SafeSend sends the API key configured in its developer section on every
//! call. The header name is configurable; when it is `Authorization` the
//! value may also arrive as `Bearer <key>`.

use axum::http::HeaderMap;
use tracing::{info, warn};

/// Outcome of checking a request's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Accepted,
    /// Header absent or not valid UTF-8
    Missing,
    /// Header present but wrong
    Invalid,
    /// No secret configured; every request is rejected
    NotConfigured,
}

impl AuthDecision {
    pub fn is_accepted(self) -> bool {
        self == AuthDecision::Accepted
    }
}

/// Check the shared-secret header. Logs the decision, never the values.
pub fn verify_api_key(
    headers: &HeaderMap,
    header_name: &str,
    expected: Option<&str>,
) -> AuthDecision {
    let decision = decide(headers, header_name, expected);

    match decision {
        AuthDecision::Accepted => info!(header = header_name, "webhook_auth_accepted"),
        AuthDecision::Missing => warn!(header = header_name, "webhook_auth_missing"),
        AuthDecision::Invalid => warn!(header = header_name, "webhook_auth_invalid"),
        AuthDecision::NotConfigured => warn!("webhook_auth_not_configured"),
    }

    decision
}

fn decide(headers: &HeaderMap, header_name: &str, expected: Option<&str>) -> AuthDecision {
    let expected = match expected.map(str::trim).filter(|k| !k.is_empty()) {
        Some(k) => k,
        None => return AuthDecision::NotConfigured,
    };

    let provided = match headers.get(header_name).and_then(|v| v.to_str().ok()) {
        Some(v) => v.trim(),
        None => return AuthDecision::Missing,
    };

    if constant_time_compare(provided, expected) {
        return AuthDecision::Accepted;
    }

    if header_name.eq_ignore_ascii_case("authorization") {
        if let Some(token) = strip_bearer(provided) {
            if constant_time_compare(token, expected) {
                return AuthDecision::Accepted;
            }
        }
    }

    AuthDecision::Invalid
}

fn strip_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_static(value));
        map
    }

    #[test]
    fn test_accepts_matching_key() {
        let h = headers("x-api-key", "key-123");
        assert_eq!(
            verify_api_key(&h, "x-api-key", Some("key-123")),
            AuthDecision::Accepted
        );
    }

    #[test]
    fn test_rejects_missing_and_wrong_key() {
        assert_eq!(
            verify_api_key(&HeaderMap::new(), "x-api-key", Some("key-123")),
            AuthDecision::Missing
        );
        let h = headers("x-api-key", "key-124");
        assert_eq!(
            verify_api_key(&h, "x-api-key", Some("key-123")),
            AuthDecision::Invalid
        );
    }

    #[test]
    fn test_key_in_other_header_is_missing() {
        let h = headers("authorization", "key-123");
        assert_eq!(
            verify_api_key(&h, "x-api-key", Some("key-123")),
            AuthDecision::Missing
        );
    }

    #[test]
    fn test_authorization_header_raw_and_bearer() {
        let raw = headers("authorization", "key-123");
        assert!(verify_api_key(&raw, "authorization", Some("key-123")).is_accepted());

        let bearer = headers("authorization", "Bearer key-123");
        assert!(verify_api_key(&bearer, "authorization", Some("key-123")).is_accepted());

        let basic = headers("authorization", "Basic key-123");
        assert_eq!(
            verify_api_key(&basic, "authorization", Some("key-123")),
            AuthDecision::Invalid
        );
    }

    #[test]
    fn test_bearer_prefix_only_for_authorization() {
        let h = headers("x-api-key", "Bearer key-123");
        assert_eq!(
            verify_api_key(&h, "x-api-key", Some("key-123")),
            AuthDecision::Invalid
        );
    }

    #[test]
    fn test_unconfigured_secret_rejects() {
        let h = headers("x-api-key", "anything");
        assert_eq!(verify_api_key(&h, "x-api-key", None), AuthDecision::NotConfigured);
        assert_eq!(
            verify_api_key(&h, "x-api-key", Some("  ")),
            AuthDecision::NotConfigured
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
