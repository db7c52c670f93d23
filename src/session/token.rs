//! Session token extraction.
//!
//! The token is opaque: it is located, never parsed or validated here. The
//! upstream session manager accepts the cookie first and a bearer header as a
//! fallback, so extraction follows the same order.

use axum::http::{
    HeaderMap,
    header::{AUTHORIZATION, COOKIE},
};
use secrecy::SecretString;

/// Opaque bearer credential carried by the session cookie.
#[derive(Clone, Debug)]
pub struct SessionToken(SecretString);

/// Locate the session token in the named cookie or the `Authorization` header.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<SessionToken> {
    extract_cookie(headers, cookie_name)
        .or_else(|| extract_bearer_token(headers))
        .map(|token| SessionToken(SecretString::from(token)))
}

fn extract_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    // Browsers may split cookies over several headers behind some proxies.
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == cookie_name && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use secrecy::ExposeSecret;

    fn secret(token: &SessionToken) -> &str {
        token.0.expose_secret()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn finds_named_cookie_among_others() {
        let map = headers(&[("cookie", "theme=dark; session_token=abc123; lang=en")]);
        let token = extract_session_token(&map, "session_token");
        assert_eq!(token.as_ref().map(secret), Some("abc123"));
    }

    #[test]
    fn ignores_similarly_named_and_empty_cookies() {
        let map = headers(&[("cookie", "session_token_old=zzz; session_token=")]);
        assert!(extract_session_token(&map, "session_token").is_none());
    }

    #[test]
    fn reads_split_cookie_headers() {
        let map = headers(&[("cookie", "theme=dark"), ("cookie", "session_token=xyz")]);
        let token = extract_session_token(&map, "session_token");
        assert_eq!(token.as_ref().map(secret), Some("xyz"));
    }

    #[test]
    fn falls_back_to_bearer() {
        let map = headers(&[("authorization", "Bearer tok-1")]);
        let token = extract_session_token(&map, "session_token");
        assert_eq!(token.as_ref().map(secret), Some("tok-1"));

        let map = headers(&[("authorization", "Basic dXNlcjpwdw==")]);
        assert!(extract_session_token(&map, "session_token").is_none());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let map = headers(&[("cookie", "session_token=very-secret")]);
        let token = extract_session_token(&map, "session_token");
        assert!(!format!("{token:?}").contains("very-secret"));
    }
}
