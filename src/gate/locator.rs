//! Credential locator: find the session token in request metadata.
//!
//! A configured header name takes precedence; the cookie is only searched when
//! no header name is configured. Header names are compared exactly
//! (case-insensitively, as HTTP requires), never by prefix.

use axum::http::{HeaderMap, HeaderName, header};

use crate::gate::scope::GateConfig;
use crate::gate::token::Token;

/// Returns the token for `config`, or `None` when the configured source is absent.
pub fn locate(headers: &HeaderMap, config: &GateConfig) -> Option<Token> {
    match &config.header_name {
        Some(name) => {
            let token = search_header(headers, name);
            if token.is_none() {
                tracing::debug!(header = %name, "could not locate credential header");
            }
            token
        }
        None => search_cookies(headers, &config.cookie_name),
    }
}

/// First value of header `name`, in received order.
pub fn search_header(headers: &HeaderMap, name: &HeaderName) -> Option<Token> {
    headers
        .get(name)
        .map(|value| Token::new(value.as_bytes()))
}

/// First cookie called `name` across every `Cookie` header line.
pub fn search_cookies(headers: &HeaderMap, name: &str) -> Option<Token> {
    if name.is_empty() {
        return None;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .flat_map(|line| line.as_bytes().split(|b| *b == b';'))
        .find_map(|pair| {
            let pair = pair.trim_ascii();
            let eq = pair.iter().position(|b| *b == b'=')?;
            let (key, value) = (&pair[..eq], &pair[eq + 1..]);
            (key.trim_ascii() == name.as_bytes()).then(|| Token::new(value.trim_ascii()))
        })
}
