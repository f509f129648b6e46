/*
 * Responsibility
 * - Token (リクエストから取り出した認証トークン) と Identity (ストアが返す主体) の型
 * - どちらも opaque な byte 列として扱い、フォーマット検証はしない
 * - ログに生トークンを出さないための fingerprint
 */
use std::fmt;

use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;
use sha2::{Digest, Sha256};

/// Credential extracted verbatim from a request header or cookie.
///
/// `Debug` never prints the raw bytes; use [`Token::fingerprint`] for logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(Vec<u8>);

impl Token {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn fingerprint(&self) -> TokenFingerprint {
        let digest = Sha256::digest(&self.0);
        let mut head = [0u8; 6];
        head.copy_from_slice(&digest[..6]);
        TokenFingerprint(head)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.fingerprint())
    }
}

/// Short SHA-256 prefix of a token, safe to emit in diagnostics.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenFingerprint([u8; 6]);

impl fmt::Display for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Authenticated principal as stored in the key-value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(Vec<u8>);

impl Identity {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    // Fails when the stored value carries bytes a header cannot hold (CR/LF, NUL, ...).
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_bytes(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_does_not_leak_raw_token() {
        let token = Token::new("super-secret-session");
        let rendered = format!("{token:?}");

        assert!(!rendered.contains("super-secret-session"));
        assert_eq!(rendered, format!("Token({})", token.fingerprint()));
    }

    #[test]
    fn fingerprint_is_stable_and_twelve_hex_chars() {
        let a = Token::new("abc123").fingerprint().to_string();
        let b = Token::new("abc123").fingerprint().to_string();

        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        // sha256("abc123") = 6ca13d52ca70c883...
        assert_eq!(a, "6ca13d52ca70");
        assert_ne!(a, Token::new("abc124").fingerprint().to_string());
    }

    #[test]
    fn identity_with_newline_is_not_a_header_value() {
        assert!(Identity::new("user-42").to_header_value().is_ok());
        assert!(Identity::new("user\r\n42").to_header_value().is_err());
    }
}
