//! Request-token service and attribute-safe escaping.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Literal placeholder that templates may leave behind for the live token.
pub const REQUEST_TOKEN_PLACEHOLDER: &str = "{{request_token}}";

/// Process-wide CSRF token provider. One token per worker process; the
/// value is stable for the lifetime of the provider.
#[derive(Debug, Clone)]
pub struct CsrfTokenProvider {
    token: String,
}

impl CsrfTokenProvider {
    pub fn new() -> Self {
        let seed = Uuid::new_v4();
        let digest = Sha256::digest(seed.as_bytes());
        Self {
            token: hex::encode(&digest[..16]),
        }
    }

    /// Fixed token, for deterministic wiring in tests.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Default for CsrfTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape a value for interpolation into a double-quoted HTML attribute.
/// Quotes are escaped too, so a hostile value cannot break out of the
/// attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
