//! Shared secrets: the OAuth state nonce and the webhook channel token.

use std::fmt;

/// A secret string compared in constant time and never printed.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a random URL-safe secret.
    pub fn generate() -> Self {
        Self(calhook_providers::google::generate_state())
    }

    /// Exposes the value for sending it to the provider. Do not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Compares against an untrusted candidate in constant time.
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), candidate.as_bytes())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

/// Length check, then XOR-fold over every byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
