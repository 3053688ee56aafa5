use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// An access or refresh credential.
///
/// `Debug` and `Display` print `[REDACTED]`; use [`expose`](Self::expose)
/// when building the `Authorization` header or the refresh request body.
/// The backing buffer is zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read-only access to the raw credential.
    ///
    /// Callers must not log or persist the returned slice outside a
    /// [`CredentialStore`](crate::CredentialStore).
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

// Equality is needed to tell a stale credential from the current one.
impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn formatting_never_shows_the_credential() {
        let s = SecretString::new("eyJhbGciOi.payload.sig");
        assert_eq!(format!("{s:?}"), "[REDACTED]");
        assert_eq!(format!("{s}"), "[REDACTED]");
    }

    #[test]
    fn expose_returns_original_value() {
        assert_eq!(SecretString::new("a1").expose(), "a1");
    }

    #[test]
    fn equality_compares_contents() {
        assert_eq!(SecretString::new("a1"), SecretString::new("a1"));
        assert_ne!(SecretString::new("a1"), SecretString::new("a2"));
    }

    #[test]
    fn zeroize_clears_buffer() {
        let mut s = SecretString::new("sensitive");
        s.zeroize();
        assert!(s.is_empty());
    }
}
