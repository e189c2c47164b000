//! SASL credential encoding for the bearer-token mechanism.
//!
//! Implements XOAUTH2 (Google/Microsoft proprietary): the client presents a
//! pre-obtained `OAuth2` access token instead of a password. No other
//! mechanism is supported.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Mechanism identifier sent with AUTHENTICATE.
pub const XOAUTH2_MECHANISM: &str = "XOAUTH2";

/// Username plus opaque bearer access token.
///
/// Supplied by an external `OAuth2` flow and never mutated; held only long
/// enough to build the authentication blob.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Account username (usually the email address).
    pub username: String,
    /// `OAuth2` bearer access token.
    pub access_token: String,
}

impl Credential {
    /// Creates a new credential.
    #[must_use]
    pub fn new(username: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            access_token: access_token.into(),
        }
    }

    /// Builds the XOAUTH2 initial response for this credential.
    #[must_use]
    pub fn initial_response(&self) -> String {
        xoauth2_initial_response(&self.username, &self.access_token)
    }
}

/// Generates the XOAUTH2 initial response.
///
/// Format: `user=<user>\x01auth=Bearer <token>\x01\x01` (base64 encoded).
#[must_use]
pub fn xoauth2_initial_response(username: &str, access_token: &str) -> String {
    let auth_string = format!("user={username}\x01auth=Bearer {access_token}\x01\x01");
    STANDARD.encode(auth_string.as_bytes())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_xoauth2_format() {
        let response = xoauth2_initial_response("a@b.com", "tok123");
        let decoded = STANDARD.decode(&response).unwrap();
        let decoded_str = String::from_utf8(decoded).unwrap();

        assert_eq!(decoded_str, "user=a@b.com\x01auth=Bearer tok123\x01\x01");
    }

    #[test]
    fn test_xoauth2_structure() {
        let response = xoauth2_initial_response("user@example.com", "token123");
        let decoded = STANDARD.decode(&response).unwrap();
        let decoded_str = String::from_utf8(decoded).unwrap();

        assert!(decoded_str.starts_with("user=user@example.com"));
        assert!(decoded_str.contains("auth=Bearer token123"));
        assert!(decoded_str.ends_with("\x01\x01"));
    }

    #[test]
    fn test_response_is_base64() {
        let response = xoauth2_initial_response("user@example.com", "token");
        // Should not contain raw text, only base64 characters
        assert!(!response.contains("user@example.com"));
        assert!(!response.contains("token"));
        assert!(STANDARD.decode(&response).is_ok());
    }

    #[test]
    fn test_credential_initial_response() {
        let credential = Credential::new("a@b.com", "tok123");
        assert_eq!(
            credential.initial_response(),
            xoauth2_initial_response("a@b.com", "tok123")
        );
    }
}
