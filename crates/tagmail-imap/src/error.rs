//! Error types for the IMAP client.

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// The connection is closed.
    ///
    /// A closed connection is terminal: pending commands are abandoned and
    /// new sends fail. Open a fresh connection to continue.
    #[error("connection closed: {0}")]
    Closed(String),

    /// Envelope decoding failed for one message.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
