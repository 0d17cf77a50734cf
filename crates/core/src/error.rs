//! Typed error definitions for the BidFX pricing API.
//!
//! Provides [`BidFxError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the BidFX pricing client.
///
/// Config failures are fatal at construction, subject-validation failures
/// never cross a provider thread, and transport/version/protocol failures
/// abort the current connection and are reported through a `ProviderEvent`
/// rather than a synchronous return value.
#[derive(Debug, Error)]
pub enum BidFxError {
    /// Missing or invalid configuration. Fatal at construction.
    #[error("config error: {0}")]
    Config(String),

    /// A `Subject` failed validation in the `SubjectBuilder`. Never crosses a
    /// provider's reader task.
    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    /// General protocol or decode failure. Aborts the current connection.
    #[error("pricing error: {0}")]
    Pricing(String),

    /// The server negotiated a protocol version this client does not support.
    #[error("incompatible protocol version: {0}")]
    IncompatibleVersion(String),

    /// Socket-level failure: TLS handshake, certificate validation, tunnel
    /// rejection, or end-of-stream. Aborts the connection and triggers a
    /// reconnect.
    #[error("transport error: {0}")]
    Transport(String),
}

impl BidFxError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_subject(msg: impl Into<String>) -> Self {
        Self::InvalidSubject(msg.into())
    }

    pub fn pricing(msg: impl Into<String>) -> Self {
        Self::Pricing(msg.into())
    }

    pub fn incompatible_version(msg: impl Into<String>) -> Self {
        Self::IncompatibleVersion(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

impl From<std::io::Error> for BidFxError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BidFxError>;
