//! Error types and handling for gwsync-core operations.
//!
//! A single error enum covers every failure the sync engine can observe.
//! Errors are categorized so pollers can decide whether a failure aborts a
//! whole cycle or only the item being handled.
//!
//! ## Error Categories
//!
//! - **Remote Errors**: a call to the gateway management plane failed
//! - **Parse Errors**: spec content or resource files could not be read
//! - **Publish Errors**: the downstream registry rejected a description
//! - **Configuration Errors**: invalid settings or config files
//!
//! ## Recovery Hints
//!
//! ```rust
//! use gwsync_core::Error;
//!
//! let err = Error::remote("list_specs", "connection reset");
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "remote");
//! ```

use thiserror::Error;

/// The main error type for gwsync-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A call against the remote catalog failed.
    ///
    /// Raised by [`RemoteCatalogClient`](crate::RemoteCatalogClient)
    /// implementations. When raised by a listing call the poll cycle is
    /// aborted; when raised while handling a single item only that item is
    /// skipped.
    #[error("Remote call '{operation}' failed: {message}")]
    Remote {
        /// Name of the collaborator operation (e.g. `list_specs`).
        operation: String,
        /// Failure description from the collaborator.
        message: String,
    },

    /// Content could not be parsed.
    ///
    /// Covers spec documents handed to a [`SpecParser`](crate::SpecParser)
    /// and association resource files attached to proxy revisions.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Requested resource was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The downstream registry rejected a publish.
    ///
    /// The fingerprint attribute for the catalog item is left untouched so
    /// the next cycle reaches the same decision and retries.
    #[error("Publish failed for '{catalog_id}': {reason}")]
    Publish {
        /// Catalog ID of the description that failed to publish.
        catalog_id: String,
        /// Reason reported by the publisher.
        reason: String,
    },

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// URL is malformed or invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The remote collaborator is not ready to serve calls.
    #[error("Remote catalog not ready: {0}")]
    NotReady(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl Error {
    /// Build a [`Error::Remote`] for the named collaborator operation.
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Build a [`Error::Publish`] for a catalog item.
    pub fn publish(catalog_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Publish {
            catalog_id: catalog_id.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error might clear up on a later poll cycle.
    ///
    /// Remote, publish and readiness failures are transient from the
    /// engine's point of view: the scheduler invokes the poller again on the
    /// next interval. Parse and configuration failures will reproduce until
    /// the underlying content changes.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Remote { .. } | Self::Publish { .. } | Self::NotReady(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier for logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Remote { .. } => "remote",
            Self::Parse(_) => "parse",
            Self::NotFound(_) => "not_found",
            Self::Publish { .. } => "publish",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::InvalidUrl(_) => "invalid_url",
            Self::NotReady(_) => "not_ready",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
