//! Unified error handling for the player core
//!
//! Domain modules define their own `thiserror` enums; this module wraps
//! them in a single [`Error`] so the collection loop can apply one policy:
//! recoverable failures fall back to the offline snapshot, fire-and-forget
//! reporting failures are swallowed, configuration mistakes surface.
//!
//! # Error Hierarchy
//!
//! ```text
//! Error (unified)
//! ├── Transport (TransportError)
//! ├── Xlf       (XlfError)
//! ├── Store     (anyhow::Error)
//! ├── Config    (String)
//! ├── OfflineNoCache
//! └── Other     (anyhow::Error)
//! ```

use thiserror::Error;

pub use crate::timeline::xlf::XlfError;
pub use crate::transport::TransportError;

/// Unified result type for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error category for logging and failure-policy decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// CMS RPC / network errors
    Transport,
    /// Layout file parsing errors
    Parsing,
    /// Offline store / filesystem errors
    Store,
    /// Configuration errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get category name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Parsing => "parsing",
            ErrorCategory::Store => "store",
            ErrorCategory::Config => "config",
            ErrorCategory::Other => "other",
        }
    }
}

/// Unified error type for cross-domain operations
#[derive(Error, Debug)]
pub enum Error {
    /// CMS RPC failures
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Layout file parsing errors
    #[error("Layout parse error: {0}")]
    Xlf(#[from] XlfError),

    /// Offline store errors
    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// The network is unreachable and no offline snapshot exists
    #[error("offline with no cached data to replay")]
    OfflineNoCache,

    /// Generic errors with context
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a store error
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        Error::Store(err.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether a later collection cycle can clear this error on its own
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_recoverable(),
            Error::Xlf(_) => false,
            Error::Store(_) => true,
            Error::Config(_) => false,
            Error::OfflineNoCache => true,
            Error::Other(_) => false,
        }
    }

    /// Category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport(_) => ErrorCategory::Transport,
            Error::Xlf(_) => ErrorCategory::Parsing,
            Error::Store(_) => ErrorCategory::Store,
            Error::Config(_) => ErrorCategory::Config,
            Error::OfflineNoCache => ErrorCategory::Transport,
            Error::Other(_) => ErrorCategory::Other,
        }
    }
}
