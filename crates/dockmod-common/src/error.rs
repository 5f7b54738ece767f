//! Unified error types for the Dockmod workspace.
//!
//! Every crate returns [`DockmodError`]; the variant decides which error
//! kind is reported back to the invoking orchestrator.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum DockmodError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A Dockerfile or Compose manifest could not be parsed.
    #[error("failed to parse {descriptor}: {message}")]
    Parse {
        /// Descriptor being parsed (file name).
        descriptor: String,
        /// Description of the syntax problem.
        message: String,
    },

    /// A configuration value is invalid or a required piece is missing.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The Compose `depends_on` declarations form a cycle.
    #[error("cyclic dependency detected between services: {services}")]
    DependencyCycle {
        /// Services taking part in the cycle.
        services: String,
    },

    /// The container engine failed a build or run step.
    ///
    /// The message is the engine's own output and is surfaced verbatim.
    #[error("{message}")]
    Execution {
        /// Root cause reported by the engine.
        message: String,
    },

    /// An argument payload is present but cannot be decoded.
    #[error("failed to decode argument {argument}: {source}")]
    ArgumentDecoding {
        /// Name of the offending argument.
        argument: String,
        /// Underlying decoding error.
        source: serde_json::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl DockmodError {
    /// Returns the error kind reported on the wire.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Config { .. } | Self::DependencyCycle { .. } => ErrorKind::Configuration,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::ArgumentDecoding { .. } => ErrorKind::ArgumentDecoding,
            Self::Io { .. } | Self::Serialization { .. } => ErrorKind::Internal,
        }
    }

    /// Shorthand for a [`DockmodError::Config`].
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a [`DockmodError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a [`DockmodError::Execution`].
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

/// Error category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed descriptor.
    Parse,
    /// Missing or invalid configuration.
    Configuration,
    /// Unknown object, function, or service.
    NotFound,
    /// The container engine failed.
    Execution,
    /// An argument payload could not be decoded.
    ArgumentDecoding,
    /// Any other failure (I/O, serialization).
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "parse"),
            Self::Configuration => write!(f, "configuration"),
            Self::NotFound => write!(f, "not_found"),
            Self::Execution => write!(f, "execution"),
            Self::ArgumentDecoding => write!(f, "argument_decoding"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DockmodError>;
