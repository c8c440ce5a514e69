//! Error types for the licensing operator
//!
//! Errors carry enough context (resource kind, object name, instance) to make
//! the log line that reports them self-explanatory. Kubernetes API failures are
//! kept as the underlying `kube::Error` so the reconciliation engine can
//! classify them (not found, already exists, rejected update).

use thiserror::Error;

/// Main error type for licensing operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The IBMLicensing spec cannot be resolved into a usable configuration
    #[error("validation error for {instance}: {message}")]
    Validation {
        /// Identity of the IBMLicensing instance (`namespace/name`)
        instance: String,
        /// Description of what's invalid
        message: String,
    },

    /// A desired-state builder could not produce the expected object
    #[error("failed to build expected {kind}: {message}")]
    Build {
        /// Resource kind being built
        kind: String,
        /// Description of what failed
        message: String,
    },

    /// The owner of a dependent resource could not be resolved
    #[error("owner {kind} {name} unavailable: {message}")]
    Owner {
        /// Kind of the owner candidate
        kind: String,
        /// Name of the owner candidate
        name: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operator configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Where the error occurred (e.g., "gate", "status")
        context: String,
    },
}

impl Error {
    /// Create a validation error for an IBMLicensing instance
    pub fn validation(instance: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            instance: instance.into(),
            message: msg.into(),
        }
    }

    /// Create a build error for the given resource kind
    pub fn build(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Build {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create an owner resolution error
    pub fn owner(kind: impl Into<String>, name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Owner {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error with context
    pub fn internal(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// HTTP status code of the API response, if this is an API error
    pub fn api_code(&self) -> Option<u16> {
        match self {
            Self::Kube {
                source: kube::Error::Api(ae),
            } => Some(ae.code),
            _ => None,
        }
    }

    /// The object does not exist (404)
    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    /// A create raced with another writer and the object is already there (409 AlreadyExists)
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 409 && ae.reason == "AlreadyExists",
            _ => false,
        }
    }

    /// The API server refused an update: stale resourceVersion (409), an
    /// immutable field change (422) or an otherwise malformed object (400).
    ///
    /// Transport failures and server errors are not rejections.
    pub fn is_update_rejection(&self) -> bool {
        matches!(self.api_code(), Some(400) | Some(409) | Some(422))
    }

    /// Whether the trigger source should retry this error with backoff.
    ///
    /// Validation errors need a spec change; everything else may recover.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation { .. } | Self::Config(_))
    }
}

/// Build a `kube::Error::Api` with the given status code and reason.
///
/// Used by store implementations and tests that need to produce the same
/// errors the API server would.
pub fn api_error(code: u16, reason: &str, message: impl Into<String>) -> Error {
    Error::Kube {
        source: kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: message.into(),
            reason: reason.to_string(),
            code,
        }),
    }
}
