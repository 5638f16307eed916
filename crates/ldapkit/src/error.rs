//! Error types for LDAP session operations.

use thiserror::Error;

use crate::connection::SessionState;
use crate::types::ResultCode;

/// Result type alias for LDAP session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`Connection`](crate::Connection) and the bind strategies.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted in the wrong session state.
    #[error("Invalid state for {operation}: session is {state}")]
    State {
        /// Operation that was rejected.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// A required field is missing or malformed.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Authentication mechanism name is not recognised.
    #[error("Not implemented mechanism: {0}. Available: GSSAPI | Simple")]
    UnsupportedMechanism(String),

    /// Session initialization or option negotiation failed.
    #[error("Connection error in {operation}: {message} ({code})")]
    Connection {
        /// Transport primitive that failed.
        operation: &'static str,
        /// Transport result code.
        code: ResultCode,
        /// Translated error text.
        message: String,
    },

    /// Bind was rejected.
    #[error("{mechanism} bind failed: {message} ({code})")]
    Authentication {
        /// Mechanism that was attempted.
        mechanism: String,
        /// Transport result code.
        code: ResultCode,
        /// Translated error text, including server diagnostics.
        message: String,
    },

    /// Search, add, modify or delete was rejected.
    #[error("{operation} failed: {message} ({code})")]
    Operation {
        /// Transport primitive that failed.
        operation: &'static str,
        /// Transport result code.
        code: ResultCode,
        /// Translated error text, including server diagnostics.
        message: String,
        /// Extended diagnostic message from the server, if any.
        diagnostic: Option<String>,
    },
}

impl Error {
    /// Creates a state error.
    #[must_use]
    pub const fn state(operation: &'static str, state: SessionState) -> Self {
        Self::State { operation, state }
    }

    /// Returns the transport result code carried by this error, if any.
    #[must_use]
    pub const fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Connection { code, .. }
            | Self::Authentication { code, .. }
            | Self::Operation { code, .. } => Some(*code),
            Self::State { .. } | Self::Validation(_) | Self::UnsupportedMechanism(_) => None,
        }
    }

    /// Returns the server diagnostic text, if any.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Operation { diagnostic, .. } => diagnostic.as_deref(),
            _ => None,
        }
    }

    /// Returns true if the session was in the wrong state.
    #[must_use]
    pub const fn is_state_error(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Returns true if the request was rejected before reaching the transport.
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if the bind was rejected.
    #[must_use]
    pub const fn is_authentication_error(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

/// Validation error for request fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// DN is empty or whitespace.
    EmptyDn,
    /// An attribute has no type name.
    EmptyAttributeType,
    /// Security identifier string could not be parsed.
    InvalidSubjectId(String),
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyDn => "DN is required",
            Self::EmptyAttributeType => "Attribute type is required",
            Self::InvalidSubjectId(_) => "Invalid security identifier",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyDn => "dn",
            Self::EmptyAttributeType => "attributes",
            Self::InvalidSubjectId(_) => "sid",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSubjectId(sid) => write!(f, "{}: {sid}", self.message()),
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ValidationError {}

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
    fn state_error_display() {
        let err = Error::state("search", SessionState::Connected);
        assert_eq!(err.to_string(), "Invalid state for search: session is Connected");
        assert!(err.is_state_error());
        assert_eq!(err.result_code(), None);
    }

    #[test]
    fn operation_error_carries_code_and_diagnostic() {
        let err = Error::Operation {
            operation: "add",
            code: ResultCode::ALREADY_EXISTS,
            message: "Already exists. entry exists".into(),
            diagnostic: Some("entry exists".into()),
        };
        assert_eq!(err.result_code(), Some(ResultCode::ALREADY_EXISTS));
        assert_eq!(err.diagnostic(), Some("entry exists"));
        assert_eq!(err.to_string(), "add failed: Already exists. entry exists (68)");
    }

    #[test]
    fn unsupported_mechanism_lists_available() {
        let err = Error::UnsupportedMechanism("DIGEST-MD5".into());
        assert!(err.to_string().contains("DIGEST-MD5"));
        assert!(err.to_string().contains("GSSAPI | Simple"));
    }

    #[test]
    fn validation_error_converts() {
        let err: Error = ValidationError::EmptyDn.into();
        assert!(err.is_validation_error());
        assert_eq!(err.to_string(), "Validation failed: DN is required");
    }

    #[test]
    fn validation_error_fields() {
        assert_eq!(ValidationError::EmptyDn.field(), "dn");
        assert_eq!(ValidationError::EmptyAttributeType.field(), "attributes");
        let sid = ValidationError::InvalidSubjectId("S-x".into());
        assert_eq!(sid.field(), "sid");
        assert_eq!(sid.to_string(), "Invalid security identifier: S-x");
    }
}
