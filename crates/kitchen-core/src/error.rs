//! Error types for kitchen-core

use thiserror::Error;

use crate::auth::AuthError;

/// Result type alias using kitchen-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kitchen-core operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No session, or the session expired. Callers redirect to login.
    #[error("Authentication required: {0}")]
    Auth(String),

    /// A required field is missing or invalid. Raised before any I/O.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The remote backend rejected or failed the operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// Image upload failed
    #[error("Upload error: {0}")]
    Upload(String),

    /// Client configuration is missing or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Whether the caller should send the user back through sign-in.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<AuthError> for Error {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidConfiguration(_) => Self::Config(value.to_string()),
            AuthError::Api(_) => Self::Auth(value.to_string()),
            AuthError::Http(_) | AuthError::Json(_) | AuthError::SecureStorage(_) => {
                Self::Backend(value.to_string())
            }
        }
    }
}
