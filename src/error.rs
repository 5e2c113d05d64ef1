//! Error types for hub client operations
//!
//! Every failure the engine can produce or observe maps to one `ClientError`
//! variant. Retry eligibility is decided by [`classify`], a static table over
//! variants; new error kinds are added to exactly one bucket without touching
//! retry logic.

use crate::connection::ConnectionState;
use thiserror::Error;

/// Main error type for hub client operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    #[error("Operation cancelled: {message}")]
    OperationCancelled { message: String },

    #[error("Operation timed out: {message}")]
    Timeout { message: String },

    #[error("Service fault: {message}")]
    ServiceFault { message: String },

    #[error("Connection attempt failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Connection dropped: {message}")]
    ConnectionDropped { message: String },

    #[error("No network available: {message}")]
    NoNetwork { message: String },

    #[error("Transient client fault: {message}")]
    ClientFault { message: String },

    #[error("Authentication rejected by hub: {message}")]
    AuthenticationRejected { message: String },

    #[error("Bad credential: {message}")]
    BadCredential { message: String },

    #[error("Device is disabled on the hub: {message}")]
    DeviceDisabled { message: String },

    #[error("Malformed configuration: {message}")]
    MalformedConfig { message: String },

    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
}

/// Retry eligibility bucket for a [`ClientError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient fault, eligible for automatic retry under backoff
    Recoverable,
    /// Credential/config/authorization problem, never retried
    Fatal,
}

/// Classify an error as recoverable or fatal.
///
/// This is a static table, not inference from message text. `NotConnected`
/// is a local gate rejection and never reaches the retry path; it classifies
/// as fatal so a misrouted one is never retried.
pub fn classify(error: &ClientError) -> ErrorClass {
    match error {
        ClientError::OperationCancelled { .. }
        | ClientError::Timeout { .. }
        | ClientError::ServiceFault { .. }
        | ClientError::ConnectionFailed { .. }
        | ClientError::ConnectionDropped { .. }
        | ClientError::NoNetwork { .. }
        | ClientError::ClientFault { .. } => ErrorClass::Recoverable,

        ClientError::AuthenticationRejected { .. }
        | ClientError::BadCredential { .. }
        | ClientError::DeviceDisabled { .. }
        | ClientError::MalformedConfig { .. }
        | ClientError::NotConnected { .. } => ErrorClass::Fatal,
    }
}

impl ClientError {
    /// Convenience shorthand for `classify(self)`
    pub fn classification(&self) -> ErrorClass {
        classify(self)
    }

    /// Create an operation-cancelled error
    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        Self::OperationCancelled {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a service fault error
    pub fn service_fault<S: Into<String>>(message: S) -> Self {
        Self::ServiceFault {
            message: message.into(),
        }
    }

    /// Create a connection-failed error
    pub fn connection_failed<S: Into<String>>(message: S) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create a connection-dropped error
    pub fn connection_dropped<S: Into<String>>(message: S) -> Self {
        Self::ConnectionDropped {
            message: message.into(),
        }
    }

    /// Create a no-network error
    pub fn no_network<S: Into<String>>(message: S) -> Self {
        Self::NoNetwork {
            message: message.into(),
        }
    }

    /// Create a transient client fault error
    pub fn client_fault<S: Into<String>>(message: S) -> Self {
        Self::ClientFault {
            message: message.into(),
        }
    }

    /// Create a bad-credential error
    pub fn bad_credential<S: Into<String>>(message: S) -> Self {
        Self::BadCredential {
            message: message.into(),
        }
    }
}

/// Result type for hub client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let recoverable = vec![
            ClientError::cancelled("cancelled"),
            ClientError::timeout("no ConnAck"),
            ClientError::service_fault("500 from hub"),
            ClientError::connection_failed("refused"),
            ClientError::connection_dropped("socket closed"),
            ClientError::no_network("interface down"),
            ClientError::client_fault("transient transport fault"),
        ];
        for error in recoverable {
            assert_eq!(classify(&error), ErrorClass::Recoverable, "{error}");
        }
    }

    #[test]
    fn test_fatal_classification() {
        let fatal = vec![
            ClientError::AuthenticationRejected {
                message: "401".to_string(),
            },
            ClientError::bad_credential("expired SAS token"),
            ClientError::DeviceDisabled {
                message: "disabled in registry".to_string(),
            },
            ClientError::MalformedConfig {
                message: "empty device id".to_string(),
            },
        ];
        for error in fatal {
            assert_eq!(classify(&error), ErrorClass::Fatal, "{error}");
        }
    }

    #[test]
    fn test_not_connected_is_never_retried() {
        let error = ClientError::NotConnected {
            state: ConnectionState::Connecting,
        };
        assert_eq!(classify(&error), ErrorClass::Fatal);
    }

    #[test]
    fn test_error_display_is_nonempty() {
        let errors = vec![
            ClientError::timeout("t"),
            ClientError::connection_failed("cf"),
            ClientError::NotConnected {
                state: ConnectionState::Disconnected,
            },
        ];
        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_classification_shorthand() {
        assert_eq!(
            ClientError::timeout("t").classification(),
            ErrorClass::Recoverable
        );
        assert_eq!(
            ClientError::bad_credential("b").classification(),
            ErrorClass::Fatal
        );
    }
}
