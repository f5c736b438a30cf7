//! Error types for the FINS client.
//!
//! All failures are reported through the single [`FinsError`] enum. Broad
//! categories ("is this a connection problem?") are answered by
//! [`FinsError::kind`] and the `is_*` predicates rather than by matching
//! individual variants.

use std::io;
use thiserror::Error;

use crate::end_code::{EndCode, EndCodeCategory};

/// Result type alias for FINS operations.
pub type Result<T> = std::result::Result<T, FinsError>;

/// Errors that can occur during FINS communication.
#[derive(Debug, Error)]
pub enum FinsError {
    /// Malformed address token, out-of-range offset or bit, or bit access on
    /// an area that has none.
    #[error("Invalid address: {reason}")]
    InvalidAddress {
        /// Description of the addressing error.
        reason: String,
    },

    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Connect or handshake failure, or use of a closed session.
    #[error("Connection failure: {reason}")]
    ConnectionFailure {
        /// Description of the failure.
        reason: String,
    },

    /// No matching reply arrived before the deadline.
    #[error("Communication timeout")]
    Timeout,

    /// The PLC answered with a non-zero end code.
    #[error("PLC error: end code {end_code}")]
    Protocol {
        /// End code returned by the PLC.
        end_code: EndCode,
    },

    /// Reply too short or inconsistent with the request, or broken TCP framing.
    #[error("Malformed response: {reason}")]
    MalformedResponse {
        /// Description of the response error.
        reason: String,
    },

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of a [`FinsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`FinsError::InvalidAddress`].
    InvalidAddress,
    /// See [`FinsError::InvalidParameter`].
    InvalidParameter,
    /// Connection problems, including socket I/O errors.
    ConnectionFailure,
    /// See [`FinsError::Timeout`].
    Timeout,
    /// See [`FinsError::Protocol`].
    Protocol,
    /// See [`FinsError::MalformedResponse`].
    MalformedResponse,
}

impl FinsError {
    /// Creates a new `InvalidAddress` error.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins_client::FinsError;
    ///
    /// let err = FinsError::invalid_address("CNT area does not support bit access");
    /// assert!(err.is_validation_error());
    /// ```
    pub fn invalid_address(reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `ConnectionFailure` error.
    pub fn connection_failure(reason: impl Into<String>) -> Self {
        Self::ConnectionFailure {
            reason: reason.into(),
        }
    }

    /// Creates a new `MalformedResponse` error.
    pub fn malformed_response(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new `Protocol` error from a raw end code.
    pub fn protocol(end_code: EndCode) -> Self {
        Self::Protocol { end_code }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FinsError::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            FinsError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            FinsError::ConnectionFailure { .. } | FinsError::Io(_) => ErrorKind::ConnectionFailure,
            FinsError::Timeout => ErrorKind::Timeout,
            FinsError::Protocol { .. } => ErrorKind::Protocol,
            FinsError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }

    /// True for connect, handshake, closed-session and socket I/O failures.
    pub fn is_connection_failure(&self) -> bool {
        self.kind() == ErrorKind::ConnectionFailure
    }

    /// True when the request timed out.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// True when the PLC rejected the command with an end code.
    pub fn is_protocol_error(&self) -> bool {
        self.kind() == ErrorKind::Protocol
    }

    /// True for failures detected locally before any I/O took place.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidAddress | ErrorKind::InvalidParameter
        )
    }

    /// Returns the end code of a `Protocol` error.
    pub fn end_code(&self) -> Option<EndCode> {
        match self {
            FinsError::Protocol { end_code } => Some(*end_code),
            _ => None,
        }
    }

    /// Returns the end code category of a `Protocol` error.
    pub fn end_code_category(&self) -> Option<EndCodeCategory> {
        self.end_code().map(EndCode::category)
    }

    /// Rebuilds an equivalent error for another waiter.
    ///
    /// `io::Error` is not `Clone`, so I/O errors are flattened into
    /// `ConnectionFailure` with the same message.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            FinsError::InvalidAddress { reason } => Self::invalid_address(reason.clone()),
            FinsError::InvalidParameter { parameter, reason } => {
                Self::invalid_parameter(parameter.clone(), reason.clone())
            }
            FinsError::ConnectionFailure { reason } => Self::connection_failure(reason.clone()),
            FinsError::Timeout => FinsError::Timeout,
            FinsError::Protocol { end_code } => Self::protocol(*end_code),
            FinsError::MalformedResponse { reason } => Self::malformed_response(reason.clone()),
            FinsError::Io(e) => Self::connection_failure(e.to_string()),
        }
    }
}
