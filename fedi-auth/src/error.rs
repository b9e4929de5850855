//! Error types for the `fedi-auth` crate.
//!
//! A root `Error` struct holds an error kind tree and an optional source for
//! error chaining. Every kind maps to a stable snake_case string that callers
//! put on the wire in place of raw error messages.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for fedi-auth crate.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in fedi-auth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input(InputErrorKind),
    Remote(RemoteErrorKind),
    Verification(VerificationErrorKind),
    Interaction(InteractionErrorKind),
    Storage,
}

/// Errors from malformed caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputErrorKind {
    MissingInstance,
    MissingUsername,
    InvalidUsername,
    InvalidHost,
}

/// Errors reported by, or while talking to, the remote identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    InvalidCredentials,
    MissingSecondFactor,
    InvalidSecondFactor,
    AccountBannedOrDeleted,
    ActorNotFound,
    DeliveryRejected,
    NoMetadata,
    ProtocolVersionUnsupported,
    ProtocolUnsupported,
    Unavailable,
}

/// Errors from the out-of-band verification code lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationErrorKind {
    NotFound,
    TooFrequent,
    CodeMismatch,
}

/// Errors from the authorization interaction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionErrorKind {
    Expired,
    AccountResolution,
}

impl ErrorKind {
    /// Stable identifier reported to callers as `{success: false, error}`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input(kind) => match kind {
                InputErrorKind::MissingInstance => "missing_instance",
                InputErrorKind::MissingUsername => "missing_username",
                InputErrorKind::InvalidUsername => "invalid_username",
                InputErrorKind::InvalidHost => "invalid_host",
            },
            ErrorKind::Remote(kind) => match kind {
                RemoteErrorKind::InvalidCredentials => "invalid_credentials",
                RemoteErrorKind::MissingSecondFactor => "missing_second_factor",
                RemoteErrorKind::InvalidSecondFactor => "invalid_second_factor",
                RemoteErrorKind::AccountBannedOrDeleted => "account_banned_or_deleted",
                RemoteErrorKind::ActorNotFound => "actor_not_found",
                RemoteErrorKind::DeliveryRejected => "delivery_rejected",
                RemoteErrorKind::NoMetadata => "no_metadata",
                RemoteErrorKind::ProtocolVersionUnsupported => "protocol_version_unsupported",
                RemoteErrorKind::ProtocolUnsupported => "protocol_unsupported",
                RemoteErrorKind::Unavailable => "remote_unavailable",
            },
            ErrorKind::Verification(kind) => match kind {
                VerificationErrorKind::NotFound => "not_found",
                VerificationErrorKind::TooFrequent => "too_frequent",
                VerificationErrorKind::CodeMismatch => "code_mismatch",
            },
            ErrorKind::Interaction(kind) => match kind {
                InteractionErrorKind::Expired => "interaction_expired",
                InteractionErrorKind::AccountResolution => "account_resolution_failed",
            },
            ErrorKind::Storage => "storage",
        }
    }

    /// True for the two second-factor failures, which let the caller re-prompt
    /// for a TOTP token without restarting the flow.
    pub fn is_second_factor(&self) -> bool {
        matches!(
            self,
            ErrorKind::Remote(RemoteErrorKind::MissingSecondFactor)
                | ErrorKind::Remote(RemoteErrorKind::InvalidSecondFactor)
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Input(kind) => write!(f, "Input error: {:?}", kind),
            ErrorKind::Remote(kind) => write!(f, "Remote error: {:?}", kind),
            ErrorKind::Verification(kind) => write!(f, "Verification error: {:?}", kind),
            ErrorKind::Interaction(kind) => write!(f, "Interaction error: {:?}", kind),
            ErrorKind::Storage => write!(f, "Storage error"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// Transport failures, timeouts and undecodable bodies all mean the remote
// could not give a usable answer.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Remote(RemoteErrorKind::Unavailable),
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Remote(RemoteErrorKind::Unavailable),
        }
    }
}

/// Helper function to create input errors.
pub fn input_error(kind: InputErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Input(kind),
    }
}

/// Helper function to create remote errors.
pub fn remote_error(kind: RemoteErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Remote(kind),
    }
}

/// Helper function to create verification errors.
pub fn verification_error(kind: VerificationErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Verification(kind),
    }
}

/// Helper function to create interaction errors.
pub fn interaction_error(kind: InteractionErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Interaction(kind),
    }
}

/// Helper function to create storage errors.
pub fn storage_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Storage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_strings_are_snake_case() {
        assert_eq!(
            ErrorKind::Verification(VerificationErrorKind::TooFrequent).as_str(),
            "too_frequent"
        );
        assert_eq!(
            ErrorKind::Remote(RemoteErrorKind::Unavailable).as_str(),
            "remote_unavailable"
        );
        assert_eq!(
            ErrorKind::Interaction(InteractionErrorKind::Expired).as_str(),
            "interaction_expired"
        );
    }

    #[test]
    fn test_second_factor_kinds() {
        assert!(ErrorKind::Remote(RemoteErrorKind::MissingSecondFactor).is_second_factor());
        assert!(ErrorKind::Remote(RemoteErrorKind::InvalidSecondFactor).is_second_factor());
        assert!(!ErrorKind::Remote(RemoteErrorKind::InvalidCredentials).is_second_factor());
    }

    #[test]
    fn test_helper_keeps_message_as_source() {
        let err = remote_error(RemoteErrorKind::ActorNotFound, "Can't find account");
        assert_eq!(err.error_kind, ErrorKind::Remote(RemoteErrorKind::ActorNotFound));
        assert_eq!(
            StdError::source(&err).map(|s| s.to_string()),
            Some("Can't find account".to_string())
        );
    }
}
