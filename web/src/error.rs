use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use fedi_auth::error::{
    Error as AuthError, ErrorKind, InteractionErrorKind, RemoteErrorKind, VerificationErrorKind,
};

use crate::controller::ApiResponse;

extern crate log;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(AuthError);

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.0.error_kind
    }

    fn status_code(&self) -> StatusCode {
        match self.0.error_kind {
            ErrorKind::Input(_) => StatusCode::BAD_REQUEST,
            ErrorKind::Remote(remote_error_kind) => match remote_error_kind {
                RemoteErrorKind::Unavailable => StatusCode::BAD_GATEWAY,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ErrorKind::Verification(verification_error_kind) => match verification_error_kind {
                VerificationErrorKind::TooFrequent => StatusCode::TOO_MANY_REQUESTS,
                VerificationErrorKind::NotFound | VerificationErrorKind::CodeMismatch => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            },
            ErrorKind::Interaction(interaction_error_kind) => match interaction_error_kind {
                InteractionErrorKind::Expired => StatusCode::GONE,
                InteractionErrorKind::AccountResolution => StatusCode::FORBIDDEN,
            },
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        }
        (status, Json(ApiResponse::error(self.0.error_kind.as_str()))).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<AuthError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedi_auth::error::{interaction_error, storage_error};

    #[test]
    fn test_expired_interaction_is_gone() {
        let err = Error::from(interaction_error(
            InteractionErrorKind::Expired,
            "Interaction expired",
        ));
        assert_eq!(err.into_response().status(), StatusCode::GONE);
    }

    #[test]
    fn test_storage_failure_is_internal() {
        let err = Error::from(storage_error("disk on fire"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_too_frequent_is_rate_limited() {
        let err = Error::from(AuthError::new(ErrorKind::Verification(
            VerificationErrorKind::TooFrequent,
        )));
        assert_eq!(err.kind().as_str(), "too_frequent");
        assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
