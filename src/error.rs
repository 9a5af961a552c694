use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::{Error as JsonError, Json},
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::RequestId;
use crate::model::common::{CandidateId, UserId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("User {0} has already voted")]
    AlreadyVoted(UserId),
    #[error("Not found: user {0}")]
    UserNotFound(UserId),
    #[error("Not found: candidate {0}")]
    CandidateNotFound(CandidateId),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    /// A request body that could not be read as the expected JSON.
    pub fn bad_body(err: JsonError<'_>) -> Self {
        Self::Validation(format!("malformed request body: {err}"))
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::NotAuthenticated => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::AlreadyVoted(_) => Status::Conflict,
            Self::UserNotFound(_) | Self::CandidateNotFound(_) | Self::NotFound(_) => {
                Status::NotFound
            }
            Self::Validation(_) => Status::BadRequest,
            Self::Status(status, _) => *status,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let id = RequestId::of(req);
        if status.code >= 500 {
            error!("req{id}: {self}");
        } else {
            debug!("req{id}: {self}");
        }
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).respond_to(req)
    }
}

/// Give unmatched routes and rejected request bodies the same JSON error
/// shape as handler errors.
#[catch(default)]
pub fn default_catcher(status: Status, _req: &Request) -> Error {
    Error::Status(status, status.reason_lossy().to_string())
}
