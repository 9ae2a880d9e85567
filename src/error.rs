use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use log::{error, warn};
use mongodb::{bson::de::Error as BsonDeError, error::Error as DbError};
use rocket::{http::Status, response::Responder};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The token does not exist, is already used, or its election is not
    /// active. Deliberately does not say which.
    #[error("Invalid or expired voting token")]
    InvalidOrExpiredToken,
    #[error("Candidate does not belong to this election")]
    UnknownCandidate,
    #[error("A vote has already been recorded for this token")]
    DuplicateVote,
    #[error("Invalid token count {0}: must be between 1 and {1}")]
    InvalidCount(i64, u32),
    #[error("Not authenticated")]
    Unauthenticated,
    /// Never says whether the target exists.
    #[error("Forbidden")]
    Forbidden,
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonDe(#[from] BsonDeError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Storage, encoding or hashing failures: the caller cannot know whether
    /// the operation took effect, so it must be treated as "not done".
    pub fn is_system_error(&self) -> bool {
        matches!(
            self,
            Self::Db(_) | Self::BsonDe(_) | Self::Jwt(_) | Self::Argon2(_)
        )
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidOrExpiredToken
            | Self::UnknownCandidate
            | Self::InvalidCount(..)
            | Self::BadRequest(_) => Status::BadRequest,
            Self::DuplicateVote | Self::Conflict(_) => Status::Conflict,
            Self::Unauthenticated => Status::Unauthorized,
            Self::Forbidden => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Db(_) | Self::BsonDe(_) | Self::Jwt(_) | Self::Argon2(_) => {
                Status::InternalServerError
            }
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        if self.is_system_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        Err(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        assert_eq!(Error::InvalidOrExpiredToken.status(), Status::BadRequest);
        assert_eq!(Error::UnknownCandidate.status(), Status::BadRequest);
        assert_eq!(Error::InvalidCount(0, 1000).status(), Status::BadRequest);
        assert_eq!(Error::DuplicateVote.status(), Status::Conflict);
    }

    #[test]
    fn auth_errors() {
        assert_eq!(Error::Unauthenticated.status(), Status::Unauthorized);
        assert_eq!(Error::Forbidden.status(), Status::Forbidden);
    }

    #[test]
    fn validation_errors_are_not_system_errors() {
        assert!(!Error::InvalidOrExpiredToken.is_system_error());
        assert!(!Error::DuplicateVote.is_system_error());
        assert!(!Error::Forbidden.is_system_error());
        assert!(!Error::not_found("Election").is_system_error());
    }

    #[test]
    fn token_error_message_is_generic() {
        // The same message must cover unknown, used, and inactive tokens.
        assert_eq!(
            Error::InvalidOrExpiredToken.to_string(),
            "Invalid or expired voting token"
        );
    }
}
