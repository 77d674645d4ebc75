use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::common::{SessionId, TopicId, VoteId, VoterId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Topic with ID {0} does not exist")]
    TopicNotFound(TopicId),
    #[error("Session with ID {0} does not exist")]
    SessionNotFound(SessionId),
    #[error("Voter with ID {0} does not exist")]
    VoterNotFound(VoterId),
    #[error("Vote with ID {0} does not exist")]
    VoteNotFound(VoteId),
    #[error("Topic {0} already has an open session")]
    SessionAlreadyOpen(TopicId),
    #[error("Voter {voter} has already voted in session {session}")]
    DuplicateVote { session: SessionId, voter: VoterId },
    #[error("A voter with this identifier already exists")]
    DuplicateVoter,
    #[error("Session {0} is not open")]
    SessionClosed(SessionId),
    #[error("Invalid vote option: {0}")]
    InvalidOption(String),
    #[error("Session duration must be positive, got {0}")]
    InvalidDuration(i64),
    #[error("Malformed identifier: {0}")]
    InvalidIdentifier(String),
    #[error("Bad request: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad categories of failure, each surfacing as a distinct status.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Forbidden,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TopicNotFound(_)
            | Self::SessionNotFound(_)
            | Self::VoterNotFound(_)
            | Self::VoteNotFound(_) => ErrorKind::NotFound,
            Self::SessionAlreadyOpen(_) | Self::DuplicateVote { .. } | Self::DuplicateVoter => {
                ErrorKind::Conflict
            }
            Self::InvalidOption(_)
            | Self::InvalidDuration(_)
            | Self::InvalidIdentifier(_)
            | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::SessionClosed(_) => ErrorKind::Forbidden,
            Self::Db(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> Status {
        match self.kind() {
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::Conflict => Status::Conflict,
            ErrorKind::InvalidInput => Status::BadRequest,
            ErrorKind::Forbidden => Status::Forbidden,
            ErrorKind::Internal => Status::InternalServerError,
        }
    }
}

/// The JSON body sent alongside every error status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let message = if self.kind() == ErrorKind::Internal {
            // Don't leak database internals to the client.
            error!("{self}");
            "An unexpected error occurred".to_string()
        } else {
            debug!("{self}");
            self.to_string()
        };
        (status, Json(ErrorMessage { message })).respond_to(req)
    }
}
