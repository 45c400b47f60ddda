use hyper::StatusCode;
use thiserror::Error;
use vote_program::constants::{
    MAX_OPTIONS_COUNT, MAX_OPTION_LENGTH, MAX_QUESTION_LENGTH, MIN_OPTIONS_COUNT,
};

use crate::anchoring::AnchorError;
use crate::derive::DeriveError;
use crate::store::StoreError;

/// Errors surfaced to API clients
#[derive(Error, Debug)]
pub enum VoteError {
    // Request validation
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid request body: {0}")]
    InvalidJson(String),

    #[error("Invalid poll ID")]
    InvalidPollId,

    #[error("Invalid {field} address")]
    InvalidAddress { field: &'static str },

    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("Question is too long (maximum {max} characters)", max = MAX_QUESTION_LENGTH)]
    QuestionTooLong,

    #[error("Option text cannot be empty")]
    EmptyOption,

    #[error("Option text is too long (maximum {max} characters)", max = MAX_OPTION_LENGTH)]
    OptionTooLong,

    #[error(
        "Poll must have between {min} and {max} options, got {count}",
        min = MIN_OPTIONS_COUNT,
        max = MAX_OPTIONS_COUNT
    )]
    InvalidOptionCount { count: usize },

    #[error("Invalid option index {index} (poll has {options} options)")]
    InvalidOptionIndex { index: i64, options: usize },

    // Domain conflicts
    #[error("User has already voted on this poll")]
    AlreadyVoted,

    #[error("Poll address {0} is already in use")]
    PollAddressInUse(String),

    #[error("Poll not found")]
    PollNotFound(i64),

    #[error("Too many requests, slow down")]
    RateLimited,

    // Internal failures
    #[error("Vote count overflow")]
    TallyOverflow,

    #[error("Failed to derive address: {0}")]
    Derivation(#[from] DeriveError),

    #[error("Persistence failure: {0}")]
    Persistence(StoreError),

    #[error("Anchoring failure: {0}")]
    Anchor(#[from] AnchorError),
}

impl From<StoreError> for VoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateVote => VoteError::AlreadyVoted,
            StoreError::DuplicateAddress(address) => VoteError::PollAddressInUse(address),
            StoreError::MissingPoll(id) => VoteError::PollNotFound(id),
            other => VoteError::Persistence(other),
        }
    }
}

impl VoteError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            VoteError::MissingField(_)
            | VoteError::InvalidJson(_)
            | VoteError::InvalidPollId
            | VoteError::InvalidAddress { .. }
            | VoteError::EmptyQuestion
            | VoteError::QuestionTooLong
            | VoteError::EmptyOption
            | VoteError::OptionTooLong
            | VoteError::InvalidOptionCount { .. }
            | VoteError::InvalidOptionIndex { .. } => StatusCode::BAD_REQUEST,

            // a domain conflict, reported like a validation failure
            VoteError::AlreadyVoted => StatusCode::BAD_REQUEST,
            VoteError::PollAddressInUse(_) => StatusCode::CONFLICT,

            VoteError::PollNotFound(_) => StatusCode::NOT_FOUND,

            VoteError::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            VoteError::TallyOverflow
            | VoteError::Derivation(_)
            | VoteError::Persistence(_)
            | VoteError::Anchor(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error taxonomy name reported alongside the message
    pub fn kind(&self) -> &'static str {
        match self {
            VoteError::AlreadyVoted | VoteError::PollAddressInUse(_) => "ConflictError",
            VoteError::PollNotFound(_) => "NotFoundError",
            VoteError::RateLimited => "RateLimitError",
            VoteError::Derivation(DeriveError::DerivationExhausted) => "DerivationExhausted",
            VoteError::Derivation(_) => "DerivationError",
            VoteError::Anchor(_) => "AnchorError",
            err if err.status_code() == StatusCode::BAD_REQUEST => "ValidationError",
            _ => "PersistenceError",
        }
    }
}
