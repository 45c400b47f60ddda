//! Request validation shared by the API surface and the ledger.

use std::str::FromStr;

use anchor_lang::prelude::Pubkey;
use vote_program::constants::{is_valid_option_count, MAX_OPTION_LENGTH, MAX_QUESTION_LENGTH};

use crate::error::VoteError;
use crate::state::Poll;

/// Unwraps a required request field
pub fn required<T>(field: &'static str, value: Option<T>) -> Result<T, VoteError> {
    value.ok_or(VoteError::MissingField(field))
}

/// Parses a base-58 encoded 32-byte account address.
pub fn parse_address(field: &'static str, value: &str) -> Result<Pubkey, VoteError> {
    Pubkey::from_str(value).map_err(|_| VoteError::InvalidAddress { field })
}

/// Poll ids are unsigned 32-bit, whether they come from the path or a body.
pub fn validate_poll_id(id: i64) -> Result<i64, VoteError> {
    u32::try_from(id)
        .map(i64::from)
        .map_err(|_| VoteError::InvalidPollId)
}

pub fn parse_poll_id(value: &str) -> Result<i64, VoteError> {
    value
        .parse::<i64>()
        .map_err(|_| VoteError::InvalidPollId)
        .and_then(validate_poll_id)
}

pub fn validate_option_count(options: &[String]) -> Result<(), VoteError> {
    if !is_valid_option_count(options.len()) {
        return Err(VoteError::InvalidOptionCount {
            count: options.len(),
        });
    }
    Ok(())
}

// Length limits match what the program's Poll account can hold
pub fn validate_poll_content(question: &str, options: &[String]) -> Result<(), VoteError> {
    if question.trim().is_empty() {
        return Err(VoteError::EmptyQuestion);
    }
    if question.len() > MAX_QUESTION_LENGTH {
        return Err(VoteError::QuestionTooLong);
    }
    for option in options {
        if option.trim().is_empty() {
            return Err(VoteError::EmptyOption);
        }
        if option.len() > MAX_OPTION_LENGTH {
            return Err(VoteError::OptionTooLong);
        }
    }
    Ok(())
}

/// Checks `0 <= option_index < len(poll.options)`.
pub fn validate_option_index(poll: &Poll, option_index: i64) -> Result<usize, VoteError> {
    usize::try_from(option_index)
        .ok()
        .filter(|index| poll.is_valid_option(*index))
        .ok_or(VoteError::InvalidOptionIndex {
            index: option_index,
            options: poll.options.len(),
        })
}
