use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VoteError;

// Lifecycle of the anchoring step for a poll or vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    Pending,
    Confirmed,
    // Reserved for a real anchor rejecting a submission
    Failed,
}

impl AnchorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorStatus::Pending => "pending",
            AnchorStatus::Confirmed => "confirmed",
            AnchorStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnchorStatus::Pending),
            "confirmed" => Ok(AnchorStatus::Confirmed),
            "failed" => Ok(AnchorStatus::Failed),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

// A poll with its running tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Poll {
    // Assigned by the store
    pub id: i64,

    pub question: String,

    // Index is the option's identity
    pub options: Vec<String>,

    // Parallel to options
    pub vote_counts: Vec<u64>,

    // Always sum(vote_counts)
    pub total_votes: u64,

    pub created_at: DateTime<Utc>,

    pub creator_address: String,

    pub tx_id: String,

    // PDA ["poll", creator, created_at]
    #[serde(rename = "blockchain_address")]
    pub derived_address: String,

    pub status: AnchorStatus,
}

impl Poll {
    pub fn is_valid_option(&self, option_index: usize) -> bool {
        option_index < self.options.len()
    }

    /// Counts one vote for `option_index`.
    pub fn record_vote(&mut self, option_index: usize) -> Result<(), VoteError> {
        let options = self.options.len();
        let count = self
            .vote_counts
            .get_mut(option_index)
            .ok_or(VoteError::InvalidOptionIndex {
                index: option_index as i64,
                options,
            })?;
        let total = self
            .total_votes
            .checked_add(1)
            .ok_or(VoteError::TallyOverflow)?;
        *count = count.checked_add(1).ok_or(VoteError::TallyOverflow)?;
        self.total_votes = total;
        Ok(())
    }

    pub fn tally_is_consistent(&self) -> bool {
        self.vote_counts.len() == self.options.len()
            && self.vote_counts.iter().sum::<u64>() == self.total_votes
    }
}

// One voter's choice on one poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteRecord {
    pub id: i64,

    // Reference to the poll by id only
    pub poll_id: i64,

    pub voter_address: String,

    pub option_index: usize,

    pub tx_id: String,

    pub voted_at: DateTime<Utc>,

    // PDA ["vote", poll address, voter]
    #[serde(rename = "blockchain_vote_address")]
    pub derived_address: String,

    pub status: AnchorStatus,
}
