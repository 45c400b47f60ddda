//! Persistence for polls and vote records.
//!
//! [`SqlStore`] is the relational store. [`MemoryStore`] keeps the same
//! uniqueness rules in process and is what the service falls back to when the
//! database cannot be opened.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::state::{AnchorStatus, Poll, VoteRecord};

mod memory;
mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("vote already recorded for this poll and voter")]
    DuplicateVote,

    #[error("poll address {0} already in use")]
    DuplicateAddress(String),

    #[error("poll {0} does not exist")]
    MissingPoll(i64),

    #[error("tally of poll {0} changed concurrently")]
    StaleTally(i64),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Which kind of store is serving requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Database,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Database => "database",
            StoreBackend::Memory => "memory",
        }
    }
}

/// A poll ready to be stored; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
    pub creator_address: String,
    pub derived_address: String,
    pub tx_id: String,
    pub status: AnchorStatus,
    pub created_at: DateTime<Utc>,
}

impl NewPoll {
    fn into_poll(self, id: i64) -> Poll {
        let vote_counts = vec![0; self.options.len()];
        Poll {
            id,
            question: self.question,
            options: self.options,
            vote_counts,
            total_votes: 0,
            created_at: self.created_at,
            creator_address: self.creator_address,
            tx_id: self.tx_id,
            derived_address: self.derived_address,
            status: self.status,
        }
    }
}

/// A vote ready to be stored; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewVote {
    pub poll_id: i64,
    pub voter_address: String,
    pub option_index: usize,
    pub derived_address: String,
    pub tx_id: String,
    pub status: AnchorStatus,
    pub voted_at: DateTime<Utc>,
}

impl NewVote {
    fn into_record(self, id: i64) -> VoteRecord {
        VoteRecord {
            id,
            poll_id: self.poll_id,
            voter_address: self.voter_address,
            option_index: self.option_index,
            tx_id: self.tx_id,
            voted_at: self.voted_at,
            derived_address: self.derived_address,
            status: self.status,
        }
    }
}

#[async_trait]
pub trait PollStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    /// Stores a poll with an all-zero tally.
    async fn create_poll(&self, poll: NewPoll) -> Result<Poll, StoreError>;

    async fn get_poll(&self, id: i64) -> Result<Option<Poll>, StoreError>;

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError>;

    async fn find_vote(
        &self,
        poll_id: i64,
        voter_address: &str,
    ) -> Result<Option<VoteRecord>, StoreError>;

    /// Inserts a vote without touching the tally. Fails with
    /// [`StoreError::DuplicateVote`] if the voter already voted.
    ///
    /// This and [`PollStore::save_tally`] are the single-step writes that
    /// [`PollStore::record_vote`] performs together; the ledger only casts
    /// votes through `record_vote`.
    async fn create_vote(&self, vote: NewVote) -> Result<VoteRecord, StoreError>;

    /// Writes `poll`'s tally if the stored total is still `expected_total`.
    async fn save_tally(&self, poll: &Poll, expected_total: u64) -> Result<(), StoreError>;

    /// `create_vote` and `save_tally` as one atomic step.
    async fn record_vote(
        &self,
        vote: NewVote,
        poll: &Poll,
        expected_total: u64,
    ) -> Result<VoteRecord, StoreError>;

    async fn close(&self) {}
}

/// Opens the database at `database_url`, falling back to memory on failure.
pub async fn connect(database_url: &str, max_connections: u32) -> Arc<dyn PollStore> {
    match SqlStore::connect(database_url, max_connections).await {
        Ok(store) => {
            info!(database_url, "database connected and tables created");
            Arc::new(store)
        }
        Err(err) => {
            error!(database_url, error = %err, "failed to open database");
            warn!("using in-memory store, data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    }
}

pub(crate) fn encode_list<T: Serialize>(values: &[T]) -> Result<String, StoreError> {
    serde_json::to_string(values).map_err(|err| StoreError::Corrupt(err.to_string()))
}

pub(crate) fn decode_list<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, StoreError> {
    serde_json::from_str(text).map_err(|err| StoreError::Corrupt(err.to_string()))
}
