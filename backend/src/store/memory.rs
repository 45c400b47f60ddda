use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{NewPoll, NewVote, PollStore, StoreBackend, StoreError};
use crate::state::{Poll, VoteRecord};

#[derive(Default)]
struct Tables {
    polls: Vec<Poll>,
    votes: Vec<VoteRecord>,
}

impl Tables {
    fn poll_mut(&mut self, id: i64) -> Option<&mut Poll> {
        self.polls.iter_mut().find(|poll| poll.id == id)
    }

    fn insert_vote(&mut self, vote: NewVote) -> Result<VoteRecord, StoreError> {
        if !self.polls.iter().any(|poll| poll.id == vote.poll_id) {
            return Err(StoreError::MissingPoll(vote.poll_id));
        }
        if self
            .votes
            .iter()
            .any(|v| v.poll_id == vote.poll_id && v.voter_address == vote.voter_address)
        {
            return Err(StoreError::DuplicateVote);
        }

        let record = vote.into_record(self.votes.len() as i64 + 1);
        self.votes.push(record.clone());
        Ok(record)
    }

    fn check_tally(&mut self, poll: &Poll, expected_total: u64) -> Result<(), StoreError> {
        let stored = self
            .poll_mut(poll.id)
            .ok_or(StoreError::MissingPoll(poll.id))?;
        if stored.total_votes != expected_total {
            return Err(StoreError::StaleTally(poll.id));
        }
        Ok(())
    }

    fn write_tally(&mut self, poll: &Poll) {
        if let Some(stored) = self.poll_mut(poll.id) {
            stored.vote_counts = poll.vote_counts.clone();
            stored.total_votes = poll.total_votes;
        }
    }
}

/// In-process store used when no database is reachable
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    async fn create_poll(&self, poll: NewPoll) -> Result<Poll, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .polls
            .iter()
            .any(|p| p.derived_address == poll.derived_address)
        {
            return Err(StoreError::DuplicateAddress(poll.derived_address));
        }

        let poll = poll.into_poll(tables.polls.len() as i64 + 1);
        tables.polls.push(poll.clone());
        Ok(poll)
    }

    async fn get_poll(&self, id: i64) -> Result<Option<Poll>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.polls.iter().find(|poll| poll.id == id).cloned())
    }

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        Ok(self.tables.lock().await.polls.clone())
    }

    async fn find_vote(
        &self,
        poll_id: i64,
        voter_address: &str,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .votes
            .iter()
            .find(|v| v.poll_id == poll_id && v.voter_address == voter_address)
            .cloned())
    }

    async fn create_vote(&self, vote: NewVote) -> Result<VoteRecord, StoreError> {
        self.tables.lock().await.insert_vote(vote)
    }

    async fn save_tally(&self, poll: &Poll, expected_total: u64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.check_tally(poll, expected_total)?;
        tables.write_tally(poll);
        Ok(())
    }

    async fn record_vote(
        &self,
        vote: NewVote,
        poll: &Poll,
        expected_total: u64,
    ) -> Result<VoteRecord, StoreError> {
        let mut tables = self.tables.lock().await;
        // check everything before mutating so a failure leaves no partial vote
        tables.check_tally(poll, expected_total)?;
        let record = tables.insert_vote(vote)?;
        tables.write_tally(poll);
        Ok(record)
    }
}
