//! Poll creation and vote casting.
//!
//! Casting holds a per-poll lock from the duplicate check through the tally
//! write, so two requests for the same voter cannot both pass the check and
//! concurrent votes on one poll cannot lose tally increments. The store's
//! uniqueness rules back this up for writers outside this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use anchor_lang::prelude::Pubkey;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::anchoring::{AnchorEvent, AnchorReceipt, LedgerAnchor};
use crate::derive::AddressDeriver;
use crate::error::VoteError;
use crate::state::{Poll, VoteRecord};
use crate::store::{NewPoll, NewVote, PollStore, StoreBackend, StoreError};
use crate::validate::{
    parse_address, validate_option_count, validate_option_index, validate_poll_content,
};

/// Input for [`VoteLedger::create_poll`]
#[derive(Debug, Clone)]
pub struct CreatePoll {
    pub question: String,
    pub options: Vec<String>,
    pub creator_address: String,
}

/// Input for [`VoteLedger::cast_vote`]
#[derive(Debug, Clone)]
pub struct CastVote {
    pub poll_id: i64,
    pub option_index: i64,
    pub voter_address: String,
}

#[derive(Debug, Clone)]
pub struct PollCreated {
    pub poll: Poll,
    pub receipt: AnchorReceipt,
}

#[derive(Debug, Clone)]
pub struct VoteCast {
    pub vote: VoteRecord,
    pub poll: Poll,
    pub receipt: AnchorReceipt,
}

type PollLocks = StdMutex<HashMap<i64, Arc<Mutex<()>>>>;

/// A handle on one poll's lock. Dropping the last handle removes the map
/// entry, including when the request future is cancelled mid-vote.
struct PollLock<'a> {
    locks: &'a PollLocks,
    poll_id: i64,
    mutex: Arc<Mutex<()>>,
}

impl PollLock<'_> {
    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock().await
    }
}

impl Drop for PollLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // only the map and this handle still hold it
        if Arc::strong_count(&self.mutex) == 2 {
            locks.remove(&self.poll_id);
        }
    }
}

pub struct VoteLedger {
    store: Arc<dyn PollStore>,
    anchor: Arc<dyn LedgerAnchor>,
    deriver: AddressDeriver,
    poll_locks: PollLocks,
}

impl VoteLedger {
    pub fn new(
        store: Arc<dyn PollStore>,
        anchor: Arc<dyn LedgerAnchor>,
        deriver: AddressDeriver,
    ) -> Self {
        Self {
            store,
            anchor,
            deriver,
            poll_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &dyn PollStore {
        self.store.as_ref()
    }

    pub fn storage(&self) -> StoreBackend {
        self.store.backend()
    }

    pub fn anchor(&self) -> &dyn LedgerAnchor {
        self.anchor.as_ref()
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    pub async fn create_poll(&self, request: CreatePoll) -> Result<PollCreated, VoteError> {
        self.create_poll_at(request, Utc::now()).await
    }

    /// Creates a poll as of `now`; the timestamp is part of the poll address.
    pub async fn create_poll_at(
        &self,
        request: CreatePoll,
        now: DateTime<Utc>,
    ) -> Result<PollCreated, VoteError> {
        validate_option_count(&request.options)?;
        let creator = parse_address("creator", &request.creator_address)?;
        validate_poll_content(&request.question, &request.options)?;

        let created_at = now.timestamp();
        let derived = self.deriver.poll_address(&creator, created_at)?;
        let receipt = self
            .anchor
            .submit(AnchorEvent::PollCreated {
                poll_address: &derived.address,
                created_at,
            })
            .await?;

        let poll = self
            .store
            .create_poll(NewPoll {
                question: request.question,
                options: request.options,
                creator_address: request.creator_address,
                derived_address: derived.address.to_string(),
                tx_id: receipt.reference.clone(),
                status: receipt.status,
                created_at: now,
            })
            .await?;

        info!(
            poll_id = poll.id,
            poll_address = %poll.derived_address,
            creator = %poll.creator_address,
            options = poll.options.len(),
            "poll created"
        );
        Ok(PollCreated { poll, receipt })
    }

    pub async fn cast_vote(&self, request: CastVote) -> Result<VoteCast, VoteError> {
        let voter = parse_address("voter", &request.voter_address)?;
        let poll_lock = self.poll_lock(request.poll_id);
        let _guard = poll_lock.lock().await;
        self.cast_vote_locked(request, voter).await
    }

    async fn cast_vote_locked(
        &self,
        request: CastVote,
        voter: Pubkey,
    ) -> Result<VoteCast, VoteError> {
        if self
            .store
            .find_vote(request.poll_id, &request.voter_address)
            .await?
            .is_some()
        {
            warn!(
                poll_id = request.poll_id,
                voter = %request.voter_address,
                "rejected duplicate vote"
            );
            return Err(VoteError::AlreadyVoted);
        }

        let mut poll = self
            .store
            .get_poll(request.poll_id)
            .await?
            .ok_or(VoteError::PollNotFound(request.poll_id))?;
        let option_index = validate_option_index(&poll, request.option_index)?;

        // a stored poll address that no longer parses is a storage fault
        let poll_address = parse_address("poll", &poll.derived_address).map_err(|_| {
            VoteError::Persistence(StoreError::Corrupt(format!(
                "poll {} has invalid address {}",
                poll.id, poll.derived_address
            )))
        })?;
        let derived = self.deriver.vote_address(&poll_address, &voter)?;

        let voted_at = Utc::now();
        let receipt = self
            .anchor
            .submit(AnchorEvent::VoteCast {
                vote_address: &derived.address,
                voted_at: voted_at.timestamp(),
            })
            .await?;

        let expected_total = poll.total_votes;
        poll.record_vote(option_index)?;
        let vote = self
            .store
            .record_vote(
                NewVote {
                    poll_id: poll.id,
                    voter_address: request.voter_address,
                    option_index,
                    derived_address: derived.address.to_string(),
                    tx_id: receipt.reference.clone(),
                    status: receipt.status,
                    voted_at,
                },
                &poll,
                expected_total,
            )
            .await?;

        info!(
            poll_id = poll.id,
            voter = %vote.voter_address,
            option_index,
            vote_address = %vote.derived_address,
            total_votes = poll.total_votes,
            "vote cast"
        );
        Ok(VoteCast {
            vote,
            poll,
            receipt,
        })
    }

    pub async fn get_poll(&self, id: i64) -> Result<Poll, VoteError> {
        self.store
            .get_poll(id)
            .await?
            .ok_or(VoteError::PollNotFound(id))
    }

    pub async fn list_polls(&self) -> Result<Vec<Poll>, VoteError> {
        Ok(self.store.list_polls().await?)
    }

    fn poll_lock(&self, poll_id: i64) -> PollLock<'_> {
        let mutex = self
            .poll_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(poll_id)
            .or_default()
            .clone();
        PollLock {
            locks: &self.poll_locks,
            poll_id,
            mutex,
        }
    }

    #[cfg(test)]
    fn tracked_poll_locks(&self) -> usize {
        self.poll_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
