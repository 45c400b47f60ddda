use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, FromRow};

use super::{decode_list, encode_list, NewPoll, NewVote, PollStore, StoreBackend, StoreError};
use crate::state::{Poll, VoteRecord};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS polls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        question TEXT NOT NULL,
        options TEXT NOT NULL,
        vote_counts TEXT NOT NULL,
        total_votes INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        creator_address TEXT NOT NULL,
        tx_id TEXT NOT NULL DEFAULT '',
        blockchain_address TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL DEFAULT 'pending'
    )",
    "CREATE TABLE IF NOT EXISTS vote_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        poll_id INTEGER NOT NULL REFERENCES polls(id),
        voter_address TEXT NOT NULL,
        option_index INTEGER NOT NULL,
        tx_id TEXT NOT NULL DEFAULT '',
        voted_at TEXT NOT NULL,
        blockchain_vote_address TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        UNIQUE (poll_id, voter_address)
    )",
    "CREATE INDEX IF NOT EXISTS idx_vote_records_voter ON vote_records (voter_address)",
];

const POLL_COLUMNS: &str = "id, question, options, vote_counts, total_votes, created_at, \
     creator_address, tx_id, blockchain_address, status";

const VOTE_COLUMNS: &str = "id, poll_id, voter_address, option_index, tx_id, voted_at, \
     blockchain_vote_address, status";

#[derive(FromRow)]
struct PollRow {
    id: i64,
    question: String,
    options: String,
    vote_counts: String,
    total_votes: i64,
    created_at: DateTime<Utc>,
    creator_address: String,
    tx_id: String,
    blockchain_address: String,
    status: String,
}

impl TryFrom<PollRow> for Poll {
    type Error = StoreError;

    fn try_from(row: PollRow) -> Result<Self, Self::Error> {
        let poll = Poll {
            id: row.id,
            question: row.question,
            options: decode_list(&row.options)?,
            vote_counts: decode_list(&row.vote_counts)?,
            total_votes: to_u64(row.total_votes)?,
            created_at: row.created_at,
            creator_address: row.creator_address,
            tx_id: row.tx_id,
            derived_address: row.blockchain_address,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
        };
        if !poll.tally_is_consistent() {
            return Err(StoreError::Corrupt(format!(
                "poll {} tally does not match its options",
                poll.id
            )));
        }
        Ok(poll)
    }
}

#[derive(FromRow)]
struct VoteRow {
    id: i64,
    poll_id: i64,
    voter_address: String,
    option_index: i64,
    tx_id: String,
    voted_at: DateTime<Utc>,
    blockchain_vote_address: String,
    status: String,
}

impl TryFrom<VoteRow> for VoteRecord {
    type Error = StoreError;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        Ok(VoteRecord {
            id: row.id,
            poll_id: row.poll_id,
            voter_address: row.voter_address,
            option_index: usize::try_from(row.option_index)
                .map_err(|_| StoreError::Corrupt(format!("option index {}", row.option_index)))?,
            tx_id: row.tx_id,
            voted_at: row.voted_at,
            derived_address: row.blockchain_vote_address,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
        })
    }
}

fn to_u64(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative count {}", value)))
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("count {} too large", value)))
}

// Maps constraint violations to the store's own errors
fn constraint_error(err: sqlx::Error, on_unique: StoreError, on_foreign_key: StoreError) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => on_unique,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => on_foreign_key,
        _ => StoreError::Database(err),
    }
}

async fn insert_vote<'e, E>(executor: E, vote: &NewVote) -> Result<i64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        "INSERT INTO vote_records \
         (poll_id, voter_address, option_index, tx_id, voted_at, blockchain_vote_address, status) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(vote.poll_id)
    .bind(&vote.voter_address)
    .bind(vote.option_index as i64)
    .bind(&vote.tx_id)
    .bind(vote.voted_at)
    .bind(&vote.derived_address)
    .bind(vote.status.as_str())
    .fetch_one(executor)
    .await
    .map_err(|err| {
        constraint_error(err, StoreError::DuplicateVote, StoreError::MissingPoll(vote.poll_id))
    })
}

async fn update_tally<'e, E>(executor: E, poll: &Poll, expected_total: u64) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE polls SET vote_counts = ?, total_votes = ? WHERE id = ? AND total_votes = ?",
    )
    .bind(encode_list(&poll.vote_counts)?)
    .bind(to_i64(poll.total_votes)?)
    .bind(poll.id)
    .bind(to_i64(expected_total)?)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::StaleTally(poll.id));
    }
    Ok(())
}

/// SQLite-backed store
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Opens the pool and creates the tables if they are missing.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = if database_url.contains(":memory:") {
            // every connection to :memory: is its own database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .acquire_timeout(Duration::from_secs(5))
        };
        let pool = options.connect(database_url).await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl PollStore for SqlStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Database
    }

    async fn create_poll(&self, poll: NewPoll) -> Result<Poll, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO polls \
             (question, options, vote_counts, total_votes, created_at, creator_address, tx_id, \
              blockchain_address, status) \
             VALUES (?, ?, ?, 0, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&poll.question)
        .bind(encode_list(&poll.options)?)
        .bind(encode_list(&vec![0u64; poll.options.len()])?)
        .bind(poll.created_at)
        .bind(&poll.creator_address)
        .bind(&poll.tx_id)
        .bind(&poll.derived_address)
        .bind(poll.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            constraint_error(
                err,
                StoreError::DuplicateAddress(poll.derived_address.clone()),
                StoreError::Corrupt("unexpected foreign key on polls".to_string()),
            )
        })?;

        Ok(poll.into_poll(id))
    }

    async fn get_poll(&self, id: i64) -> Result<Option<Poll>, StoreError> {
        let row: Option<PollRow> =
            sqlx::query_as(&format!("SELECT {} FROM polls WHERE id = ?", POLL_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Poll::try_from).transpose()
    }

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let rows: Vec<PollRow> =
            sqlx::query_as(&format!("SELECT {} FROM polls ORDER BY id", POLL_COLUMNS))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Poll::try_from).collect()
    }

    async fn find_vote(
        &self,
        poll_id: i64,
        voter_address: &str,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let row: Option<VoteRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vote_records WHERE poll_id = ? AND voter_address = ?",
            VOTE_COLUMNS
        ))
        .bind(poll_id)
        .bind(voter_address)
        .fetch_optional(&self.pool)
        .await?;
        row.map(VoteRecord::try_from).transpose()
    }

    async fn create_vote(&self, vote: NewVote) -> Result<VoteRecord, StoreError> {
        let id = insert_vote(&self.pool, &vote).await?;
        Ok(vote.into_record(id))
    }

    async fn save_tally(&self, poll: &Poll, expected_total: u64) -> Result<(), StoreError> {
        update_tally(&self.pool, poll, expected_total).await
    }

    async fn record_vote(
        &self,
        vote: NewVote,
        poll: &Poll,
        expected_total: u64,
    ) -> Result<VoteRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = insert_vote(&mut *tx, &vote).await?;
        // dropping tx without commit rolls the insert back
        update_tally(&mut *tx, poll, expected_total).await?;
        tx.commit().await?;
        Ok(vote.into_record(id))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
