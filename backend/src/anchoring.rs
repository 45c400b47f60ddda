//! Recording poll and vote events against the ledger.
//!
//! The ledger logic only sees [`LedgerAnchor`]. [`SimulatedAnchor`] stands in
//! until transactions are built, signed and submitted for real: it fabricates
//! a reference and always confirms.

use anchor_lang::prelude::Pubkey;
use async_trait::async_trait;
use thiserror::Error;

use crate::state::AnchorStatus;

#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("Ledger rejected submission: {0}")]
    Rejected(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// An event to be recorded on the ledger
#[derive(Debug, Clone, Copy)]
pub enum AnchorEvent<'a> {
    PollCreated {
        poll_address: &'a Pubkey,
        created_at: i64,
    },
    VoteCast {
        vote_address: &'a Pubkey,
        voted_at: i64,
    },
}

/// Outcome of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorReceipt {
    pub reference: String,
    pub status: AnchorStatus,
}

#[async_trait]
pub trait LedgerAnchor: Send + Sync {
    /// Short name reported by `/ping`
    fn mode(&self) -> &'static str;

    async fn is_connected(&self) -> bool;

    /// Whether polls can be read back from the chain
    fn reads_chain(&self) -> bool;

    async fn submit(&self, event: AnchorEvent<'_>) -> Result<AnchorReceipt, AnchorError>;

    fn explorer_url(&self, reference: &str) -> String;
}

pub struct SimulatedAnchor {
    cluster: String,
}

impl SimulatedAnchor {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }
}

#[async_trait]
impl LedgerAnchor for SimulatedAnchor {
    fn mode(&self) -> &'static str {
        "simulated"
    }

    async fn is_connected(&self) -> bool {
        false
    }

    fn reads_chain(&self) -> bool {
        false
    }

    async fn submit(&self, event: AnchorEvent<'_>) -> Result<AnchorReceipt, AnchorError> {
        let reference = match event {
            AnchorEvent::PollCreated { created_at, .. } => format!("simulated_tx_{}", created_at),
            AnchorEvent::VoteCast { voted_at, .. } => format!("simulated_vote_tx_{}", voted_at),
        };
        tracing::debug!(%reference, ?event, "simulated anchor submission");

        Ok(AnchorReceipt {
            reference,
            status: AnchorStatus::Confirmed,
        })
    }

    fn explorer_url(&self, reference: &str) -> String {
        format!(
            "https://explorer.solana.com/tx/{}?cluster={}",
            reference, self.cluster
        )
    }
}
