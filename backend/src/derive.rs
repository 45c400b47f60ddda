//! Program-derived addresses for polls and votes.
//!
//! Addresses are found the same way the vote program's `seeds = [...]`
//! constraints find them, so a record stored here can later be matched
//! with the account the program initializes.

use anchor_lang::prelude::Pubkey;
use anchor_lang::solana_program::pubkey::{MAX_SEEDS, MAX_SEED_LEN};
use thiserror::Error;
use vote_program::constants::{timestamp_seed, POLL_SEED, VOTE_SEED};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error("No valid bump seed found for derived address")]
    DerivationExhausted,

    #[error("Seed {index} is {len} bytes (maximum {max})", max = MAX_SEED_LEN)]
    SeedTooLong { index: usize, len: usize },

    #[error("Too many seeds: {count} (maximum {max})", max = MAX_SEEDS - 1)]
    TooManySeeds { count: usize },
}

/// A derived address together with the bump that moved it off the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: Pubkey,
    pub bump: u8,
}

/// Derives program addresses under a fixed program id.
#[derive(Debug, Clone, Copy)]
pub struct AddressDeriver {
    program_id: Pubkey,
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Searches bumps 255 down to 0 for the first hash of
    /// `seeds || bump || program_id` that is not an ed25519 point.
    pub fn derive(&self, seeds: &[&[u8]]) -> Result<DerivedAddress, DeriveError> {
        // one seed slot is taken by the bump
        if seeds.len() >= MAX_SEEDS {
            return Err(DeriveError::TooManySeeds { count: seeds.len() });
        }
        if let Some((index, seed)) = seeds
            .iter()
            .enumerate()
            .find(|(_, seed)| seed.len() > MAX_SEED_LEN)
        {
            return Err(DeriveError::SeedTooLong {
                index,
                len: seed.len(),
            });
        }

        Pubkey::try_find_program_address(seeds, &self.program_id)
            .map(|(address, bump)| DerivedAddress { address, bump })
            .ok_or(DeriveError::DerivationExhausted)
    }

    /// PDA `["poll", creator, created_at as 8 LE bytes]`.
    pub fn poll_address(
        &self,
        creator: &Pubkey,
        created_at: i64,
    ) -> Result<DerivedAddress, DeriveError> {
        self.derive(&[POLL_SEED, creator.as_ref(), &timestamp_seed(created_at)])
    }

    /// PDA `["vote", poll address, voter]`.
    pub fn vote_address(
        &self,
        poll: &Pubkey,
        voter: &Pubkey,
    ) -> Result<DerivedAddress, DeriveError> {
        self.derive(&[VOTE_SEED, poll.as_ref(), voter.as_ref()])
    }
}

impl Default for AddressDeriver {
    fn default() -> Self {
        Self::new(vote_program::ID)
    }
}
