use anchor_lang::prelude::*;

// Import our modules
pub mod constants;
pub mod error;
pub mod state;
pub mod instructions;

// Import instruction handlers
use instructions::*;

declare_id!("HrcYHz2aTi7YT6QJcUbsD3eEF4UDXt7qo1S12b4B9rz6");

#[program]
pub mod vote_program {
    use super::*;

    // Create a new poll; created_at is part of the poll PDA seeds
    pub fn create_poll(
        ctx: Context<CreatePoll>,
        created_at: i64,
        question: String,
        options: Vec<String>,
    ) -> Result<()> {
        ctx.accounts.create_poll(created_at, question, options, &ctx.bumps)
    }

    // Cast a vote on an existing poll
    pub fn cast_vote(
        ctx: Context<CastVote>,
        option_index: u8,
    ) -> Result<()> {
        ctx.accounts.cast_vote(option_index, &ctx.bumps)
    }
}
