use anchor_lang::prelude::*;
use crate::{constants::*, error::VoteError, state::{Poll, VoteRecord}};

// Accounts needed for casting a vote
#[derive(Accounts)]
pub struct CastVote<'info> {
    // The person casting the vote (must sign the transaction)
    #[account(mut)]
    pub voter: Signer<'info>,
    
    // The poll being voted on (will be modified to increment vote count)
    #[account(
        mut,
        seeds = [POLL_SEED, poll.creator.as_ref(), timestamp_seed(poll.created_at).as_ref()],
        bump = poll.bump
    )]
    pub poll: Account<'info, Poll>,
    
    // Vote record PDA - proves this user voted (prevents double voting)
    #[account(
        init,                                    // Create new vote record
        payer = voter,                          // Voter pays for account creation
        space = DISCRIMINATOR_SIZE + VoteRecord::INIT_SPACE,
        seeds = [VOTE_SEED, poll.key().as_ref(), voter.key().as_ref()],
        bump                                    // Anchor finds the canonical bump
    )]
    pub vote_record: Account<'info, VoteRecord>,
    
    // Required system program for account creation
    pub system_program: Program<'info, System>,
}

impl<'info> CastVote<'info> {
    pub fn cast_vote(
        &mut self,
        option_index: u8,
        bumps: &CastVoteBumps,
    ) -> Result<()> {
        // Validate the option index
        if !self.poll.is_valid_option(option_index) {
            return Err(VoteError::InvalidOption.into());
        }
        
        // Get current time
        let current_time = Clock::get()?.unix_timestamp;
        
        // Create the vote record (this also prevents double voting since
        // the PDA will fail to create if it already exists)
        self.vote_record.set_inner(VoteRecord {
            poll: self.poll.key(),
            voter: self.voter.key(),
            option_index,
            voted_at: current_time,
            bump: bumps.vote_record,
        });
        
        // Increment the option count and the total
        self.poll.record_vote(option_index)?;
        
        msg!("Vote cast successfully!");
        msg!("Voter: {}", self.voter.key());
        msg!("Poll: {}", self.poll.key());
        msg!("Option index: {}", option_index);
        msg!("Total votes in poll: {}", self.poll.total_votes);
        
        Ok(())
    }
}
