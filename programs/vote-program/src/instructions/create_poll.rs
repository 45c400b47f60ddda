use anchor_lang::prelude::*;
use crate::{constants::*, error::VoteError, state::Poll};

// Accounts needed for creating a new poll
#[derive(Accounts)]
#[instruction(created_at: i64)]
pub struct CreatePoll<'info> {
    // The person creating the poll (must sign the transaction)
    #[account(mut)]
    pub creator: Signer<'info>,
    
    // The poll account (PDA) - will be created
    #[account(
        init,                                    // Create new account
        payer = creator,                        // Creator pays for account creation
        space = DISCRIMINATOR_SIZE + Poll::INIT_SPACE,
        seeds = [POLL_SEED, creator.key().as_ref(), timestamp_seed(created_at).as_ref()],
        bump                                    // Anchor finds the canonical bump
    )]
    pub poll: Account<'info, Poll>,
    
    // Required system program for account creation
    pub system_program: Program<'info, System>,
}

impl<'info> CreatePoll<'info> {
    pub fn create_poll(
        &mut self,
        created_at: i64,
        question: String,
        options: Vec<String>,
        bumps: &CreatePollBumps,
    ) -> Result<()> {
        // Input validation
        validate_inputs(&question, &options)?;
        
        // Initialize vote counts (all start at 0)
        let vote_counts = vec![0u64; options.len()];
        
        // Set up the poll account
        self.poll.set_inner(Poll {
            creator: self.creator.key(),
            created_at,
            question,
            options,
            vote_counts,
            total_votes: 0,
            bump: bumps.poll,
        });
        
        msg!("Poll created successfully!");
        msg!("Poll: {}", self.poll.key());
        msg!("Creator: {}", self.creator.key());
        msg!("Created at: {}", created_at);
        
        Ok(())
    }
}

// Validation helper function
pub fn validate_inputs(question: &str, options: &[String]) -> Result<()> {
    if question.trim().is_empty() {
        return Err(VoteError::EmptyQuestion.into());
    }
    
    // Check question length
    if question.len() > MAX_QUESTION_LENGTH {
        return Err(VoteError::QuestionTooLong.into());
    }
    
    // Check minimum options
    if options.len() < MIN_OPTIONS_COUNT {
        return Err(VoteError::NotEnoughOptions.into());
    }
    
    // Check maximum options
    if options.len() > MAX_OPTIONS_COUNT {
        return Err(VoteError::TooManyOptions.into());
    }
    
    // Check each option
    for option in options {
        if option.trim().is_empty() {
            return Err(VoteError::EmptyOption.into());
        }
        if option.len() > MAX_OPTION_LENGTH {
            return Err(VoteError::OptionTooLong.into());
        }
    }
    
    Ok(())
}
