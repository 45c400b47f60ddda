use anchor_lang::prelude::*;

use crate::error::VoteError;

// The Poll account stores the question, options and running tally
#[account]
#[derive(InitSpace)]
pub struct Poll {
    // Who created this poll
    pub creator: Pubkey,
    
    // Unix timestamp of creation, also a PDA seed
    pub created_at: i64,
    
    // The question being asked (e.g., "What's your favorite color?")
    #[max_len(200)] // Limit question to 200 characters
    pub question: String,
    
    // The available options to vote for (e.g., ["Red", "Blue", "Green"])
    #[max_len(10, 50)] // Max 10 options, each up to 50 characters
    pub options: Vec<String>,
    
    // Vote counts for each option (parallel to options vec)
    #[max_len(10)] // Must match options length
    pub vote_counts: Vec<u64>,
    
    // Total number of votes cast
    pub total_votes: u64,
    
    // Bump seed for PDA
    pub bump: u8,
}

// Vote Record - proves that a user has voted on a specific poll
// Its PDA is unique per voter per poll, so a second vote cannot be initialized
#[account]
#[derive(InitSpace)]
pub struct VoteRecord {
    // Which poll this vote was cast on
    pub poll: Pubkey,
    
    // Who cast this vote
    pub voter: Pubkey,
    
    // Which option they voted for (index into poll.options)
    pub option_index: u8,
    
    // When the vote was cast
    pub voted_at: i64,
    
    // Bump seed for PDA
    pub bump: u8,
}

impl Poll {
    // Helper method to validate option index
    pub fn is_valid_option(&self, option_index: u8) -> bool {
        (option_index as usize) < self.options.len()
    }
    
    // Count one vote for the option, keeping total_votes == sum(vote_counts)
    pub fn record_vote(&mut self, option_index: u8) -> Result<()> {
        if !self.is_valid_option(option_index) {
            return Err(VoteError::InvalidOption.into());
        }
        
        let count = self
            .vote_counts
            .get_mut(option_index as usize)
            .ok_or(VoteError::InvalidOption)?;
        *count = count.checked_add(1).ok_or(VoteError::VoteCountOverflow)?;
        self.total_votes = self
            .total_votes
            .checked_add(1)
            .ok_or(VoteError::VoteCountOverflow)?;
        
        Ok(())
    }
}
