use anchor_lang::prelude::*;

// Custom error types for the vote program
#[error_code]
pub enum VoteError {
    #[msg("Invalid option index provided")]
    InvalidOption,
    
    #[msg("Question cannot be empty")]
    EmptyQuestion,
    
    #[msg("Question is too long (maximum 200 characters)")]
    QuestionTooLong,
    
    #[msg("Option text cannot be empty")]
    EmptyOption,
    
    #[msg("Option text is too long (maximum 50 characters)")]
    OptionTooLong,
    
    #[msg("Too many options provided (maximum 10)")]
    TooManyOptions,
    
    #[msg("At least 2 options are required")]
    NotEnoughOptions,
    
    #[msg("Vote count overflow")]
    VoteCountOverflow,
}
