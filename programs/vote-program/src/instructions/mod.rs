// Export all instruction modules

pub mod create_poll;
pub mod cast_vote;

// Re-export the instruction structs for easy access
pub use create_poll::*;
pub use cast_vote::*;
