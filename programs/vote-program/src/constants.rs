// PDA Seeds for deterministic address generation

// Seed for Poll PDAs: ["poll", creator.key(), created_at as 8 LE bytes]
// The creation timestamp lets one creator own many polls
pub const POLL_SEED: &[u8] = b"poll";

// Seed for Vote Record PDAs: ["vote", poll.key(), voter.key()]
// This ensures one vote record per voter per poll
pub const VOTE_SEED: &[u8] = b"vote";

// Maximum values for validation
pub const MAX_QUESTION_LENGTH: usize = 200;
pub const MAX_OPTION_LENGTH: usize = 50;
pub const MIN_OPTIONS_COUNT: usize = 2;
pub const MAX_OPTIONS_COUNT: usize = 10;

// Anchor discriminator size (8 bytes)
pub const DISCRIMINATOR_SIZE: usize = 8;

/// Check if a poll may carry this many options
pub fn is_valid_option_count(count: usize) -> bool {
    (MIN_OPTIONS_COUNT..=MAX_OPTIONS_COUNT).contains(&count)
}

/// Seed bytes for a poll creation timestamp
pub fn timestamp_seed(created_at: i64) -> [u8; 8] {
    created_at.to_le_bytes()
}
