use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;

use anchor_lang::prelude::Pubkey;
use clap::{Args, Parser};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://vote.db?mode=rwc";

/// Vote backend: polls and votes with program-derived addresses
#[derive(Debug, Clone, Parser)]
#[command(name = "vote-backend", version)]
pub struct Config {
    /// Database connection string
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Maximum pooled database connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Program id used as the address derivation namespace (defaults to the vote program)
    #[arg(long, env = "PROGRAM_ID", value_parser = parse_program_id)]
    pub program_id: Option<Pubkey>,

    /// Cluster name used in explorer links
    #[arg(long, env = "SOLANA_CLUSTER", default_value = "devnet")]
    pub cluster: String,

    #[command(flatten)]
    pub rate: RateArgs,
}

#[derive(Debug, Clone, Args)]
pub struct RateArgs {
    /// Write requests allowed per client per window, 0 disables limiting
    #[arg(long, env = "RATE_LIMIT_REQUESTS", default_value_t = 60)]
    pub rate_limit_requests: u32,

    /// Window length in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 60)]
    pub rate_limit_window_secs: u64,

    /// Maximum number of clients tracked at once
    #[arg(long, env = "RATE_LIMIT_CAPACITY", default_value_t = 10_000)]
    pub rate_limit_capacity: usize,
}

fn parse_program_id(value: &str) -> Result<Pubkey, String> {
    Pubkey::from_str(value).map_err(|err| format!("invalid program id '{}': {}", value, err))
}

impl Config {
    pub fn program_id(&self) -> Pubkey {
        self.program_id.unwrap_or(vote_program::ID)
    }
}

impl RateArgs {
    pub fn capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.rate_limit_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
