use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::anchoring::SimulatedAnchor;
use crate::config::Config;
use crate::derive::AddressDeriver;
use crate::ledger::VoteLedger;
use crate::rate_limit::RateLimiter;
use crate::store;

/// Service dependencies, built once at startup and shared by every request
pub struct App {
    pub ledger: VoteLedger,
    pub limiter: Option<RateLimiter>,
}

impl App {
    pub fn new(ledger: VoteLedger, limiter: Option<RateLimiter>) -> Self {
        Self { ledger, limiter }
    }

    /// Connects the store (falling back to memory) and wires the ledger.
    pub async fn init(config: &Config) -> Self {
        let store = store::connect(&config.database_url, config.db_max_connections).await;
        let anchor = Arc::new(SimulatedAnchor::new(config.cluster.clone()));
        let deriver = AddressDeriver::new(config.program_id());
        info!(
            program_id = %deriver.program_id(),
            storage = store.backend().as_str(),
            cluster = %config.cluster,
            "vote ledger initialized"
        );

        let limiter = (config.rate.rate_limit_requests > 0).then(|| {
            RateLimiter::new(
                config.rate.rate_limit_requests,
                Duration::from_secs(config.rate.rate_limit_window_secs),
                config.rate.capacity(),
            )
        });

        Self::new(VoteLedger::new(store, anchor, deriver), limiter)
    }

    pub async fn shutdown(&self) {
        self.ledger.store().close().await;
        info!("vote backend stopped");
    }
}
