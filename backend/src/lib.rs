pub mod anchoring;
pub mod api;
pub mod app;
pub mod config;
pub mod derive;
pub mod error;
pub mod ledger;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod validate;

pub use app::App;
pub use config::Config;
pub use error::VoteError;
