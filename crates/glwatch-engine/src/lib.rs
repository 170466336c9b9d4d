pub mod commands;
pub mod config;
pub mod contracts;
pub mod detection;
pub mod error;
pub mod grouping;
pub mod ledger;
pub mod migrations;
pub mod pipeline;
pub mod report;
pub mod setup;
pub mod snapshots;
pub mod state;

pub use contracts::envelope::{FailureEnvelope, SuccessEnvelope};
pub use error::{EngineError, EngineResult};

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
