pub mod aggregate;
pub mod analyze;
pub mod common;
pub mod snapshot;
