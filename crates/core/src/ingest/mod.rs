//! Ingest loop - turns announcement events into catalog entries.
//!
//! Events are handled strictly one at a time in delivery order:
//! decode, normalize, upsert (with retry), record the outcome. A stop signal
//! is only observed between events, so an in-flight upsert always finishes.

mod runner;
mod types;

pub use runner::IngestLoop;
pub use types::*;
