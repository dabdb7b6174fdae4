// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod metrics;
pub mod sources;
pub mod update;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{Aggregator, SourceOutcome};
pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::sources::{FetchError, SourceFetcher};
pub use crate::update::Update;
