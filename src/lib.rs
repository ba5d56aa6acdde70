//! Stakehouse - provably fair casino game service.
//!
//! Server-side core of a betting storefront: outcome generation with a
//! verifiable fairness proof, three mini-game engines (dice, slots, crash),
//! and the settlement ledger they pay into. Exposed over an axum HTTP API
//! with a websocket feed for live crash rounds.

pub mod api;
pub mod config;
pub mod errors;
pub mod fairness;
pub mod games;
pub mod ledger;
pub mod metrics;

pub use config::StakehouseConfig;
pub use errors::{StakehouseError, StakehouseResult};
pub use fairness::FairnessEngine;
pub use games::GameService;
pub use ledger::{LedgerStore, MemoryLedger};
pub use metrics::MetricsRegistry;
