//! sitewatch-state — embedded state store for SiteWatch.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for monitored endpoints and their probe event history.
//!
//! # Architecture
//!
//! Domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Endpoints are keyed by their id; events use the composite key
//! `{event_time_ms:020}:{endpoint_id}` so key order is chronological and
//! retention purges walk a range.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Every call is its own transaction,
//! so per-endpoint writes are independent and never require a whole-batch
//! commit.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
