//! redb table definitions for the SiteWatch state store.
//!
//! Both tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Event keys zero-pad the timestamp to 20 digits so lexicographic
//! key order equals chronological order.

use redb::TableDefinition;

/// Endpoint configs + runtime state keyed by `{endpoint_id}`.
pub const ENDPOINTS: TableDefinition<&str, &[u8]> = TableDefinition::new("endpoints");

/// Probe history keyed by `{event_time_ms:020}:{endpoint_id}`.
pub const EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("events");
