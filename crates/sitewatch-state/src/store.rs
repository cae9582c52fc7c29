//! StateStore — redb-backed persistence for SiteWatch.
//!
//! Provides typed CRUD over endpoints and probe events. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).
//!
//! Every operation is its own transaction: endpoint writes during a monitor
//! cycle are independent, so one endpoint's persistence failure never rolls
//! back another's.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::{ENDPOINTS, EVENTS};
use crate::types::{Endpoint, Event};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
        txn.open_table(EVENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Endpoints ──────────────────────────────────────────────────

    /// Insert or update an endpoint.
    pub fn put_endpoint(&self, endpoint: &Endpoint) -> StateResult<()> {
        let value = serde_json::to_vec(endpoint).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
            table
                .insert(endpoint.table_key(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(endpoint_id = %endpoint.id, "endpoint stored");
        Ok(())
    }

    /// Get an endpoint by id.
    pub fn get_endpoint(&self, id: &str) -> StateResult<Option<Endpoint>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let endpoint: Endpoint =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(endpoint))
            }
            None => Ok(None),
        }
    }

    /// List all endpoints, active or not.
    pub fn list_endpoints(&self) -> StateResult<Vec<Endpoint>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let endpoint: Endpoint =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(endpoint);
        }
        Ok(results)
    }

    /// Delete an endpoint by id. Returns true if it existed.
    ///
    /// Historical events for the endpoint are left in place; the retention
    /// purge ages them out.
    pub fn delete_endpoint(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(endpoint_id = %id, existed, "endpoint deleted");
        Ok(existed)
    }

    // ── Events ─────────────────────────────────────────────────────

    /// Append a probe event. Events are immutable once written.
    pub fn put_event(&self, event: &Event) -> StateResult<()> {
        let key = event.table_key();
        let value = serde_json::to_vec(event).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// List all events in chronological order.
    pub fn list_events(&self) -> StateResult<Vec<Event>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let event: Event =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(event);
        }
        Ok(results)
    }

    /// List all events for one endpoint, in chronological order.
    pub fn list_events_for_endpoint(&self, endpoint_id: &str) -> StateResult<Vec<Event>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let event: Event =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if event.endpoint_id == endpoint_id {
                results.push(event);
            }
        }
        Ok(results)
    }

    /// Delete every event with a timestamp strictly before `cutoff_ms`.
    /// Returns the number deleted.
    ///
    /// Event keys start with the zero-padded timestamp, so the matching
    /// keys form a contiguous range at the front of the table.
    pub fn delete_events_older_than(&self, cutoff_ms: u64) -> StateResult<u64> {
        let cutoff_prefix = format!("{cutoff_ms:020}");
        // Collect keys in a read transaction first.
        let keys: Vec<String> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                let k = key.value().to_string();
                if k.as_str() >= cutoff_prefix.as_str() {
                    break;
                }
                keys.push(k);
            }
            keys
        };
        // Delete in a write transaction.
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = keys.len() as u64;
        {
            let mut table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count, cutoff_ms, "old events purged");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LastNotification, STATUS_OK};

    fn test_endpoint(id: &str) -> Endpoint {
        Endpoint {
            assert_text: Some("healthy".to_string()),
            failure_threshold: 3,
            notify: "ops@example.com".to_string(),
            ..Endpoint::new(id, format!("name-{id}"), format!("https://{id}.example.com"))
        }
    }

    fn test_event(endpoint_id: &str, time_ms: u64, state: &str) -> Event {
        Event {
            endpoint_id: endpoint_id.to_string(),
            event_time_ms: time_ms,
            state: state.to_string(),
            description: format!("name-{endpoint_id} {state}"),
            response_time_ms: 42,
            status_change: false,
        }
    }

    #[test]
    fn endpoint_put_get_round_trip() {
        let store = StateStore::open_in_memory().unwrap();
        let ep = test_endpoint("ep-1");
        store.put_endpoint(&ep).unwrap();

        let loaded = store.get_endpoint("ep-1").unwrap().unwrap();
        assert_eq!(loaded, ep);
        assert!(store.get_endpoint("nope").unwrap().is_none());
    }

    #[test]
    fn endpoint_put_overwrites() {
        let store = StateStore::open_in_memory().unwrap();
        let mut ep = test_endpoint("ep-1");
        store.put_endpoint(&ep).unwrap();

        ep.status = STATUS_OK.to_string();
        ep.failures = 0;
        ep.last_notification = LastNotification::Ok;
        store.put_endpoint(&ep).unwrap();

        let loaded = store.get_endpoint("ep-1").unwrap().unwrap();
        assert_eq!(loaded.status, STATUS_OK);
        assert_eq!(loaded.last_notification, LastNotification::Ok);
        assert_eq!(store.list_endpoints().unwrap().len(), 1);
    }

    #[test]
    fn endpoint_list_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_endpoint(&test_endpoint("ep-1")).unwrap();
        store.put_endpoint(&test_endpoint("ep-2")).unwrap();
        assert_eq!(store.list_endpoints().unwrap().len(), 2);

        assert!(store.delete_endpoint("ep-1").unwrap());
        assert!(!store.delete_endpoint("ep-1").unwrap());
        assert_eq!(store.list_endpoints().unwrap().len(), 1);
    }

    #[test]
    fn events_list_in_chronological_order() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_event(&test_event("ep-1", 3_000, "OK")).unwrap();
        store.put_event(&test_event("ep-2", 1_000, "FAIL")).unwrap();
        store.put_event(&test_event("ep-1", 2_000, "OK")).unwrap();

        let times: Vec<u64> = store
            .list_events()
            .unwrap()
            .iter()
            .map(|e| e.event_time_ms)
            .collect();
        assert_eq!(times, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn events_filtered_by_endpoint() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_event(&test_event("ep-1", 1_000, "OK")).unwrap();
        store.put_event(&test_event("ep-2", 2_000, "FAIL")).unwrap();
        store.put_event(&test_event("ep-1", 3_000, "OK")).unwrap();

        let events = store.list_events_for_endpoint("ep-1").unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.endpoint_id == "ep-1"));
    }

    #[test]
    fn purge_deletes_only_older_events() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_event(&test_event("ep-1", 1_000, "OK")).unwrap();
        store.put_event(&test_event("ep-1", 2_000, "OK")).unwrap();
        store.put_event(&test_event("ep-1", 3_000, "OK")).unwrap();

        let deleted = store.delete_events_older_than(2_500).unwrap();
        assert_eq!(deleted, 2);

        let remaining = store.list_events().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].event_time_ms, 3_000);
    }

    #[test]
    fn purge_cutoff_is_exclusive_of_equal_timestamp() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_event(&test_event("ep-1", 2_000, "OK")).unwrap();

        // Strictly-older semantics: an event exactly at the cutoff survives.
        assert_eq!(store.delete_events_older_than(2_000).unwrap(), 0);
        assert_eq!(store.list_events().unwrap().len(), 1);
    }

    #[test]
    fn purge_is_idempotent() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_event(&test_event("ep-1", 1_000, "OK")).unwrap();
        store.put_event(&test_event("ep-1", 9_000, "OK")).unwrap();

        assert_eq!(store.delete_events_older_than(5_000).unwrap(), 1);
        assert_eq!(store.delete_events_older_than(5_000).unwrap(), 0);
        assert_eq!(store.list_events().unwrap().len(), 1);
    }

    #[test]
    fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sitewatch.redb");

        {
            let store = StateStore::open(&path).unwrap();
            store.put_endpoint(&test_endpoint("ep-1")).unwrap();
            store.put_event(&test_event("ep-1", 1_000, "OK")).unwrap();
        }

        let store = StateStore::open(&path).unwrap();
        assert!(store.get_endpoint("ep-1").unwrap().is_some());
        assert_eq!(store.list_events().unwrap().len(), 1);
    }
}
