//! Fluent batch accumulator. Operations are enqueued by key/value
//! setters and key-only deletes into a thread-safe in-memory list;
//! `execute` hands the whole batch to the store in one shot so the
//! engine sees exactly one durable-write request for the entire
//! batch, regardless of how many keys it touches.

use crate::Store;
use codex_types::{Error, ErrorKind, MutationOp, MutationRequest};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// An ordered, mutable sequence of pending `set`/`delete` operations
/// bound to the [`Store`] that will execute them.
pub struct Batch<'a> {
    store: &'a Store,
    ops: Mutex<Vec<MutationRequest>>,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            ops: Mutex::new(Vec::new()),
        }
    }

    /// Enqueues a `set` operation. `value` is marshaled with the
    /// store's default JSON codec immediately, so a bad value fails
    /// fast here rather than at `execute`.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if `value` cannot be serialized.
    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(value)?;
        self.ops.lock().push(MutationRequest::set(key, bytes));
        Ok(())
    }

    /// Enqueues a `delete` operation. No-op at execution time if the
    /// key is absent.
    pub fn delete(&self, key: impl Into<String>) {
        self.ops.lock().push(MutationRequest::delete(key));
    }

    /// Number of operations currently queued.
    #[must_use]
    pub fn size(&self) -> usize {
        self.ops.lock().len()
    }

    /// Empties the queue. `clear` is a batch-object operation here,
    /// distinct from [`Store::clear`]: it discards pending ops rather
    /// than wiping the store.
    pub fn clear(&self) {
        self.ops.lock().clear();
    }

    /// Returns the queued operations as ordered tuples of
    /// `(op, key, marshaled value bytes)`; the value is empty for
    /// `Delete`.
    #[must_use]
    pub fn serialize(&self) -> Vec<(MutationOp, Option<String>, Vec<u8>)> {
        self.ops
            .lock()
            .iter()
            .map(|req| (req.op, req.key.clone(), req.value.clone().unwrap_or_default()))
            .collect()
    }

    /// Rejects an empty batch or any queued operation with an empty
    /// key.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error describing which rule failed.
    pub fn validate(&self) -> Result<(), Error> {
        let ops = self.ops.lock();
        if ops.is_empty() {
            return Err(Error::new(ErrorKind::Validation, "batch is empty"));
        }
        if ops.iter().any(|req| req.key.as_deref() == Some("")) {
            return Err(Error::new(ErrorKind::Validation, "batch contains an empty key"));
        }
        Ok(())
    }

    /// Reduces the queue to one operation per key — the latest —
    /// preserving the relative order of the surviving keys' first
    /// appearance.
    pub fn optimize(&self) {
        let mut ops = self.ops.lock();
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, MutationRequest> = HashMap::new();
        for req in ops.iter() {
            let key = req.key.clone().unwrap_or_default();
            if !latest.contains_key(&key) {
                order.push(key.clone());
            }
            latest.insert(key, req.clone());
        }
        *ops = order
            .into_iter()
            .filter_map(|key| latest.remove(&key))
            .collect();
    }

    /// Applies every queued operation to the store's in-memory map
    /// under a single critical section, then issues one durable-write
    /// call to the engine with the final state.
    ///
    /// # Errors
    ///
    /// Propagates engine persistence failures. An empty batch is a
    /// no-op, not an error (mirrors the snapshot engine's
    /// `persist_batch` contract).
    pub fn execute(&self) -> Result<(), Error> {
        let ops = self.ops.lock().clone();
        if ops.is_empty() {
            return Ok(());
        }
        self.store.execute_batch(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_types::Options;

    fn store(dir: &std::path::Path) -> Store {
        Store::open(dir.join("data.db"), Options::default()).unwrap()
    }

    #[test]
    fn optimize_keeps_last_op_per_key_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let batch = s.new_batch();
        batch.set("a", &1).unwrap();
        batch.set("b", &2).unwrap();
        batch.set("a", &3).unwrap();
        batch.delete("c");
        batch.optimize();

        let ops = batch.serialize();
        let keys: Vec<_> = ops.iter().map(|(_, k, _)| k.clone().unwrap()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(ops[0].2, serde_json::to_vec(&3).unwrap());
    }

    #[test]
    fn validate_rejects_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let batch = s.new_batch();
        assert!(batch.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_key() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let batch = s.new_batch();
        batch.delete("");
        assert!(batch.validate().is_err());
    }

    #[test]
    fn execute_applies_every_op_in_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let batch = s.new_batch();
        batch.set("a", &1).unwrap();
        batch.set("b", &2).unwrap();
        batch.execute().unwrap();

        assert_eq!(s.get::<i32>("a").unwrap(), 1);
        assert_eq!(s.get::<i32>("b").unwrap(), 2);
    }

    #[test]
    fn execute_with_optimize_matches_execute_without() {
        let dir = tempfile::tempdir().unwrap();
        let s1 = store(dir.path());
        let b1 = s1.new_batch();
        b1.set("k", &1).unwrap();
        b1.set("k", &2).unwrap();
        b1.execute().unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        let s2 = store(dir2.path());
        let b2 = s2.new_batch();
        b2.set("k", &1).unwrap();
        b2.set("k", &2).unwrap();
        b2.optimize();
        b2.execute().unwrap();

        assert_eq!(s1.get::<i32>("k").unwrap(), s2.get::<i32>("k").unwrap());
    }
}
