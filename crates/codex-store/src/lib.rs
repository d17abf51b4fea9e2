#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! Embeddable, single-file key-value store with two pluggable
//! persistence strategies (whole-map snapshots or an append-only
//! ledger), optional AEAD encryption, optional block compression,
//! content integrity, crash-safe writes, and single-writer process
//! exclusion.
//!
//! Concurrency discipline (see [`Store`]): in-memory mutation is
//! guarded by a short-lived reader-writer lock; durable engine I/O is
//! serialized behind a separate lock so readers and writers never
//! block on disk. See the module docs on [`engine`], [`batch`], and
//! [`backup`] for the persistence pipeline, the batch planner, and
//! snapshot backup rotation respectively.

mod atomic;
mod backup;
mod batch;
pub mod engine;
pub mod lock;
pub mod logging;

pub use batch::Batch;
pub use codex_types::{Compression, Error, ErrorKind, MutationOp, MutationRequest, Options, OptionsBuilder};
pub use logging::{Level, NoopSink, Sink};
#[cfg(feature = "tracing")]
pub use logging::TracingSink;

use engine::{Engine, LedgerEngine, SnapshotEngine};
use logging::{log_info, log_warn, Logger};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which persistence engine a [`Store`] is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Whole-map serialization on every persist.
    Snapshot,
    /// Append-only mutation log, replayed on open.
    Ledger,
}

/// Read-only, no-I/O snapshot of store state, returned by
/// [`Store::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of keys currently in the in-memory map.
    pub key_count: usize,
    /// Which engine this store is backed by.
    pub engine_kind: EngineKind,
    /// Number of rotating backups configured (snapshot mode only;
    /// always `0` in ledger mode).
    pub backup_count: u32,
}

#[cfg(unix)]
fn ensure_parent_dir(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_parent_dir(path: &Path) -> Result<(), Error> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// The store façade: an in-memory map backed by a durable engine,
/// synchronized by three locks acquired in a fixed order —
/// `data_lock`, then `backup_lock`, then `io_lock` — to avoid
/// deadlock. `data_lock` is held only for in-memory mutation;
/// durable I/O never runs while it's held.
pub struct Store {
    data: RwLock<HashMap<String, Vec<u8>>>,
    options: Options,
    /// Doubles as the I/O lock: holding it for the duration of a
    /// `persist`/`persist_batch`/`close` call is exactly what
    /// serializes durable engine I/O across threads.
    engine: Mutex<Box<dyn Engine>>,
    backup_lock: Mutex<()>,
    logger: Logger,
}

impl Store {
    /// Opens (creating if absent) the store at `path` under `options`,
    /// loading any existing data. Applies the §3 option invariants,
    /// creates parent directories (mode 0755) as needed, and acquires
    /// the single-writer advisory lock.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for an invalid option combination,
    /// a `Concurrency` error if another process already holds the
    /// lock, or an `Io`/`Encryption`/`Integrity` error surfaced while
    /// loading existing data.
    pub fn open(path: impl AsRef<Path>, options: Options) -> Result<Self, Error> {
        Self::open_with_sink(path, options, Arc::new(NoopSink))
    }

    /// As [`Store::open`], additionally routing log events to `sink`
    /// instead of discarding them.
    ///
    /// # Errors
    ///
    /// See [`Store::open`].
    pub fn open_with_sink(
        path: impl AsRef<Path>,
        mut options: Options,
        sink: Arc<dyn Sink>,
    ) -> Result<Self, Error> {
        options.path = PathBuf::from(path.as_ref());
        options.validate()?;
        ensure_parent_dir(&options.path)?;

        let logger = Logger(sink);
        let mut engine: Box<dyn Engine> = if options.ledger_mode {
            Box::new(LedgerEngine::open(options.clone())?)
        } else {
            Box::new(SnapshotEngine::open(options.clone())?)
        };
        let data = engine.load()?;
        log_info!(
            logger,
            "opened store at {} ({} keys, {})",
            options.path.display(),
            data.len(),
            if options.ledger_mode { "ledger" } else { "snapshot" }
        );

        Ok(Self {
            data: RwLock::new(data),
            options,
            engine: Mutex::new(engine),
            backup_lock: Mutex::new(()),
            logger,
        })
    }

    fn is_snapshot(&self) -> bool {
        !self.options.ledger_mode
    }

    /// Applies one mutation to the in-memory map and issues exactly
    /// one durable-write call for it.
    fn apply_and_persist(&self, req: MutationRequest) -> Result<(), Error> {
        let snapshot_data = {
            let mut data = self.data.write();
            engine::apply_mutation(&mut data, &req);
            if self.is_snapshot() {
                Some(data.clone())
            } else {
                None
            }
        };

        let mut engine = self.engine.lock();
        if self.is_snapshot() && self.options.num_backups > 0 {
            let _guard = self.backup_lock.lock();
            backup::rotate(&self.options.path, self.options.num_backups)?;
        }

        match snapshot_data {
            Some(map) => engine.persist(&MutationRequest::snapshot(map)),
            None => engine.persist(&req),
        }
    }

    /// Applies a full batch of operations to the in-memory map under
    /// one critical section, then issues one durable-write call
    /// covering the whole batch.
    pub(crate) fn execute_batch(&self, reqs: Vec<MutationRequest>) -> Result<(), Error> {
        let snapshot_data = {
            let mut data = self.data.write();
            for req in &reqs {
                engine::apply_mutation(&mut data, req);
            }
            if self.is_snapshot() {
                Some(data.clone())
            } else {
                None
            }
        };

        let mut engine = self.engine.lock();
        if self.is_snapshot() && self.options.num_backups > 0 {
            let _guard = self.backup_lock.lock();
            backup::rotate(&self.options.path, self.options.num_backups)?;
        }

        match snapshot_data {
            Some(map) => engine.persist(&MutationRequest::snapshot(map)),
            None => engine.persist_batch(&reqs),
        }
    }

    /// Marshals `value` with the default JSON codec and durably
    /// stores it under `key`, inserting or overwriting.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if `value` cannot be serialized
    /// (the only failure path before any disk I/O is attempted), or
    /// an `Io`/`Encryption` error from the durable-write pipeline.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(value)?;
        self.apply_and_persist(MutationRequest::set(key, bytes))
    }

    /// Reads and unmarshals the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if `key` is absent, or a
    /// `Validation` error if the stored bytes don't deserialize as
    /// `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, Error> {
        let data = self.data.read();
        let bytes = data.get(key).ok_or_else(|| Error::not_found(key))?;
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Removes `key` if present. A no-op, not an error, if absent.
    ///
    /// # Errors
    ///
    /// Propagates durable-write failures.
    pub fn delete(&self, key: &str) -> Result<(), Error> {
        self.apply_and_persist(MutationRequest::delete(key))
    }

    /// Removes every key.
    ///
    /// # Errors
    ///
    /// Propagates durable-write failures.
    pub fn clear(&self) -> Result<(), Error> {
        self.apply_and_persist(MutationRequest::clear())
    }

    /// Whether `key` is currently present. No I/O; a shared read of
    /// the in-memory map only.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// All keys currently present, in unspecified order. No I/O.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Releases the advisory lock and closes the underlying file
    /// handle(s). Calling `close` twice is an error, not a corruption:
    /// the second call returns a `Concurrency` error and leaves state
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns a `Concurrency` error if already closed.
    pub fn close(&self) -> Result<(), Error> {
        let _data_guard = self.data.write();
        let mut engine = self.engine.lock();
        let result = engine.close();
        if result.is_err() {
            log_warn!(self.logger, "close called on an already-closed store");
        } else {
            log_info!(self.logger, "closed store at {}", self.options.path.display());
        }
        result
    }

    /// Starts a new, empty [`Batch`] bound to this store.
    #[must_use]
    pub fn new_batch(&self) -> Batch<'_> {
        Batch::new(self)
    }

    /// Convenience: marshals and sets every entry in `items` as a
    /// single durable batch.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if any value fails to serialize,
    /// or propagates durable-write failures.
    pub fn batch_set<T: Serialize>(&self, items: &HashMap<String, T>) -> Result<(), Error> {
        if items.is_empty() {
            return Ok(());
        }
        let batch = self.new_batch();
        for (key, value) in items {
            batch.set(key, value)?;
        }
        batch.execute()
    }

    /// Convenience: reads and unmarshals every key in `keys`,
    /// silently omitting keys that are absent.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if a present key's bytes don't
    /// deserialize as `T`.
    pub fn batch_get<T: DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, T>, Error> {
        let data = self.data.read();
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = data.get(key) {
                out.insert(key.clone(), serde_json::from_slice(bytes)?);
            }
        }
        Ok(out)
    }

    /// Convenience: deletes every key in `keys` as a single durable
    /// batch. Keys that are absent are no-ops.
    ///
    /// # Errors
    ///
    /// Propagates durable-write failures.
    pub fn batch_delete(&self, keys: &[String]) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        let batch = self.new_batch();
        for key in keys {
            batch.delete(key.clone());
        }
        batch.execute()
    }

    /// A read-only, no-I/O snapshot of store state.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            key_count: self.data.read().len(),
            engine_kind: if self.options.ledger_mode {
                EngineKind::Ledger
            } else {
                EngineKind::Snapshot
            },
            backup_count: if self.is_snapshot() {
                self.options.num_backups
            } else {
                0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        {
            let store = Store::open(&path, Options::default()).unwrap();
            store.set("k", &"v").unwrap();
            store.close().unwrap();
        }
        let store = Store::open(&path, Options::default()).unwrap();
        assert_eq!(store.get::<String>("k").unwrap(), "v");
    }

    #[test]
    fn encryption_with_wrong_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let key_a = vec![1u8; 32];
        let key_b = vec![2u8; 32];
        {
            let opts = Options {
                encryption_key: Some(key_a),
                ..Options::default()
            };
            let store = Store::open(&path, opts).unwrap();
            store.set("s", &"x").unwrap();
            store.close().unwrap();
        }
        let opts_b = Options {
            encryption_key: Some(key_b),
            ..Options::default()
        };
        let err = Store::open(&path, opts_b).unwrap_err();
        assert!(err.is(ErrorKind::Encryption));
    }

    #[test]
    fn ledger_replay_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let opts = Options {
            ledger_mode: true,
            ..Options::default()
        };
        {
            let store = Store::open(&path, opts.clone()).unwrap();
            store.set("a", &1).unwrap();
            store.set("b", &2).unwrap();
            store.set("a", &3).unwrap();
            store.delete("b").unwrap();
            store.close().unwrap();
        }
        let store = Store::open(&path, opts).unwrap();
        assert_eq!(store.get::<i32>("a").unwrap(), 3);
        assert!(!store.has("b"));
        assert_eq!(store.keys(), vec!["a".to_string()]);
    }

    #[test]
    fn second_open_on_same_path_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let _store = Store::open(&path, Options::default()).unwrap();
        let err = Store::open(&path, Options::default()).unwrap_err();
        assert!(err.is(ErrorKind::Concurrency));
    }

    #[test]
    fn double_close_errors_without_corrupting_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let store = Store::open(&path, Options::default()).unwrap();
        store.set("k", &"v").unwrap();
        store.close().unwrap();
        assert!(store.close().is_err());
    }

    #[test]
    fn clear_empties_snapshot_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let store = Store::open(&path, Options::default()).unwrap();
        store.set("a", &1).unwrap();
        store.set("b", &2).unwrap();
        store.clear().unwrap();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn backup_rotation_keeps_n_most_recent_states() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let opts = Options {
            num_backups: 3,
            ..Options::default()
        };
        let store = Store::open(&path, opts).unwrap();
        for i in 1..=5 {
            store.set("k", &i).unwrap();
        }
        assert_eq!(store.get::<i32>("k").unwrap(), 5);
        let mut bak1 = path.clone().into_os_string();
        bak1.push(".bak.1");
        assert!(std::path::PathBuf::from(bak1).exists());
    }

    #[test]
    fn stats_reports_key_count_and_engine_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let store = Store::open(&path, Options::default()).unwrap();
        store.set("a", &1).unwrap();
        let stats = store.stats();
        assert_eq!(stats.key_count, 1);
        assert_eq!(stats.engine_kind, EngineKind::Snapshot);
    }

    #[test]
    fn batch_convenience_helpers_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let store = Store::open(&path, Options::default()).unwrap();

        let mut items = HashMap::new();
        items.insert("a".to_string(), 1);
        items.insert("b".to_string(), 2);
        store.batch_set(&items).unwrap();

        let got: HashMap<String, i32> = store
            .batch_get(&["a".to_string(), "b".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got.get("a"), Some(&1));

        store.batch_delete(&["a".to_string()]).unwrap();
        assert!(!store.has("a"));
        assert!(store.has("b"));
    }

    #[test]
    fn unicode_and_unusual_keys_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let store = Store::open(&path, Options::default()).unwrap();
        let keys = [
            "",
            "simple",
            "has/slash",
            "has:colon",
            "has space",
            "has\ttab",
            "has\nnewline",
            "\u{1F600}emoji",
            &"x".repeat(10_000),
        ];
        for key in keys {
            store.set(key, &key.len()).unwrap();
        }
        for key in keys {
            assert_eq!(store.get::<usize>(key).unwrap(), key.len());
        }
    }

    #[test]
    fn large_value_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let store = Store::open(&path, Options::default()).unwrap();
        let big = "x".repeat(1024 * 1024);
        store.set("big", &big).unwrap();
        assert_eq!(store.get::<String>("big").unwrap(), big);
    }
}
