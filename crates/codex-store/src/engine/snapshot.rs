//! Whole-map serialization on each persist. The sidecar lock file is
//! distinct from the data file precisely so that the atomic rename
//! replacing the data file never drops the advisory lock held on the
//! sidecar's own, never-renamed, file descriptor.

use super::Engine;
use crate::atomic;
use crate::lock::FileLock;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use codex_types::{Error, ErrorKind, MutationRequest, Options};
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Full-map-per-persist engine with a `<path>.lock` sidecar.
pub struct SnapshotEngine {
    options: Options,
    lock: Option<FileLock>,
}

/// Path of the sidecar advisory-lock file for `path`.
#[must_use]
pub fn lock_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".lock");
    PathBuf::from(s)
}

impl SnapshotEngine {
    /// Opens (creating if absent) the sidecar lock file and acquires
    /// the exclusive advisory lock for the lifetime of this engine.
    ///
    /// # Errors
    ///
    /// Returns a `Concurrency` error if another process already holds
    /// the lock.
    pub fn open(options: Options) -> Result<Self, Error> {
        let lock_file_path = lock_path(&options.path);
        if let Some(dir) = lock_file_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        #[cfg(unix)]
        let mut opts = OpenOptions::new();
        #[cfg(unix)]
        opts.read(true).write(true).create(true).mode(0o600);
        #[cfg(not(unix))]
        let mut opts = {
            let mut o = OpenOptions::new();
            o.read(true).write(true).create(true);
            o
        };

        let file = opts.open(&lock_file_path)?;
        let lock = FileLock::acquire(file)?;

        Ok(Self {
            options,
            lock: Some(lock),
        })
    }

    fn decode_map(&self, bytes: &[u8]) -> Result<HashMap<String, Vec<u8>>, Error> {
        let decrypted = match &self.options.encryption_key {
            Some(key) => codex_crypto::decrypt(key, bytes)?,
            None => bytes.to_vec(),
        };
        let decompressed = codex_codec::decompress(&decrypted)?;
        let verified = codex_codec::verify(&decompressed)?;
        let obj: BTreeMap<String, String> = serde_json::from_slice(&verified)?;

        let mut map = HashMap::with_capacity(obj.len());
        for (k, v) in obj {
            let bytes = B64.decode(v.as_bytes()).map_err(|e| {
                Error::new(ErrorKind::Integrity, format!("invalid base64 value: {e}"))
            })?;
            map.insert(k, bytes);
        }
        Ok(map)
    }

    fn encode_map(&self, map: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, Error> {
        let obj: BTreeMap<String, String> = map
            .iter()
            .map(|(k, v)| (k.clone(), B64.encode(v)))
            .collect();
        let json = serde_json::to_vec(&obj)?;
        let enveloped = codex_codec::sign(&json)?;
        let compressed = codex_codec::compress(
            self.options.compression,
            self.options.compression_level,
            &enveloped,
        )?;
        match &self.options.encryption_key {
            Some(key) => codex_crypto::encrypt(key, &compressed),
            None => Ok(compressed),
        }
    }

    /// Serializes and durably writes `map` as the complete file
    /// content.
    ///
    /// # Errors
    ///
    /// Propagates IO, compression, or encryption failures.
    pub fn persist_map(&self, map: &HashMap<String, Vec<u8>>) -> Result<(), Error> {
        let bytes = self.encode_map(map)?;
        atomic::write(&self.options.path, &bytes, 0o600)
    }
}

impl Engine for SnapshotEngine {
    fn load(&mut self) -> Result<HashMap<String, Vec<u8>>, Error> {
        match std::fs::read(&self.options.path) {
            Ok(bytes) => self.decode_map(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&mut self, req: &MutationRequest) -> Result<(), Error> {
        let empty = HashMap::new();
        let map = req.data.as_ref().unwrap_or(&empty);
        self.persist_map(map)
    }

    fn persist_batch(&mut self, reqs: &[MutationRequest]) -> Result<(), Error> {
        // Take the LAST request whose `data` is set; an empty batch
        // is a no-op.
        if let Some(req) = reqs.iter().rev().find(|r| r.data.is_some()) {
            self.persist(req)
        } else {
            Ok(())
        }
    }

    fn close(&mut self) -> Result<(), Error> {
        match self.lock.take() {
            Some(lock) => lock.release(),
            None => Err(Error::new(ErrorKind::Concurrency, "store already closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_types::Compression;

    fn opts(path: PathBuf) -> Options {
        Options {
            path,
            ..Options::default()
        }
    }

    #[test]
    fn round_trips_through_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let mut engine = SnapshotEngine::open(opts(path)).unwrap();

        let mut map = HashMap::new();
        map.insert("k".to_string(), b"v".to_vec());
        engine.persist_map(&map).unwrap();

        let loaded = engine.load().unwrap();
        assert_eq!(loaded.get("k"), Some(&b"v".to_vec()));
    }

    #[test]
    fn load_missing_file_is_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let mut engine = SnapshotEngine::open(opts(path)).unwrap();
        assert!(engine.load().unwrap().is_empty());
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let _e1 = SnapshotEngine::open(opts(path.clone())).unwrap();
        let e2 = SnapshotEngine::open(opts(path));
        assert!(e2.unwrap_err().is(ErrorKind::Concurrency));
    }

    #[test]
    fn with_compression_and_encryption_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let options = Options {
            path,
            encryption_key: Some(vec![9u8; 32]),
            compression: Compression::Zstd,
            compression_level: 3,
            ..Options::default()
        };
        let mut engine = SnapshotEngine::open(options).unwrap();
        let mut map = HashMap::new();
        map.insert("secret".to_string(), b"shh".to_vec());
        engine.persist_map(&map).unwrap();
        let loaded = engine.load().unwrap();
        assert_eq!(loaded.get("secret"), Some(&b"shh".to_vec()));
    }

    #[test]
    fn persist_batch_keeps_last_data_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let mut engine = SnapshotEngine::open(opts(path)).unwrap();

        let mut first = HashMap::new();
        first.insert("a".to_string(), b"1".to_vec());
        let mut last = HashMap::new();
        last.insert("b".to_string(), b"2".to_vec());

        let reqs = vec![MutationRequest::snapshot(first), MutationRequest::snapshot(last)];
        engine.persist_batch(&reqs).unwrap();

        let loaded = engine.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("b"), Some(&b"2".to_vec()));
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let mut engine = SnapshotEngine::open(opts(path.clone())).unwrap();
        engine.persist_batch(&[]).unwrap();
        assert!(!path.exists());
    }
}
