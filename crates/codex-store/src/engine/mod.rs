//! The two pluggable persistence strategies. Both implement [`Engine`]
//! so the store façade can route to whichever was selected by
//! `Options::ledger_mode` without branching on the mode anywhere else.

mod ledger;
mod snapshot;

pub use ledger::LedgerEngine;
pub use snapshot::SnapshotEngine;

use codex_types::{Error, MutationRequest};
use std::collections::HashMap;

/// Common contract for the snapshot and ledger persistence engines.
pub trait Engine: Send {
    /// Reads and replays the on-disk state into an in-memory map.
    ///
    /// # Errors
    ///
    /// Propagates IO, integrity, or decryption failures.
    fn load(&mut self) -> Result<HashMap<String, Vec<u8>>, Error>;

    /// Durably persists a single mutation request.
    ///
    /// # Errors
    ///
    /// Propagates IO, compression, or encryption failures.
    fn persist(&mut self, req: &MutationRequest) -> Result<(), Error>;

    /// Durably persists a batch of requests as one write/fsync unit.
    ///
    /// # Errors
    ///
    /// Propagates IO, compression, or encryption failures.
    fn persist_batch(&mut self, reqs: &[MutationRequest]) -> Result<(), Error>;

    /// Releases the advisory lock and closes the underlying file
    /// handle(s).
    ///
    /// # Errors
    ///
    /// Returns a `Concurrency` error if already closed.
    fn close(&mut self) -> Result<(), Error>;
}

pub(crate) fn apply_mutation(map: &mut HashMap<String, Vec<u8>>, req: &MutationRequest) {
    use codex_types::MutationOp;
    match req.op {
        MutationOp::Set => {
            if let (Some(key), Some(value)) = (&req.key, &req.value) {
                map.insert(key.clone(), value.clone());
            }
        }
        MutationOp::Delete => {
            if let Some(key) = &req.key {
                map.remove(key);
            }
        }
        MutationOp::Clear => map.clear(),
    }
}
