use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of mutation carried by a [`MutationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    /// Insert or overwrite `key` with `value`.
    Set,
    /// Remove `key` if present.
    Delete,
    /// Remove every key.
    Clear,
}

/// A single durable-write request passed from the store façade to an
/// engine's `persist`/`persist_batch`.
///
/// `key`/`value` carry a ledger-mode entry; `data`, when present,
/// carries the full in-memory map for a snapshot-mode persist. Per
/// the snapshot engine's batch contract, when several requests are
/// folded into one `persist_batch` call, the *last* request whose
/// `data` is `Some` wins and the rest are discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationRequest {
    /// The operation this request represents.
    pub op: MutationOp,
    /// Key affected by `Set`/`Delete`. `None` for `Clear`.
    pub key: Option<String>,
    /// Value for `Set`. `None` for `Delete`/`Clear`.
    pub value: Option<Vec<u8>>,
    /// Full map snapshot, set only for snapshot-mode persists.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<HashMap<String, Vec<u8>>>,
}

impl MutationRequest {
    /// Builds a ledger-mode `set` request.
    #[must_use]
    pub fn set(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            op: MutationOp::Set,
            key: Some(key.into()),
            value: Some(value),
            data: None,
        }
    }

    /// Builds a ledger-mode `delete` request.
    #[must_use]
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            op: MutationOp::Delete,
            key: Some(key.into()),
            value: None,
            data: None,
        }
    }

    /// Builds a `clear` request.
    #[must_use]
    pub fn clear() -> Self {
        Self {
            op: MutationOp::Clear,
            key: None,
            value: None,
            data: None,
        }
    }

    /// Builds a snapshot-mode persist request carrying the full map.
    #[must_use]
    pub fn snapshot(data: HashMap<String, Vec<u8>>) -> Self {
        Self {
            op: MutationOp::Set,
            key: None,
            value: None,
            data: Some(data),
        }
    }
}
