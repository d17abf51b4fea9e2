#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! Shared types for the codex key-value store: the structured error
//! taxonomy, the store's configuration surface, and the wire-level
//! mutation request types used by the batch planner and the ledger.

mod error;
mod options;
mod request;

pub use error::{Error, ErrorKind};
pub use options::{Compression, Options, OptionsBuilder};
pub use request::{MutationOp, MutationRequest};

/// Convenience alias for fallible results in this workspace.
pub type Result<T> = std::result::Result<T, Error>;
