#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! Framed block compression (`none`/`gzip`/`zstd`/`snappy`) and the
//! JSON integrity envelope used to wrap snapshot payloads before
//! compression and encryption.

mod compress;
mod envelope;

pub use compress::{compress, decompress, metrics, Metrics};
pub use envelope::{sign, verify};
