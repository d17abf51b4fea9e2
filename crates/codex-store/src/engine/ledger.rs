//! Append-only mutation log with per-entry checksums. Corruption
//! found while replaying the tail is self-healing: the file is
//! truncated at the last successfully-applied frame and the store
//! opens with whatever prefix survived, per the ledger's self-healing
//! contract.

use super::{apply_mutation, Engine};
use crate::lock::FileLock;
use codex_types::{Error, ErrorKind, MutationRequest, Options};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Bytes of checksum carried by every frame, ahead of the payload.
const CHECKSUM_LEN: usize = 32;
/// Bytes of the big-endian length prefix carried by every frame.
const LEN_PREFIX: usize = 4;

/// Append-only log engine with a lock held directly on the ledger
/// file (no sidecar, unlike the snapshot engine).
pub struct LedgerEngine {
    options: Options,
    file: Option<File>,
    lock: Option<FileLock>,
}

fn open_file(path: &Path) -> Result<File, Error> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    #[cfg(unix)]
    let mut opts = {
        let mut o = OpenOptions::new();
        o.read(true).write(true).create(true).mode(0o600);
        o
    };
    #[cfg(not(unix))]
    let mut opts = {
        let mut o = OpenOptions::new();
        o.read(true).write(true).create(true);
        o
    };

    Ok(opts.open(path)?)
}

impl LedgerEngine {
    /// Opens (creating if absent) the ledger file and acquires the
    /// exclusive advisory lock directly on it.
    ///
    /// # Errors
    ///
    /// Returns a `Concurrency` error if another process already holds
    /// the lock.
    pub fn open(options: Options) -> Result<Self, Error> {
        let file = open_file(&options.path)?;
        let lock = FileLock::acquire(file.try_clone()?)?;
        Ok(Self {
            options,
            file: Some(file),
            lock: Some(lock),
        })
    }

    fn file_mut(&mut self) -> Result<&mut File, Error> {
        self.file
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::Concurrency, "ledger already closed"))
    }

    fn encode_payload(&self, op: &MutationRequest) -> Result<Vec<u8>, Error> {
        let json = serde_json::to_vec(op)?;
        codex_codec::compress(self.options.compression, self.options.compression_level, &json)
    }

    fn frame(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let checksum = codex_crypto::sha256(payload);
        let maybe_encrypted = match &self.options.encryption_key {
            Some(key) => codex_crypto::encrypt(key, payload)?,
            None => payload.to_vec(),
        };
        let length = (CHECKSUM_LEN + maybe_encrypted.len()) as u32;

        let mut out = Vec::with_capacity(LEN_PREFIX + CHECKSUM_LEN + maybe_encrypted.len());
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&checksum);
        out.extend_from_slice(&maybe_encrypted);
        Ok(out)
    }

    fn append_frame(&mut self, req: &MutationRequest) -> Result<(), Error> {
        let payload = self.encode_payload(req)?;
        let frame = self.frame(&payload)?;
        self.file_mut()?.write_all(&frame)?;
        Ok(())
    }
}

/// One successfully-decoded, successfully-applied frame during
/// replay.
struct ReplayedFrame {
    end_offset: u64,
}

/// Fills `buf` from `file`, distinguishing a clean end-of-file (zero
/// bytes available) from a truncated read (1..`buf.len()` bytes
/// available before EOF). The latter is a crash-mid-write, not a
/// clean stop, and must be reported as an error so the caller
/// truncates the stray bytes rather than silently ignoring them.
fn try_read_exact(file: &mut File, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut read_total = 0;
    while read_total < buf.len() {
        match file.read(&mut buf[read_total..])? {
            0 if read_total == 0 => return Ok(false),
            0 => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "truncated ledger frame length prefix",
                ))
            }
            n => read_total += n,
        }
    }
    Ok(true)
}

fn read_frame(
    file: &mut File,
    options: &Options,
) -> Result<Option<(MutationRequest, ReplayedFrame)>, Error> {
    let mut len_buf = [0u8; LEN_PREFIX];
    if !try_read_exact(file, &mut len_buf)? {
        return Ok(None);
    }
    let length = u32::from_be_bytes(len_buf) as usize;
    if length < CHECKSUM_LEN {
        return Err(Error::new(ErrorKind::Integrity, "ledger frame length too short"));
    }

    let mut checksum = [0u8; CHECKSUM_LEN];
    file.read_exact(&mut checksum)?;

    let payload_len = length - CHECKSUM_LEN;
    let mut payload = vec![0u8; payload_len];
    file.read_exact(&mut payload)?;

    let decrypted = match &options.encryption_key {
        Some(key) => codex_crypto::decrypt(key, &payload)?,
        None => payload,
    };
    let actual = codex_crypto::sha256(&decrypted);
    if actual != checksum {
        return Err(Error::new(ErrorKind::Integrity, "ledger checksum mismatch"));
    }

    let decompressed = codex_codec::decompress(&decrypted)?;
    let req: MutationRequest = serde_json::from_slice(&decompressed)?;

    let end_offset = file.stream_position()?;
    Ok(Some((req, ReplayedFrame { end_offset })))
}

impl Engine for LedgerEngine {
    fn load(&mut self) -> Result<HashMap<String, Vec<u8>>, Error> {
        let options = self.options.clone();
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;

        let mut map = HashMap::new();
        let mut last_valid_offset: u64 = 0;

        loop {
            match read_frame(file, &options) {
                Ok(Some((req, replayed))) => {
                    apply_mutation(&mut map, &req);
                    last_valid_offset = replayed.end_offset;
                }
                Ok(None) => break,
                Err(_) => {
                    file.set_len(last_valid_offset)?;
                    file.seek(SeekFrom::Start(last_valid_offset))?;
                    break;
                }
            }
        }

        file.seek(SeekFrom::End(0))?;
        Ok(map)
    }

    fn persist(&mut self, req: &MutationRequest) -> Result<(), Error> {
        self.append_frame(req)?;
        self.file_mut()?.sync_all()?;
        Ok(())
    }

    fn persist_batch(&mut self, reqs: &[MutationRequest]) -> Result<(), Error> {
        for req in reqs {
            self.append_frame(req)?;
        }
        self.file_mut()?.sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.file = None;
        match self.lock.take() {
            Some(lock) => lock.release(),
            None => Err(Error::new(ErrorKind::Concurrency, "ledger already closed")),
        }
    }
}
