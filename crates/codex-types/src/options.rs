use crate::error::{Error, ErrorKind};
use std::path::PathBuf;

/// Block compression algorithm applied to persisted bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression; bytes pass through verbatim.
    #[default]
    None,
    /// DEFLATE via gzip framing.
    Gzip,
    /// Zstandard.
    Zstd,
    /// Snappy.
    Snappy,
}

impl Compression {
    /// The 1-byte on-disk algorithm identifier (see codex-codec framing).
    #[must_use]
    pub const fn algo_id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
            Self::Zstd => 2,
            Self::Snappy => 3,
        }
    }

    /// Recovers a [`Compression`] from its on-disk identifier.
    #[must_use]
    pub const fn from_algo_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::Gzip),
            2 => Some(Self::Zstd),
            3 => Some(Self::Snappy),
            _ => None,
        }
    }
}

/// Store configuration, validated at [`Options::validate`] and
/// enforced by `Store::open`.
#[derive(Debug, Clone)]
pub struct Options {
    /// Path to the single data file.
    pub path: PathBuf,
    /// Optional AEAD key, 16/24/32 bytes. Mutually exclusive with
    /// `ledger_mode` in this version.
    pub encryption_key: Option<Vec<u8>>,
    /// Ledger (append-only) mode vs. snapshot (whole-map) mode.
    pub ledger_mode: bool,
    /// Number of rotating backups kept in snapshot mode. Ignored in
    /// ledger mode.
    pub num_backups: u32,
    /// Block compression algorithm.
    pub compression: Compression,
    /// Compression level; clamped to the algorithm's valid range by
    /// codex-codec.
    pub compression_level: i32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            encryption_key: None,
            ledger_mode: false,
            num_backups: 0,
            compression: Compression::None,
            compression_level: 0,
        }
    }
}

impl Options {
    /// Starts a fluent builder rooted at `path`.
    #[must_use]
    pub fn builder(path: impl Into<PathBuf>) -> OptionsBuilder {
        OptionsBuilder::new(path)
    }

    /// Validates the option invariants from the data model: ledger
    /// mode and encryption are mutually exclusive, and an encryption
    /// key (if present) must be 16, 24, or 32 bytes.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error describing which invariant was
    /// violated.
    pub fn validate(&self) -> Result<(), Error> {
        if self.ledger_mode && self.encryption_key.is_some() {
            return Err(Error::invalid_key(
                "ledger_mode and encryption_key are mutually exclusive",
            ));
        }
        if let Some(key) = &self.encryption_key {
            if !matches!(key.len(), 16 | 24 | 32) {
                return Err(Error::invalid_key(format!(
                    "invalid key length: {} (must be 16, 24, or 32 bytes)",
                    key.len()
                )));
            }
        }
        Ok(())
    }
}

/// Fluent constructor for [`Options`], mirroring the builder pattern
/// used elsewhere in this workspace for multi-field configuration
/// types.
#[must_use]
pub struct OptionsBuilder {
    inner: Options,
}

impl OptionsBuilder {
    /// Starts a builder with every optional field at its default.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Options {
                path: path.into(),
                ..Options::default()
            },
        }
    }

    /// Sets the AEAD encryption key.
    pub fn encryption_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.inner.encryption_key = Some(key.into());
        self
    }

    /// Switches to ledger (append-only) mode.
    pub fn ledger_mode(mut self, enabled: bool) -> Self {
        self.inner.ledger_mode = enabled;
        self
    }

    /// Sets the number of rotating backups kept in snapshot mode.
    pub fn num_backups(mut self, n: u32) -> Self {
        self.inner.num_backups = n;
        self
    }

    /// Sets the compression algorithm and level.
    pub fn compression(mut self, algo: Compression, level: i32) -> Self {
        self.inner.compression = algo;
        self.inner.compression_level = level;
        self
    }

    /// Validates and returns the built [`Options`].
    ///
    /// # Errors
    ///
    /// Propagates [`Options::validate`].
    pub fn build(self) -> Result<Options, Error> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}
