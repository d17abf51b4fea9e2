use codex_types::{Compression, Error, ErrorKind};
use std::io::{Read, Write};

/// Observed efficiency of a compression pass. Not persisted; purely
/// informational for callers and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    /// `original_len / compressed_len`, or `0.0` when `compressed_len == 0`.
    pub ratio: f64,
    /// `(1 - compressed_len / original_len) * 100`, or `0.0` when `original_len == 0`.
    pub savings_pct: f64,
}

/// Computes [`Metrics`] for a compression pass.
#[must_use]
pub fn metrics(original_len: usize, compressed_len: usize) -> Metrics {
    let ratio = if compressed_len == 0 {
        0.0
    } else {
        original_len as f64 / compressed_len as f64
    };
    let savings_pct = if original_len == 0 {
        0.0
    } else {
        (1.0 - compressed_len as f64 / original_len as f64) * 100.0
    };
    Metrics { ratio, savings_pct }
}

fn clamp_level(algo: Compression, level: i32) -> i32 {
    match algo {
        Compression::None | Compression::Snappy => 0,
        Compression::Gzip => {
            if (0..=9).contains(&level) {
                level
            } else {
                6
            }
        }
        Compression::Zstd => {
            if (1..=22).contains(&level) {
                level
            } else {
                3
            }
        }
    }
}

/// Compresses `input` under `algo`/`level`, framed as
/// `[algo_id: u8][level: u8][body]`. Empty input returns empty output
/// with no header.
///
/// # Errors
///
/// Returns an `Io` error if the underlying compressor fails.
pub fn compress(algo: Compression, level: i32, input: &[u8]) -> Result<Vec<u8>, Error> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let level = clamp_level(algo, level);
    let body = match algo {
        Compression::None => input.to_vec(),
        Compression::Gzip => {
            let mut enc = flate2::write::GzEncoder::new(
                Vec::new(),
                flate2::Compression::new(level as u32),
            );
            enc.write_all(input)
                .map_err(|e| Error::new(ErrorKind::Io, e.to_string()).with_cause(e))?;
            enc.finish()
                .map_err(|e| Error::new(ErrorKind::Io, e.to_string()).with_cause(e))?
        }
        Compression::Zstd => zstd::stream::encode_all(input, level)
            .map_err(|e| Error::new(ErrorKind::Io, e.to_string()).with_cause(e))?,
        Compression::Snappy => {
            let mut encoder = snap::write::FrameEncoder::new(Vec::new());
            encoder
                .write_all(input)
                .map_err(|e| Error::new(ErrorKind::Io, e.to_string()).with_cause(e))?;
            encoder
                .into_inner()
                .map_err(|e| Error::new(ErrorKind::Io, e.to_string()))?
        }
    };

    let mut out = Vec::with_capacity(2 + body.len());
    out.push(algo.algo_id());
    out.push(level as u8);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decompresses bytes produced by [`compress`]. Input of 0 or 1 bytes
/// is passed through unchanged. An unrecognized algorithm identifier
/// is an error.
///
/// # Errors
///
/// Returns an `Io` error if the framed algorithm is unrecognized or
/// the body fails to decompress.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, Error> {
    if input.len() <= 1 {
        return Ok(input.to_vec());
    }
    let algo_id = input[0];
    let body = &input[2..];
    let algo = Compression::from_algo_id(algo_id)
        .ok_or_else(|| Error::new(ErrorKind::Io, format!("unknown compression algo id: {algo_id}")))?;

    match algo {
        Compression::None => Ok(body.to_vec()),
        Compression::Gzip => {
            let mut dec = flate2::read::GzDecoder::new(body);
            let mut out = Vec::new();
            dec.read_to_end(&mut out)
                .map_err(|e| Error::new(ErrorKind::Io, e.to_string()).with_cause(e))?;
            Ok(out)
        }
        Compression::Zstd => zstd::stream::decode_all(body)
            .map_err(|e| Error::new(ErrorKind::Io, e.to_string()).with_cause(e)),
        Compression::Snappy => {
            let mut decoder = snap::read::FrameDecoder::new(body);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::new(ErrorKind::Io, e.to_string()).with_cause(e))?;
            Ok(out)
        }
    }
}
