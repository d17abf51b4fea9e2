#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! AEAD encryption (AES-GCM, 128/192/256-bit keys) and SHA-256
//! checksum helpers used by the codex persistence pipeline.

use aes_gcm::aead::{generic_array::typenum::U12, Aead, KeyInit, OsRng};
use aes_gcm::aes::Aes192;
use aes_gcm::{AeadCore, Aes128Gcm, Aes256Gcm, AesGcm, Key, Nonce};
use codex_types::{Error, ErrorKind};
use sha2::{Digest, Sha256};

/// AES-192-GCM, assembled from the generic `AesGcm` construction since
/// the `aes-gcm` crate only type-aliases the 128/256-bit variants.
type Aes192Gcm = AesGcm<Aes192, U12>;

/// Nonce length in bytes, prepended to every ciphertext.
pub const NONCE_LEN: usize = 12;

/// Encrypts `plaintext` under `key` (16, 24, or 32 bytes), returning
/// `[nonce(12) || ciphertext+tag]`. A fresh random nonce is drawn for
/// every call.
///
/// # Errors
///
/// Returns an `Encryption` error if `key` is not 16, 24, or 32 bytes,
/// or if the underlying cipher rejects the input.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ct = match key.len() {
        16 => {
            let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));
            cipher.encrypt(&nonce, plaintext)
        }
        24 => {
            let cipher = Aes192Gcm::new(Key::<Aes192Gcm>::from_slice(key));
            cipher.encrypt(&nonce, plaintext)
        }
        32 => {
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
            cipher.encrypt(&nonce, plaintext)
        }
        other => {
            return Err(Error::new(
                ErrorKind::Encryption,
                format!("invalid key length: {other} (must be 16, 24, or 32 bytes)"),
            ))
        }
    }
    .map_err(|_| Error::new(ErrorKind::Encryption, "encryption failed"))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Decrypts bytes produced by [`encrypt`] under `key`. Any tamper —
/// to the nonce, ciphertext, or authentication tag — fails with an
/// `Encryption` error.
///
/// # Errors
///
/// Returns an `Encryption` error if `key` is not 16/24/32 bytes, if
/// `data` is shorter than the nonce, or if authentication fails.
pub fn decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.len() < NONCE_LEN {
        return Err(Error::new(
            ErrorKind::Encryption,
            "ciphertext shorter than nonce",
        ));
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let nonce = Nonce::<U12>::from_slice(nonce_bytes);

    let pt = match key.len() {
        16 => {
            let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));
            cipher.decrypt(nonce, ciphertext)
        }
        24 => {
            let cipher = Aes192Gcm::new(Key::<Aes192Gcm>::from_slice(key));
            cipher.decrypt(nonce, ciphertext)
        }
        32 => {
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
            cipher.decrypt(nonce, ciphertext)
        }
        other => {
            return Err(Error::new(
                ErrorKind::Encryption,
                format!("invalid key length: {other} (must be 16, 24, or 32 bytes)"),
            ))
        }
    }
    .map_err(|_| Error::new(ErrorKind::Encryption, "decryption failed: authentication error"))?;

    Ok(pt)
}

/// SHA-256 of `data`, returned as raw 32 bytes.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&out);
    bytes
}

/// SHA-256 of `data`, hex-encoded (lowercase, no prefix).
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
