use codex_crypto::sha256_hex;
use codex_types::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize)]
struct Envelope {
    checksum: String,
    data: Value,
}

/// Wraps `data` (already-serialized JSON bytes of the snapshot map) in
/// a `{ checksum, data }` integrity envelope, returning the envelope
/// serialized as UTF-8 JSON bytes.
///
/// `checksum` is the hex SHA-256 of `data`'s canonical (compact,
/// key-stable) serialization.
///
/// # Errors
///
/// Returns a `Validation` error if `data` is not valid JSON.
pub fn sign(data: &[u8]) -> Result<Vec<u8>, Error> {
    let value: Value = serde_json::from_slice(data)?;
    let compact = serde_json::to_vec(&value)?;
    let envelope = Envelope {
        checksum: sha256_hex(&compact),
        data: value,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Verifies an envelope produced by [`sign`], returning the inner
/// `data` as compact JSON bytes.
///
/// If `file_bytes` does not parse as the `{ checksum, data }` shape,
/// or either field is absent/empty, the bytes are returned unchanged
/// (legacy, pre-envelope snapshot format).
///
/// # Errors
///
/// Returns an `Integrity` error if the envelope parses but the
/// recomputed checksum does not match.
pub fn verify(file_bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let Ok(parsed) = serde_json::from_slice::<Value>(file_bytes) else {
        return Ok(file_bytes.to_vec());
    };
    let Some(obj) = parsed.as_object() else {
        return Ok(file_bytes.to_vec());
    };
    let checksum = obj.get("checksum").and_then(Value::as_str);
    let data = obj.get("data");

    let (checksum, data) = match (checksum, data) {
        (Some(c), Some(d)) if !c.is_empty() && !d.is_null() => (c, d),
        _ => return Ok(file_bytes.to_vec()),
    };

    let compact = serde_json::to_vec(data)?;
    let recomputed = sha256_hex(&compact);
    if recomputed != checksum {
        return Err(Error::new(
            ErrorKind::Integrity,
            "snapshot checksum mismatch",
        ));
    }
    Ok(compact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sign_then_verify_round_trips_data() {
        let data = serde_json::to_vec(&json!({"a": "1", "b": "2"})).unwrap();
        let envelope = sign(&data).unwrap();
        let recovered = verify(&envelope).unwrap();
        let recovered_value: Value = serde_json::from_slice(&recovered).unwrap();
        let original_value: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(recovered_value, original_value);
    }

    #[test]
    fn tampered_data_fails_verification() {
        let data = serde_json::to_vec(&json!({"a": "1"})).unwrap();
        let mut envelope: Value = serde_json::from_slice(&sign(&data).unwrap()).unwrap();
        envelope["data"]["a"] = json!("TAMPERED");
        let bytes = serde_json::to_vec(&envelope).unwrap();
        assert!(verify(&bytes).is_err());
    }

    #[test]
    fn legacy_raw_json_passes_through() {
        let raw = br#"{"k1":"dGVzdA=="}"#;
        let recovered = verify(raw).unwrap();
        let recovered_value: Value = serde_json::from_slice(&recovered).unwrap();
        let raw_value: Value = serde_json::from_slice(raw).unwrap();
        assert_eq!(recovered_value, raw_value);
    }

    #[test]
    fn empty_checksum_field_is_legacy() {
        let raw = br#"{"checksum":"","data":{"k":"v"}}"#;
        let recovered = verify(raw).unwrap();
        assert_eq!(recovered, raw.to_vec());
    }

    #[test]
    fn non_json_bytes_pass_through() {
        let raw = b"not json at all";
        assert_eq!(verify(raw).unwrap(), raw.to_vec());
    }
}
