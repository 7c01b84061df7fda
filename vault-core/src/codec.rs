//! Chunk payload codec: `[u64 LE original_size][zstd frame]`. The content
//! address (see [`crate::hash`]) is computed over this whole buffer, so the
//! compressor must be deterministic for a given input — no multithreaded
//! encoding, a fixed level.

use std::io::Write;

use crate::error::{Result, VaultError};

/// Fixed level so identical plaintexts always produce identical compressed
/// bytes (and therefore identical chunk addresses).
const ZSTD_LEVEL: i32 = 3;

/// Compresses `payload` and prepends its uncompressed length. The returned
/// buffer is what gets hashed for the chunk's content address and is exactly
/// what gets written to `chunks/<hh>/<hash>.chunk`.
pub fn encode_chunk(payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(payload.len() / 2 + 16);
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    let mut encoder = zstd::stream::Encoder::new(&mut out, ZSTD_LEVEL)
        .map_err(|e| VaultError::Compression(e.to_string()))?;
    encoder
        .write_all(payload)
        .map_err(|e| VaultError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| VaultError::Compression(e.to_string()))?;
    Ok(out)
}

/// Reverses [`encode_chunk`]: reads the 8-byte original-size prefix,
/// decompresses the remainder, and checks the decoded length against it.
pub fn decode_chunk(buf: &[u8]) -> Result<Vec<u8>> {
    if buf.len() < 8 {
        return Err(VaultError::Decompression(
            "chunk buffer shorter than size prefix".into(),
        ));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&buf[..8]);
    let expected = u64::from_le_bytes(len_bytes);

    let decoded = zstd::stream::decode_all(&buf[8..])
        .map_err(|e| VaultError::Decompression(e.to_string()))?;

    if decoded.len() as u64 != expected {
        return Err(VaultError::SizeMismatch {
            expected,
            got: decoded.len() as u64,
        });
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trip() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let encoded = encode_chunk(&payload).unwrap();
        let decoded = decode_chunk(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn empty_payload_round_trips() {
        let encoded = encode_chunk(&[]).unwrap();
        let decoded = decode_chunk(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn identical_plaintexts_produce_identical_addresses() {
        let payload = b"deterministic content".to_vec();
        let a = encode_chunk(&payload).unwrap();
        let b = encode_chunk(&payload).unwrap();
        assert_eq!(a, b);
        assert_eq!(crate::hash::sha256_hex(&a), crate::hash::sha256_hex(&b));
    }

    #[test]
    fn differing_plaintexts_produce_differing_addresses() {
        let a = encode_chunk(b"alpha").unwrap();
        let b = encode_chunk(b"beta").unwrap();
        assert_ne!(crate::hash::sha256_hex(&a), crate::hash::sha256_hex(&b));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let encoded = encode_chunk(b"hello world").unwrap();
        let err = decode_chunk(&encoded[..encoded.len() - 2]).unwrap_err();
        assert!(matches!(err, VaultError::Decompression(_)));
    }
}
