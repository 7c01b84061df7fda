use sha2::{Digest, Sha256};
use std::io::Read;

use crate::error::Result;

/// SHA-256 of an in-memory buffer, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 of a readable stream, read through a 4 KiB buffer so large files
/// never need to be held in memory at once.
pub fn sha256_stream<R: Read>(mut r: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
