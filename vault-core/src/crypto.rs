//! Snapshot metadata encryption envelope:
//! `"BACKUPENC" || salt[32] || iv[16] || AES-256-CBC(PBKDF2-HMAC-SHA256(password, salt, 10000, 32), iv, PKCS#7(plaintext))`
//!
//! An empty password disables encryption entirely; the decoder distinguishes
//! plaintext JSON from an encrypted document purely by whether the buffer
//! starts with the magic, so old unencrypted snapshots stay readable.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::error::{Result, VaultError};

pub const MAGIC: &[u8; 9] = b"BACKUPENC";
const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;
const PBKDF2_ITERATIONS: u32 = 10_000;
const KEY_LEN: usize = 32;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypts `plaintext` under `password`. A non-empty password is required;
/// callers decide separately whether to skip encryption altogether.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    getrandom::getrandom(&mut salt)
        .map_err(|e| VaultError::Config(format!("rng failure: {e}")))?;
    getrandom::getrandom(&mut iv).map_err(|e| VaultError::Config(format!("rng failure: {e}")))?;

    let key = derive_key(password, &salt);
    let cipher = Aes256CbcEnc::new(&key.into(), &iv.into());
    let ciphertext = cipher.encrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(MAGIC.len() + SALT_LEN + IV_LEN + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Returns `true` if `bytes` begins with the encryption envelope's magic.
pub fn is_encrypted(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] == MAGIC
}

/// Decrypts an envelope produced by [`encrypt`]. Wrong passwords and
/// corrupted ciphertext both surface as [`VaultError::MetadataCorrupt`] —
/// never as garbage plaintext.
pub fn decrypt(bytes: &[u8], password: &str) -> Result<Vec<u8>> {
    let header_len = MAGIC.len() + SALT_LEN + IV_LEN;
    if bytes.len() < header_len {
        return Err(VaultError::MetadataCorrupt(
            "encrypted document shorter than envelope header".into(),
        ));
    }
    let salt = &bytes[MAGIC.len()..MAGIC.len() + SALT_LEN];
    let iv = &bytes[MAGIC.len() + SALT_LEN..header_len];
    let ciphertext = &bytes[header_len..];

    let key = derive_key(password, salt);
    let cipher = Aes256CbcDec::new(&key.into(), iv.into());
    cipher
        .decrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(ciphertext)
        .map_err(|_| VaultError::MetadataCorrupt("wrong password or corrupted metadata".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let plaintext = br#"{"type":0}"#;
        let enc = encrypt(plaintext, "correct horse").unwrap();
        assert!(is_encrypted(&enc));
        let dec = decrypt(&enc, "correct horse").unwrap();
        assert_eq!(dec, plaintext);
    }

    #[test]
    fn wrong_password_is_rejected_not_garbage() {
        let plaintext = br#"{"type":0}"#;
        let enc = encrypt(plaintext, "p1").unwrap();
        let err = decrypt(&enc, "p2").unwrap_err();
        assert!(matches!(err, VaultError::MetadataCorrupt(_)));
    }

    #[test]
    fn plaintext_json_has_no_magic() {
        let plaintext = br#"{"type":0}"#;
        assert!(!is_encrypted(plaintext));
    }

    #[test]
    fn encrypted_document_always_begins_with_magic() {
        let enc = encrypt(b"anything at all", "pw").unwrap();
        assert_eq!(&enc[..MAGIC.len()], MAGIC);
    }
}
