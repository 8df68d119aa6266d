// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Authenticated encryption of the (compressed) payload.
//!
//! Blob layout: `SALT(16) | IV(12) | TAG(16) | CIPHERTEXT`. Every call draws
//! a fresh salt and IV; the AES-256-GCM key for the message is
//! `HKDF-SHA256(salt, encryption_key, "stegkit/message")`, so even an IV
//! collision under the same derived key cannot reuse a (key, nonce) pair.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use super::error::{Result, StegoError};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
/// Bytes added to every plaintext.
pub const OVERHEAD: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

const INFO_MESSAGE: &[u8] = b"stegkit/message";

fn message_cipher(salt: &[u8], key: &[u8; 32]) -> Result<Aes256Gcm> {
    let mut msg_key = Zeroizing::new([0u8; 32]);
    Hkdf::<Sha256>::new(Some(salt), key)
        .expand(INFO_MESSAGE, &mut *msg_key)
        .map_err(|_| StegoError::Encryption)?;
    Aes256Gcm::new_from_slice(&*msg_key).map_err(|_| StegoError::Encryption)
}

pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let cipher = message_cipher(&salt, key)?;
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| StegoError::Encryption)?;

    let mut out = Vec::with_capacity(OVERHEAD + buffer.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&buffer);
    Ok(out)
}

/// Any failure, including a blob too short to hold the header, is reported
/// as the same [`StegoError::DecryptionFailed`].
pub fn decrypt(blob: &[u8], key: &[u8; 32]) -> Result<Vec<u8>> {
    if blob.len() < OVERHEAD {
        debug!(len = blob.len(), "ciphertext shorter than header");
        return Err(StegoError::DecryptionFailed);
    }
    let (salt, rest) = blob.split_at(SALT_LEN);
    let (iv, rest) = rest.split_at(NONCE_LEN);
    let (tag, ct) = rest.split_at(TAG_LEN);

    let cipher = message_cipher(salt, key).map_err(|_| StegoError::DecryptionFailed)?;
    let mut buffer = ct.to_vec();
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut buffer, Tag::from_slice(tag))
        .map_err(|_| {
            debug!(ct_len = ct.len(), "authentication tag mismatch");
            StegoError::DecryptionFailed
        })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn roundtrip() {
        let blob = encrypt(b"attack at dawn", &KEY).unwrap();
        assert_eq!(blob.len(), OVERHEAD + 14);
        assert_eq!(decrypt(&blob, &KEY).unwrap(), b"attack at dawn");
    }

    #[test]
    fn fresh_salt_and_iv_per_call() {
        let a = encrypt(b"same", &KEY).unwrap();
        let b = encrypt(b"same", &KEY).unwrap();
        assert_ne!(a[..SALT_LEN + NONCE_LEN], b[..SALT_LEN + NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn every_failure_looks_the_same() {
        let blob = encrypt(b"payload", &KEY).unwrap();

        let wrong_key = decrypt(&blob, &[8u8; 32]).unwrap_err();
        let mut tampered = blob.clone();
        *tampered.last_mut().unwrap() ^= 1;
        let tampered = decrypt(&tampered, &KEY).unwrap_err();
        let mut bad_tag = blob.clone();
        bad_tag[SALT_LEN + NONCE_LEN] ^= 0x80;
        let bad_tag = decrypt(&bad_tag, &KEY).unwrap_err();
        let short = decrypt(&blob[..10], &KEY).unwrap_err();

        for e in [wrong_key, tampered, bad_tag, short] {
            assert!(matches!(e, StegoError::DecryptionFailed));
            assert_eq!(e.to_string(), "decryption failed");
        }
    }

    #[test]
    fn empty_plaintext_is_allowed() {
        let blob = encrypt(b"", &KEY).unwrap();
        assert_eq!(blob.len(), OVERHEAD);
        assert!(decrypt(&blob, &KEY).unwrap().is_empty());
    }
}
