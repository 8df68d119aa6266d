// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Key derivation: credentials in, encryption key and ordering key out.
//!
//! ```text
//! photo_hash = SHA-256(photo)
//! password   = normalize(passphrase) ‖ 0x00 ‖ pin
//! salt       = SHA-256("stegkit/kdf/v1" ‖ photo_hash ‖ rsa_component ‖ channel_component)
//! master     = Argon2id(password, salt) | PBKDF2-HMAC-SHA256(password, salt)   (64 bytes)
//! encryption = HKDF-SHA256(salt, master).expand("stegkit/encryption")       (32 bytes)
//! ordering   = HKDF-SHA256(salt, master).expand("stegkit/ordering")         (32 bytes)
//! ```
//!
//! The memory-hard path is used when the `argon2` capability is on. Both
//! sides of an exchange must agree on it and on the [`KdfParams`].

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use super::config::{Capabilities, KdfParams};
use super::credentials::Credentials;
use super::error::{Result, StegoError};

const SALT_DOMAIN: &[u8] = b"stegkit/kdf/v1";
const INFO_ENCRYPTION: &[u8] = b"stegkit/encryption";
const INFO_ORDERING: &[u8] = b"stegkit/ordering";
const MASTER_LEN: usize = 64;

/// The two per-call keys. Never equal, wiped on drop.
pub struct DerivedKeys {
    pub encryption: Zeroizing<[u8; 32]>,
    pub ordering: Zeroizing<[u8; 32]>,
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKeys(..)")
    }
}

/// Which password hash produced the master secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfBackend {
    Argon2id,
    Pbkdf2Sha256,
}

impl KdfBackend {
    pub fn select(caps: &Capabilities) -> Self {
        if caps.effective().argon2 {
            KdfBackend::Argon2id
        } else {
            KdfBackend::Pbkdf2Sha256
        }
    }
}

/// The salt fed to both the password hash and HKDF.
pub fn derivation_salt(creds: &Credentials) -> Result<[u8; 32]> {
    let photo_hash = Sha256::digest(&creds.photo);
    let mut h = Sha256::new();
    h.update(SALT_DOMAIN);
    h.update(photo_hash);
    h.update(creds.rsa_component()?);
    h.update(creds.channel()?.kdf_component());
    Ok(h.finalize().into())
}

#[cfg(feature = "argon2")]
fn argon2_master(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<Zeroizing<[u8; MASTER_LEN]>> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let p = Params::new(
        params.argon2_memory_kib,
        params.argon2_iterations,
        params.argon2_lanes,
        Some(MASTER_LEN),
    )
    .map_err(|e| StegoError::KeyDerivation(format!("bad Argon2 parameters: {e}")))?;
    let mut out = Zeroizing::new([0u8; MASTER_LEN]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, p)
        .hash_password_into(password, salt, &mut *out)
        .map_err(|e| StegoError::KeyDerivation(format!("Argon2 failed: {e}")))?;
    Ok(out)
}

#[cfg(not(feature = "argon2"))]
fn argon2_master(_password: &[u8], _salt: &[u8], _params: &KdfParams) -> Result<Zeroizing<[u8; MASTER_LEN]>> {
    Err(StegoError::Unsupported("argon2 is not compiled into this build"))
}

fn pbkdf2_master(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<Zeroizing<[u8; MASTER_LEN]>> {
    if params.pbkdf2_iterations == 0 {
        return Err(StegoError::KeyDerivation("PBKDF2 iteration count is zero".into()));
    }
    let mut out = Zeroizing::new([0u8; MASTER_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, params.pbkdf2_iterations, &mut *out);
    Ok(out)
}

/// Derive both keys. Validates the credentials first.
pub fn derive_keys(creds: &Credentials, params: &KdfParams, caps: &Capabilities) -> Result<DerivedKeys> {
    creds.validate()?;
    let salt = derivation_salt(creds)?;
    let password = creds.password_bytes();

    let backend = KdfBackend::select(caps);
    debug!(?backend, channel = creds.channel_key.is_some(), rsa = creds.rsa_key.is_some(), "deriving keys");
    let master = match backend {
        KdfBackend::Argon2id => argon2_master(&password, &salt, params)?,
        KdfBackend::Pbkdf2Sha256 => pbkdf2_master(&password, &salt, params)?,
    };

    let hk = Hkdf::<Sha256>::new(Some(&salt), &master[..]);
    let mut encryption = Zeroizing::new([0u8; 32]);
    let mut ordering = Zeroizing::new([0u8; 32]);
    hk.expand(INFO_ENCRYPTION, &mut *encryption)
        .map_err(|e| StegoError::KeyDerivation(e.to_string()))?;
    hk.expand(INFO_ORDERING, &mut *ordering)
        .map_err(|e| StegoError::KeyDerivation(e.to_string()))?;

    if *encryption == *ordering {
        return Err(StegoError::KeyDerivation("derived keys collided".into()));
    }
    Ok(DerivedKeys { encryption, ordering })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new(b"reference photo bytes".to_vec(), "alpha bravo charlie delta").with_pin("482915")
    }

    fn derive(c: &Credentials) -> DerivedKeys {
        derive_keys(c, &KdfParams::MINIMAL, &Capabilities::probe()).unwrap()
    }

    #[test]
    fn deterministic_and_distinct() {
        let a = derive(&creds());
        let b = derive(&creds());
        assert_eq!(*a.encryption, *b.encryption);
        assert_eq!(*a.ordering, *b.ordering);
        assert_ne!(*a.encryption, *a.ordering);
    }

    #[test]
    fn every_factor_changes_the_keys() {
        let base = derive(&creds());
        let variants = [
            Credentials::new(b"another photo".to_vec(), "alpha bravo charlie delta").with_pin("482915"),
            Credentials::new(b"reference photo bytes".to_vec(), "alpha bravo charlie echo").with_pin("482915"),
            creds().with_pin("482916"),
            creds().with_channel_key(Some(String::new())),
            creds().with_channel_key(Some("ABCD-EFGH-JKLM-NPQR-STUV-WXYZ-2345-6789".into())),
        ];
        for v in &variants {
            let k = derive(v);
            assert_ne!(*k.ordering, *base.ordering, "{v:?}");
            assert_ne!(*k.encryption, *base.encryption, "{v:?}");
        }
    }

    #[test]
    fn backends_disagree() {
        let on = derive_keys(&creds(), &KdfParams::MINIMAL, &Capabilities::probe()).unwrap();
        let off = Capabilities { argon2: false, ..Capabilities::probe() };
        let pb = derive_keys(&creds(), &KdfParams::MINIMAL, &off).unwrap();
        if Capabilities::probe().argon2 {
            assert_ne!(*on.ordering, *pb.ordering);
        } else {
            assert_eq!(*on.ordering, *pb.ordering);
        }
    }

    #[test]
    fn invalid_credentials_fail_before_hashing() {
        let c = Credentials::new(b"p".to_vec(), "words");
        assert!(matches!(
            derive_keys(&c, &KdfParams::MINIMAL, &Capabilities::probe()),
            Err(StegoError::Validation(_))
        ));
    }
}
