// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! RSA key factor and KDF backends, end to end.

mod common;

use std::sync::OnceLock;

use common::{config, creds, png};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use stegkit_core::stego::error::KeyPasswordIssue;
use stegkit_core::{Capabilities, Codec, CodecConfig, Credentials, EmbedMode, Payload, RsaKeyMaterial, StegoError};

fn key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap())
}

fn rsa_creds(material: RsaKeyMaterial) -> Credentials {
    Credentials::new(b"team photo".to_vec(), "orange kettle silent bridge").with_rsa_key(material)
}

#[test]
fn rsa_key_alone_is_enough() {
    let codec = Codec::new(config());
    let pem = key().to_pkcs8_pem(LineEnding::LF).unwrap();
    let c = rsa_creds(RsaKeyMaterial::new(pem.as_str(), None));
    let out = codec.encode(&png(48, 48, 1), &Payload::text("signed"), &c, EmbedMode::Lsb).unwrap();
    assert_eq!(codec.decode(&out.image, &c, None).unwrap().payload, Payload::text("signed"));

    let other = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let wrong = rsa_creds(RsaKeyMaterial::new(other.to_pkcs8_pem(LineEnding::LF).unwrap().as_str(), None));
    assert!(matches!(codec.decode(&out.image, &wrong, None), Err(StegoError::NoDataFound)));
}

#[test]
fn encrypted_key_password_errors() {
    let codec = Codec::new(config());
    let pem = key().to_pkcs8_encrypted_pem(&mut rand::thread_rng(), b"s3cret", LineEnding::LF).unwrap();

    let missing = rsa_creds(RsaKeyMaterial::new(pem.as_str(), None));
    let err = codec.encode(&png(16, 16, 2), &Payload::text("x"), &missing, EmbedMode::Lsb).unwrap_err();
    assert!(matches!(err, StegoError::KeyPassword(KeyPasswordIssue::Required)));

    let wrong = rsa_creds(RsaKeyMaterial::new(pem.as_str(), Some("guess".into())));
    let err = codec.encode(&png(16, 16, 2), &Payload::text("x"), &wrong, EmbedMode::Lsb).unwrap_err();
    assert!(matches!(err, StegoError::KeyPassword(KeyPasswordIssue::Incorrect)));

    // Same key, encrypted or not, derives the same secrets.
    let unlocked = rsa_creds(RsaKeyMaterial::new(pem.as_str(), Some("s3cret".into())));
    let plain = rsa_creds(RsaKeyMaterial::new(key().to_pkcs8_pem(LineEnding::LF).unwrap().as_str(), None));
    let out = codec.encode(&png(32, 32, 3), &Payload::text("same key"), &unlocked, EmbedMode::Lsb).unwrap();
    assert_eq!(codec.decode(&out.image, &plain, None).unwrap().payload, Payload::text("same key"));
}

#[test]
fn pbkdf2_fallback_is_a_different_derivation() {
    let argon = Codec::new(config());
    let pbkdf2 = Codec::new(CodecConfig {
        capabilities: Capabilities { argon2: false, ..Capabilities::probe() },
        ..config()
    });
    let carrier = png(40, 40, 4);
    let out = pbkdf2.encode(&carrier, &Payload::text("fallback"), &creds(), EmbedMode::Lsb).unwrap();
    assert_eq!(pbkdf2.decode(&out.image, &creds(), None).unwrap().payload, Payload::text("fallback"));

    if Capabilities::probe().argon2 {
        assert!(argon.decode(&out.image, &creds(), None).is_err());
    }
}
