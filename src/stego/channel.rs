// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Channel keys: an optional shared secret that scopes a deployment or group.
//!
//! A key is 32 characters from `[A-Z0-9]`, shown as eight dash-separated
//! groups of four. Three states feed key derivation and all three derive
//! differently:
//!
//! - `None`: no channel configured (the caller deferred to its default and
//!   there was none),
//! - `Some("")`: explicitly public,
//! - `Some(key)`: private channel.

use std::fmt;

use rand::Rng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::error::{Result, StegoError};

pub const CHANNEL_KEY_LEN: usize = 32;
const GROUP_LEN: usize = 4;
const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A validated channel key in canonical form (32 uppercase characters).
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelKey(Zeroizing<String>);

impl ChannelKey {
    /// Accepts the grouped form or the bare 32 characters, any case.
    pub fn parse(input: &str) -> Result<Self> {
        let canonical: String = input
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if canonical.len() != CHANNEL_KEY_LEN {
            return Err(StegoError::Validation(format!(
                "channel key must have {CHANNEL_KEY_LEN} characters, got {}",
                canonical.chars().count()
            )));
        }
        if !canonical.bytes().all(|b| ALPHABET.contains(&b)) {
            return Err(StegoError::Validation(
                "channel key may only contain A-Z and 0-9".into(),
            ));
        }
        Ok(Self(Zeroizing::new(canonical)))
    }

    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let key: String = (0..CHANNEL_KEY_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(Zeroizing::new(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `ABCD-EFGH-...`, the form shown to people.
    pub fn formatted(&self) -> String {
        self.0
            .as_bytes()
            .chunks(GROUP_LEN)
            .map(|g| String::from_utf8_lossy(g).into_owned())
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(self.0.as_bytes()).into()
    }
}

impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelKey({}-****)", &self.0[..GROUP_LEN])
    }
}

/// How a single call is bound to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelBinding {
    Unset,
    Public,
    Private(ChannelKey),
}

impl ChannelBinding {
    pub fn from_option(key: Option<&str>) -> Result<Self> {
        match key {
            None => Ok(ChannelBinding::Unset),
            Some(k) if k.trim().is_empty() => Ok(ChannelBinding::Public),
            Some(k) => ChannelKey::parse(k).map(ChannelBinding::Private),
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, ChannelBinding::Private(_))
    }

    /// Tagged bytes mixed into the KDF salt.
    pub fn kdf_component(&self) -> Vec<u8> {
        match self {
            ChannelBinding::Unset => vec![0x00],
            ChannelBinding::Public => vec![0x01],
            ChannelBinding::Private(key) => {
                let mut out = Vec::with_capacity(33);
                out.push(0x02);
                out.extend_from_slice(&key.hash());
                out
            }
        }
    }
}

/// The user-facing selector that frontends resolve before calling the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSelector {
    /// Use the deployment default, if any.
    Auto,
    /// Explicit public mode.
    None,
    Explicit(String),
}

impl ChannelSelector {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => ChannelSelector::Auto,
            "none" | "public" => ChannelSelector::None,
            _ => ChannelSelector::Explicit(raw.trim().to_string()),
        }
    }

    /// Turn the selector into the `Option<String>` the codec accepts.
    /// `deployment_default` is whatever the caller's environment or config
    /// provides; the codec never looks those up itself.
    pub fn resolve(&self, deployment_default: Option<&str>) -> Result<Option<String>> {
        let explicit = |k: &str| -> Result<Option<String>> {
            if k.trim().is_empty() {
                Ok(Some(String::new()))
            } else {
                Ok(Some(ChannelKey::parse(k)?.as_str().to_string()))
            }
        };
        match self {
            ChannelSelector::Auto => deployment_default.map_or(Ok(None), explicit),
            ChannelSelector::None => Ok(Some(String::new())),
            ChannelSelector::Explicit(k) => explicit(k),
        }
    }
}
