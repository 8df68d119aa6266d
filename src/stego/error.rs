// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the steganography layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::jpeg::error::JpegError;
use crate::stego::EmbedMode;

/// Why an RSA key could not be unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPasswordIssue {
    Required,
    Incorrect,
}

impl std::fmt::Display for KeyPasswordIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            KeyPasswordIssue::Required => "required",
            KeyPasswordIssue::Incorrect => "incorrect",
        })
    }
}

/// Malformed or unsupported payload frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The bytes are not one of our frames at all.
    #[error("frame magic not recognized")]
    BadMagic,
    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u8),
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("frame length mismatch: declared {declared}, found {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("unknown payload type {0}")]
    UnknownPayloadType(u8),
    #[error("frame metadata is not valid UTF-8")]
    InvalidUtf8,
    #[error("frame header checksum mismatch")]
    HeaderChecksum,
    #[error("{0} longer than 65535 bytes")]
    MetadataTooLong(&'static str),
}

/// Compression sub-frame errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    #[error("compression frame magic not recognized")]
    BadMagic,
    #[error("compression frame truncated")]
    Truncated,
    #[error("unknown compression algorithm tag {0}")]
    UnknownAlgorithm(u8),
    #[error("algorithm {0} is not available in this build")]
    Unavailable(&'static str),
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("corrupt compressed stream: {0}")]
    Corrupt(String),
}

/// Top-level error for encode, decode and capacity operations.
#[derive(Debug, Error)]
pub enum StegoError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("carrier image could not be read: {0}")]
    InvalidImage(String),
    #[error("JPEG error: {0}")]
    Jpeg(#[from] JpegError),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("RSA key password {0}")]
    KeyPassword(KeyPasswordIssue),
    #[error("encryption failed")]
    Encryption,
    /// Wrong key, wrong channel and tampered data all end up here.
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("no hidden data found")]
    NoDataFound,
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("payload needs {needed} bytes but the carrier holds {available}")]
    Capacity { needed: usize, available: usize },
    #[error("data was embedded in {detected} mode, not {requested}")]
    ModeMismatch { requested: EmbedMode, detected: EmbedMode },
    #[error("Reed-Solomon could not correct chunk {chunk}")]
    ReedSolomon { chunk: usize },
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("worker crashed: {0}")]
    WorkerCrashed(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StegoError {
    fn from(e: serde_json::Error) -> Self {
        StegoError::Serialization(e.to_string())
    }
}

/// Coarse error classification handed to collaborators (UIs, workers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    KeyDerivationError,
    KeyPasswordError,
    EncryptionError,
    DecryptionError,
    NoDataFoundError,
    FrameError,
    CapacityError,
    ModeMismatchError,
    ReedSolomonError,
    CompressionError,
    TimeoutError,
    WorkerError,
}

impl StegoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StegoError::Validation(_)
            | StegoError::InvalidImage(_)
            | StegoError::Jpeg(_)
            | StegoError::Unsupported(_) => ErrorKind::ValidationError,
            StegoError::KeyDerivation(_) => ErrorKind::KeyDerivationError,
            StegoError::KeyPassword(_) => ErrorKind::KeyPasswordError,
            StegoError::Encryption => ErrorKind::EncryptionError,
            StegoError::DecryptionFailed => ErrorKind::DecryptionError,
            StegoError::NoDataFound => ErrorKind::NoDataFoundError,
            StegoError::Frame(_) => ErrorKind::FrameError,
            StegoError::Capacity { .. } => ErrorKind::CapacityError,
            StegoError::ModeMismatch { .. } => ErrorKind::ModeMismatchError,
            StegoError::ReedSolomon { .. } => ErrorKind::ReedSolomonError,
            StegoError::Compression(_) => ErrorKind::CompressionError,
            StegoError::Timeout(_) => ErrorKind::TimeoutError,
            StegoError::WorkerCrashed(_) | StegoError::Serialization(_) => ErrorKind::WorkerError,
        }
    }
}

pub type Result<T> = std::result::Result<T, StegoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let e = StegoError::KeyPassword(KeyPasswordIssue::Required);
        assert_eq!(e.to_string(), "RSA key password required");
        let e = StegoError::Capacity { needed: 120, available: 96 };
        assert!(e.to_string().contains("120"));
        let e: StegoError = CompressionError::UnknownAlgorithm(9).into();
        assert!(e.to_string().contains("tag 9"));
    }

    #[test]
    fn decryption_failure_carries_no_detail() {
        assert_eq!(StegoError::DecryptionFailed.to_string(), "decryption failed");
        assert_eq!(StegoError::DecryptionFailed.kind(), ErrorKind::DecryptionError);
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(StegoError::Validation("pin".into()).kind(), ErrorKind::ValidationError);
        assert_eq!(StegoError::ReedSolomon { chunk: 2 }.kind(), ErrorKind::ReedSolomonError);
        let mismatch = StegoError::ModeMismatch {
            requested: EmbedMode::Lsb,
            detected: EmbedMode::DctTransform,
        };
        assert_eq!(mismatch.kind(), ErrorKind::ModeMismatchError);
        assert_eq!(mismatch.to_string(), "data was embedded in dct-transform mode, not lsb");
    }
}
