// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! What the caller hides: a text message or a single file.

use serde::{Deserialize, Serialize};

use super::error::{FrameError, Result, StegoError};
use super::frame::FileMeta;

pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Frame TYPE byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    Text,
    File,
}

impl PayloadType {
    pub fn tag(self) -> u8 {
        match self {
            PayloadType::Text => 0,
            PayloadType::File => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PayloadType::Text),
            1 => Some(PayloadType::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    File { filename: String, mime_type: String, data: Vec<u8> },
}

impl Payload {
    pub fn text(s: impl Into<String>) -> Self {
        Payload::Text(s.into())
    }

    /// A file payload. An empty MIME type is guessed from the extension.
    pub fn file(filename: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        let mut mime_type = mime_type.into();
        if mime_type.trim().is_empty() {
            mime_type = guess_mime(&filename).to_string();
        }
        Payload::File { filename, mime_type, data }
    }

    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::Text(_) => PayloadType::Text,
            Payload::File { .. } => PayloadType::File,
        }
    }

    /// The bytes that get compressed and encrypted.
    pub fn content(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::File { data, .. } => data,
        }
    }

    pub fn file_meta(&self) -> Option<FileMeta> {
        match self {
            Payload::Text(_) => None,
            Payload::File { filename, mime_type, .. } => Some(FileMeta {
                filename: filename.clone(),
                mime_type: mime_type.clone(),
            }),
        }
    }

    pub fn validate(&self, max_bytes: usize) -> Result<()> {
        let len = self.content().len();
        if len > max_bytes {
            return Err(StegoError::Validation(format!(
                "payload is {len} bytes, limit is {max_bytes}"
            )));
        }
        if let Payload::File { filename, mime_type, .. } = self {
            if filename.trim().is_empty() {
                return Err(StegoError::Validation("filename is empty".into()));
            }
            if filename.len() > u16::MAX as usize {
                return Err(FrameError::MetadataTooLong("filename").into());
            }
            if mime_type.len() > u16::MAX as usize {
                return Err(FrameError::MetadataTooLong("MIME type").into());
            }
        }
        Ok(())
    }

    /// Rebuild from decrypted content.
    pub fn from_parts(kind: PayloadType, meta: Option<FileMeta>, content: Vec<u8>) -> Result<Self> {
        match kind {
            PayloadType::Text => String::from_utf8(content)
                .map(Payload::Text)
                .map_err(|_| FrameError::InvalidUtf8.into()),
            PayloadType::File => {
                let meta = meta.unwrap_or(FileMeta { filename: String::new(), mime_type: String::new() });
                Ok(Payload::File { filename: meta.filename, mime_type: meta.mime_type, data: content })
            }
        }
    }
}

/// MIME type for common extensions, `application/octet-stream` otherwise.
pub fn guess_mime(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pem" => "application/x-pem-file",
        _ => DEFAULT_MIME,
    }
}
