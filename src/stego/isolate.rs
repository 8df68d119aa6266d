// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Isolation boundary: serialize the request, run it somewhere disposable,
//! serialize the answer, give up after a deadline.
//!
//! [`handle_json_request`] is the whole worker side and can be hosted by a
//! separate process. [`Isolator`] hosts it in-process on a fresh thread per
//! call under `catch_unwind`. A timed-out worker thread is abandoned, not
//! killed; its eventual reply is dropped.
//!
//! Byte fields travel as standard base64 strings.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::capacity::{CapacityReport, EmbedStats};
use super::config::CodecConfig;
use super::credentials::{Credentials, RsaKeyMaterial};
use super::error::{ErrorKind, Result, StegoError};
use super::payload::Payload;
use super::pipeline::Codec;
use super::EmbedMode;

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// Credentials as they cross the boundary.
#[derive(Clone, Serialize, Deserialize)]
pub struct WireCredentials {
    #[serde(with = "b64")]
    pub photo: Vec<u8>,
    pub passphrase: String,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub rsa_pem: Option<String>,
    #[serde(default)]
    pub rsa_password: Option<String>,
    #[serde(default)]
    pub channel_key: Option<String>,
}

impl std::fmt::Debug for WireCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireCredentials").field("photo_len", &self.photo.len()).finish_non_exhaustive()
    }
}

impl From<WireCredentials> for Credentials {
    fn from(w: WireCredentials) -> Self {
        let mut creds = Credentials::new(w.photo, w.passphrase).with_channel_key(w.channel_key);
        if let Some(pin) = w.pin {
            creds = creds.with_pin(pin);
        }
        if let Some(pem) = w.rsa_pem {
            creds = creds.with_rsa_key(RsaKeyMaterial::new(pem, w.rsa_password));
        }
        creds
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WirePayload {
    Text {
        text: String,
    },
    File {
        filename: String,
        mime_type: String,
        #[serde(with = "b64")]
        data: Vec<u8>,
    },
}

impl From<WirePayload> for Payload {
    fn from(w: WirePayload) -> Self {
        match w {
            WirePayload::Text { text } => Payload::Text(text),
            WirePayload::File { filename, mime_type, data } => Payload::file(filename, mime_type, data),
        }
    }
}

impl From<Payload> for WirePayload {
    fn from(p: Payload) -> Self {
        match p {
            Payload::Text(text) => WirePayload::Text { text },
            Payload::File { filename, mime_type, data } => WirePayload::File { filename, mime_type, data },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Encode {
        #[serde(with = "b64")]
        carrier: Vec<u8>,
        payload: WirePayload,
        credentials: WireCredentials,
        mode: EmbedMode,
    },
    Decode {
        #[serde(with = "b64")]
        image: Vec<u8>,
        credentials: WireCredentials,
        #[serde(default)]
        mode: Option<EmbedMode>,
    },
    Capacity {
        #[serde(with = "b64")]
        carrier: Vec<u8>,
        mode: EmbedMode,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Encoded {
        #[serde(with = "b64")]
        image: Vec<u8>,
        mode: EmbedMode,
        stats: EmbedStats,
    },
    Decoded {
        payload: WirePayload,
        mode: EmbedMode,
        channel_used: bool,
    },
    Capacity {
        report: CapacityReport,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Response {
    fn from_error(e: StegoError) -> Self {
        Response::Error { kind: e.kind(), message: e.to_string() }
    }
}

const SERIALIZE_FAILED: &str = r#"{"status":"error","kind":"WorkerError","message":"response serialization failed"}"#;

fn dispatch(codec: &Codec, request: Request) -> Result<Response> {
    match request {
        Request::Encode { carrier, payload, credentials, mode } => {
            let out = codec.encode(&carrier, &payload.into(), &credentials.into(), mode)?;
            Ok(Response::Encoded { image: out.image, mode: out.mode, stats: out.stats })
        }
        Request::Decode { image, credentials, mode } => {
            let out = codec.decode(&image, &credentials.into(), mode)?;
            Ok(Response::Decoded { payload: out.payload.into(), mode: out.mode, channel_used: out.channel_used })
        }
        Request::Capacity { carrier, mode } => Ok(Response::Capacity { report: codec.capacity(&carrier, mode)? }),
    }
}

/// Worker side of the boundary: JSON request in, JSON response out.
/// Errors come back as `{"status":"error", ...}`; this never fails.
pub fn handle_json_request(config: &CodecConfig, request: &str) -> String {
    let response = match serde_json::from_str::<Request>(request) {
        Ok(req) => dispatch(&Codec::new(config.clone()), req).unwrap_or_else(Response::from_error),
        Err(e) => Response::from_error(StegoError::Serialization(e.to_string())),
    };
    serde_json::to_string(&response).unwrap_or_else(|_| SERIALIZE_FAILED.to_string())
}

pub type Handler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Runs requests on a throwaway thread with a deadline.
#[derive(Clone)]
pub struct Isolator {
    handler: Handler,
    timeout: Duration,
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

impl Isolator {
    pub fn new(config: CodecConfig, timeout: Duration) -> Self {
        Self::with_handler(Arc::new(move |req: &str| handle_json_request(&config, req)), timeout)
    }

    /// Host an arbitrary JSON handler, e.g. one that forwards to a process.
    pub fn with_handler(handler: Handler, timeout: Duration) -> Self {
        Self { handler, timeout }
    }

    /// Run `request` on a fresh worker thread and wait up to the timeout.
    ///
    /// On [`StegoError::Timeout`] the worker is detached, not stopped: it
    /// keeps its CPU and memory until the request finishes on its own, and
    /// its reply is dropped. Callers that need the work actually killed
    /// should host [`handle_json_request`] in a child process and pass a
    /// forwarding handler to [`Isolator::with_handler`].
    pub fn run(&self, request: &Request) -> Result<Response> {
        let json = serde_json::to_string(request)?;
        let reply = self.run_json(json)?;
        Ok(serde_json::from_str(&reply)?)
    }

    fn run_json(&self, json: String) -> Result<String> {
        let handler = Arc::clone(&self.handler);
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stegkit-isolate".into())
            .spawn(move || {
                let out = panic::catch_unwind(AssertUnwindSafe(|| handler(&json)));
                // The caller may have timed out and gone.
                let _ = tx.send(out.map_err(panic_message));
            })
            .map_err(|e| StegoError::WorkerCrashed(format!("could not start worker: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(msg)) => {
                warn!(message = %msg, "isolated worker panicked");
                Err(StegoError::WorkerCrashed(msg))
            }
            Err(RecvTimeoutError::Timeout) => {
                debug!(timeout = ?self.timeout, "isolated worker timed out");
                Err(StegoError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(StegoError::WorkerCrashed("worker exited without a reply".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_request_is_an_error_response() {
        let reply = handle_json_request(&CodecConfig::for_testing(), "{not json");
        let resp: Response = serde_json::from_str(&reply).unwrap();
        assert!(matches!(resp, Response::Error { kind: ErrorKind::WorkerError, .. }));
    }

    #[test]
    fn bytes_travel_as_base64() {
        let req = Request::Capacity { carrier: vec![0, 1, 2, 255], mode: EmbedMode::Lsb };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""carrier":"AAEC/w==""#), "{json}");
        assert!(json.contains(r#""op":"capacity""#));
    }

    #[test]
    fn panic_becomes_worker_crashed() {
        let boom: Handler = Arc::new(|_: &str| -> String { panic!("decoder blew up") });
        let iso = Isolator::with_handler(boom, Duration::from_secs(10));
        let err = iso.run(&Request::Capacity { carrier: vec![1], mode: EmbedMode::Lsb }).unwrap_err();
        match err {
            StegoError::WorkerCrashed(msg) => assert_eq!(msg, "decoder blew up"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn slow_worker_times_out() {
        let slow: Handler = Arc::new(|_: &str| {
            thread::sleep(Duration::from_millis(500));
            SERIALIZE_FAILED.to_string()
        });
        let iso = Isolator::with_handler(slow, Duration::from_millis(20));
        let err = iso.run(&Request::Capacity { carrier: vec![], mode: EmbedMode::Lsb }).unwrap_err();
        assert!(matches!(err, StegoError::Timeout(_)));
        assert_eq!(err.kind(), ErrorKind::TimeoutError);
    }

    #[test]
    fn timed_out_worker_runs_to_completion_detached() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        let slow: Handler = Arc::new(move |_: &str| {
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
            SERIALIZE_FAILED.to_string()
        });
        let iso = Isolator::with_handler(slow, Duration::from_millis(10));
        let err = iso.run(&Request::Capacity { carrier: vec![], mode: EmbedMode::Lsb }).unwrap_err();
        assert!(matches!(err, StegoError::Timeout(_)));

        for _ in 0..200 {
            if done.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn invalid_carrier_reports_kind() {
        let iso = Isolator::new(CodecConfig::for_testing(), Duration::from_secs(10));
        let resp = iso.run(&Request::Capacity { carrier: b"nope".to_vec(), mode: EmbedMode::Lsb }).unwrap();
        assert!(matches!(resp, Response::Error { kind: ErrorKind::ValidationError, .. }));
    }
}
