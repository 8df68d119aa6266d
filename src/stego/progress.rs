// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Best-effort progress notifications for long DCT passes.
//!
//! A [`ProgressSink`] receives `(current_block, total_blocks)`. Delivery
//! never blocks and never fails the operation: an error from the sink is
//! logged at debug level and dropped.

use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("progress receiver is gone")]
    Disconnected,
    #[error("progress queue is full")]
    Full,
    #[error("{0}")]
    Other(String),
}

/// Receives block progress. Must not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, current: usize, total: usize) -> Result<(), ProgressError>;
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, current: usize, total: usize) -> Result<(), ProgressError> {
        self(current, total);
        Ok(())
    }
}

/// Forwards progress into a bounded channel with `try_send`.
pub struct ChannelProgress {
    tx: SyncSender<(usize, usize)>,
}

impl ChannelProgress {
    /// Wrap an existing sender, e.g. one shared by several codecs.
    pub fn new(tx: SyncSender<(usize, usize)>) -> Self {
        Self { tx }
    }

    /// A sink plus its receiver, holding at most `bound` pending updates.
    pub fn bounded(bound: usize) -> (Self, Receiver<(usize, usize)>) {
        let (tx, rx) = std::sync::mpsc::sync_channel(bound);
        (Self::new(tx), rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, current: usize, total: usize) -> Result<(), ProgressError> {
        self.tx.try_send((current, total)).map_err(|e| match e {
            TrySendError::Full(_) => ProgressError::Full,
            TrySendError::Disconnected(_) => ProgressError::Disconnected,
        })
    }
}

/// Rate-limited reporting for one pass over `total` blocks.
pub(crate) struct BlockProgress<'a> {
    sink: Option<&'a dyn ProgressSink>,
    interval: usize,
    total: usize,
}

impl<'a> BlockProgress<'a> {
    pub(crate) fn new(sink: Option<&'a Arc<dyn ProgressSink>>, interval: usize, total: usize) -> Self {
        Self { sink: sink.map(|s| s.as_ref()), interval: interval.max(1), total }
    }

    /// No-op sink, for passes nobody watches.
    pub(crate) fn silent() -> Self {
        Self { sink: None, interval: 1, total: 0 }
    }

    fn send(&self, current: usize) {
        if let Some(sink) = self.sink {
            if let Err(e) = sink.report(current, self.total) {
                debug!(error = %e, current, total = self.total, "progress update dropped");
            }
        }
    }

    /// Call after finishing block `done - 1`.
    pub(crate) fn tick(&self, done: usize) {
        if done % self.interval == 0 && done < self.total {
            self.send(done);
        }
    }

    pub(crate) fn finish(&self) {
        self.send(self.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reports_every_interval_and_at_the_end() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let sink: Arc<dyn ProgressSink> = Arc::new(move |c: usize, t: usize| log.lock().unwrap().push((c, t)));
        let p = BlockProgress::new(Some(&sink), 4, 10);
        for done in 1..=10 {
            p.tick(done);
        }
        p.finish();
        assert_eq!(*seen.lock().unwrap(), vec![(4, 10), (8, 10), (10, 10)]);
    }

    #[test]
    fn full_or_closed_channel_is_not_fatal() {
        let (sink, rx) = ChannelProgress::bounded(1);
        assert_eq!(sink.report(1, 3), Ok(()));
        assert_eq!(sink.report(2, 3), Err(ProgressError::Full));
        drop(rx);
        assert_eq!(sink.report(3, 3), Err(ProgressError::Disconnected));

        let sink: Arc<dyn ProgressSink> = Arc::new(sink);
        let p = BlockProgress::new(Some(&sink), 1, 3);
        p.tick(1);
        p.finish();
    }
}
