// ==========================================
// Paie - import progress reporting
// ==========================================
// The engine reports at phase boundaries and once per chunk.
// A sink that panics is ignored; a missing sink is a no-op.
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 0..=100
    pub percent: u8,
    pub message: String,
    pub metrics: BTreeMap<String, i64>,
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8, message: &str, metrics: &BTreeMap<String, i64>);
}

#[derive(Debug, Clone, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _percent: u8, _message: &str, _metrics: &BTreeMap<String, i64>) {}
}

/// Forwards events to a tokio channel, for UIs
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, percent: u8, message: &str, metrics: &BTreeMap<String, i64>) {
        // receiver gone: nobody is listening anymore
        let _ = self.tx.send(ProgressEvent {
            percent,
            message: message.to_string(),
            metrics: metrics.clone(),
        });
    }
}

/// Optional sink wrapper used by the engine
#[derive(Clone, Default)]
pub struct ProgressReporter {
    inner: Option<Arc<dyn ProgressSink>>,
}

impl ProgressReporter {
    pub fn with_sink(sink: Arc<dyn ProgressSink>) -> Self {
        Self { inner: Some(sink) }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    pub fn report(&self, percent: u8, message: &str, metrics: &[(&str, i64)]) {
        let Some(sink) = &self.inner else { return };
        let metrics: BTreeMap<String, i64> = metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let percent = percent.min(100);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.report(percent, message, &metrics)));
        if outcome.is_err() {
            tracing::warn!(percent, message, "progress sink panicked, event dropped");
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("configured", &self.is_configured())
            .finish()
    }
}
