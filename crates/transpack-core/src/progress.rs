//! Progress, completion, failure and cancellation protocol.
//!
//! Every long-running call takes a [`ProgressChannel`]: a cancellation token
//! the core polls at well-defined points, plus any number of registered
//! [`ProgressSink`]s that receive notifications in order.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Canceled;

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Running counter, if the operation counts units of work.
    pub counter: Option<usize>,
    /// Total units of work, known before the first event.
    pub total: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

impl ProgressEvent {
    /// A counted event.
    pub fn counted(counter: usize, total: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            counter: Some(counter),
            total,
            message: message.into(),
        }
    }

    /// A message-only event with no counter or total.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            counter: None,
            total: None,
            message: message.into(),
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0), if a total is known.
    pub fn percentage(&self) -> Option<f64> {
        match (self.counter, self.total) {
            (Some(counter), Some(total)) if total > 0 => {
                Some((counter as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percentage() {
            Some(pct) => write!(f, "[{pct:>5.1}%] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Receiver of progress, completion and failure notifications.
pub trait ProgressSink: Send + Sync {
    /// Work advanced.
    fn on_progress(&self, event: &ProgressEvent);

    /// The operation finished successfully.
    fn on_done(&self) {}

    /// The operation was abandoned; the error is not raised to the caller.
    fn on_failure(&self, _error: &(dyn std::error::Error + 'static)) {}
}

/// Notification forwarded through a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// Progress update.
    Progress(ProgressEvent),
    /// The operation completed.
    Done,
    /// The operation failed; carries the rendered error.
    Failed(String),
}

impl ProgressSink for mpsc::UnboundedSender<ProgressUpdate> {
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = self.send(ProgressUpdate::Progress(event.clone()));
    }

    fn on_done(&self) {
        let _ = self.send(ProgressUpdate::Done);
    }

    fn on_failure(&self, error: &(dyn std::error::Error + 'static)) {
        let _ = self.send(ProgressUpdate::Failed(error.to_string()));
    }
}

/// Sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Cancellation token plus progress sinks for one invocation.
#[derive(Clone, Default)]
pub struct ProgressChannel {
    cancel: CancellationToken,
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl ProgressChannel {
    /// Create a channel with a fresh token and no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel that observes an existing token.
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            sinks: Vec::new(),
        }
    }

    /// Register a sink.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Register a sink in place.
    pub fn register(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sinks.push(sink);
    }

    /// The cancellation token this channel polls.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cancellation. Takes effect at the next poll point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check whether cancellation was requested.
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Poll point: fail with [`Canceled`] if cancellation was requested.
    pub fn check(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            Err(Canceled)
        } else {
            Ok(())
        }
    }

    /// Notify every sink of progress.
    pub fn progress(&self, event: ProgressEvent) {
        for sink in &self.sinks {
            sink.on_progress(&event);
        }
    }

    /// Notify every sink that the operation completed.
    pub fn done(&self) {
        for sink in &self.sinks {
            sink.on_done();
        }
    }

    /// Notify every sink that the operation failed.
    pub fn failed(&self, error: &(dyn std::error::Error + 'static)) {
        for sink in &self.sinks {
            sink.on_failure(error);
        }
    }
}

impl fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressChannel")
            .field("canceled", &self.is_canceled())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
