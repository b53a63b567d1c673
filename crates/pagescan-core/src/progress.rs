//! Progress events emitted while a file is processed.
//!
//! The pipeline reports through a [`ProgressReporter`], which forwards
//! [`ProgressEvent`]s to an unbounded tokio channel. Callers subscribe by
//! holding the receiving end; a reporter without a channel just drops events.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// What the pipeline is doing when an event is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "page", rename_all = "snake_case")]
pub enum Stage {
    Loading,
    Rasterizing(u32),
    Recognizing(u32),
    Reconstructing,
    Done,
}

/// A single progress update for one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Display name of the file.
    pub file: String,
    /// Percentage in `[0, 100]`, never lower than the previous event.
    pub percent: f32,
    pub stage: Stage,
}

/// Monotonic progress reporter for one file.
///
/// A reporter can be narrowed to a sub-range with [`ProgressReporter::scoped`];
/// scoped reporters share the parent's high-water mark.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    file: Arc<str>,
    sender: Option<UnboundedSender<ProgressEvent>>,
    last: Arc<Mutex<f32>>,
    start: f32,
    end: f32,
}

impl ProgressReporter {
    /// Create a reporter forwarding to `sender`.
    pub fn new(file: &str, sender: Option<UnboundedSender<ProgressEvent>>) -> Self {
        Self {
            file: Arc::from(file),
            sender,
            last: Arc::new(Mutex::new(0.0)),
            start: 0.0,
            end: 100.0,
        }
    }

    /// Reporter that discards every event.
    pub fn silent() -> Self {
        Self::new("", None)
    }

    /// Create a reporter and the receiver its events arrive on.
    pub fn channel(file: &str) -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(file, Some(tx)), rx)
    }

    /// Reporter mapping `0..=100` onto `start..=end` of this reporter's range.
    pub fn scoped(&self, start: f32, end: f32) -> Self {
        let span = self.end - self.start;
        Self {
            file: Arc::clone(&self.file),
            sender: self.sender.clone(),
            last: Arc::clone(&self.last),
            start: self.start + span * start.clamp(0.0, 100.0) / 100.0,
            end: self.start + span * end.clamp(0.0, 100.0) / 100.0,
        }
    }

    /// Report `percent` of this reporter's range.
    ///
    /// Values are clamped to `[0, 100]` and never move backwards.
    pub fn report(&self, percent: f32, stage: Stage) {
        let local = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        let absolute = self.start + (self.end - self.start) * local / 100.0;

        let value = {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if absolute > *last {
                *last = absolute;
            }
            *last
        };

        if let Some(sender) = &self.sender {
            // A dropped receiver only means nobody is listening.
            let _ = sender.send(ProgressEvent {
                file: self.file.to_string(),
                percent: value,
                stage,
            });
        }
    }

    /// Highest value reported so far, in absolute percent.
    pub fn current(&self) -> f32 {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::silent()
    }
}
