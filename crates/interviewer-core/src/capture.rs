//! Speech capture collaborator interface.
//!
//! The recognizer is an opaque asynchronous source: the orchestrator starts
//! and stops it through this trait and receives its events through the
//! session inbox. The engine behind it (platform recognizer, remote
//! transcriber) is out of scope here.

#[cfg(test)]
use mockall::automock;

use crate::error::CaptureError;

/// One event from the speech recognizer.
///
/// Interim text supersedes prior interim text; final text is appended
/// permanently to the utterance under accumulation.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    Started,
    Interim(String),
    Final(String),
    Ended,
    Error(CaptureError),
}

#[cfg_attr(test, automock)]
pub trait SpeechCapture: Send + Sync {
    /// Begin a capture cycle. Events are delivered to the session inbox the
    /// implementation was constructed with.
    fn start(&self) -> Result<(), CaptureError>;

    /// Stop the current capture cycle; the recognizer emits `Ended` when it
    /// actually winds down.
    fn stop(&self);
}
