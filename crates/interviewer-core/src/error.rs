//! Error taxonomy for the capture, synthesis, and telemetry collaborators.
//!
//! Channel errors live in `interviewer-channel`. None of these are fatal to
//! the orchestrator: capture errors surface to the candidate at most as an
//! inline message, telemetry errors are absorbed and logged.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("camera/microphone permission denied")]
    PermissionDenied,
    #[error("speech recognition not available")]
    Unavailable,
    #[error("capture device error: {0}")]
    Device(String),
    #[error("no speech detected")]
    NoSpeech,
    #[error("speech recognition error: {0}")]
    Recognition(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TelemetryError {
    #[error("observation poll failed: {0}")]
    PollFailed(String),
    #[error("observation collaborator rejected start")]
    StartRejected,
    #[error("no behavioral report available")]
    ReportUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("speech synthesis failed: {0}")]
    Playback(String),
}
