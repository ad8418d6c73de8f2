//! Presentation collaborator interface.
//!
//! Rendering (DOM, terminal, toasts) is out of scope for the orchestrator;
//! it drives the surface exclusively through this trait.

#[cfg(test)]
use mockall::automock;

use interviewer_types::{AvatarState, ObservationSnapshot, Report, SystemState, Warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Candidate,
    Interviewer,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionIndicator {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicIndicator {
    Idle,
    Listening,
}

/// Non-verbal feedback cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    MicActivated,
}

#[cfg_attr(test, automock)]
pub trait Presenter: Send + Sync {
    fn append_message(&self, speaker: Speaker, text: &str);
    fn set_stage(&self, stage: SystemState);
    fn set_avatar_state(&self, state: AvatarState);
    fn set_connection(&self, state: ConnectionIndicator);
    fn set_input_enabled(&self, enabled: bool);
    fn set_input_preview(&self, text: &str);
    fn set_input_hint(&self, hint: &str);
    fn set_mic(&self, state: MicIndicator);
    fn set_continuous(&self, enabled: bool);
    fn set_speaking_indicator(&self, speaking: bool);
    fn update_metrics(&self, snapshot: &ObservationSnapshot);
    /// Replaces the previous warning set; an empty poll clears it instead.
    fn show_warnings(&self, warnings: &[Warning]);
    fn clear_warnings(&self);
    fn show_report(&self, report: &Report);
    fn alert(&self, message: &str);
    fn request_consent(&self);
    fn play_cue(&self, cue: Cue);
}
