//! Wire payloads exchanged over the interview session channel.
//!
//! The candidate side sends plain text; the interviewer side replies with a
//! response, the interview stage, and avatar directives. Backends may add
//! stages and avatar states over time, so both enums decode unrecognized
//! values into an explicit `Unknown` variant instead of failing the frame.

use std::fmt;

/// Client -> backend: one submitted answer (typed or finalized speech).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CandidateMessage {
    pub text: String,
}

impl CandidateMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Backend -> client: the interviewer's reply plus presentation directives.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InterviewerMessage {
    #[serde(default)]
    pub interviewer_response: String,
    #[serde(default)]
    pub system_state: SystemState,
    #[serde(default)]
    pub avatar_state: AvatarState,
    #[serde(default)]
    pub tts_enabled: bool,
}

/// Interview stage as reported by the backend.
///
/// Only `Greeting` and `Closure` affect input gating; every other value,
/// including `Unknown`, means the interview is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    Greeting,
    #[default]
    WarmUp,
    Technical,
    Behavior,
    Closure,
    Completed,
    Terminated,
    Error,
    #[serde(other)]
    Unknown,
}

impl SystemState {
    pub fn as_label(&self) -> &'static str {
        match self {
            SystemState::Greeting => "GREETING",
            SystemState::WarmUp => "WARM_UP",
            SystemState::Technical => "TECHNICAL",
            SystemState::Behavior => "BEHAVIOR",
            SystemState::Closure => "CLOSURE",
            SystemState::Completed => "COMPLETED",
            SystemState::Terminated => "TERMINATED",
            SystemState::Error => "ERROR",
            SystemState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Avatar expression directive attached to an interviewer reply.
///
/// Unrecognized states are accepted and rendered as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarState {
    #[default]
    NeutralListening,
    AttentiveNod,
    Thinking,
    Confused,
    MildlyImpressed,
    PressureMode,
    Concluding,
    Smiling,
    Speaking,
    #[serde(other)]
    Unknown,
}

impl AvatarState {
    pub fn as_label(&self) -> &'static str {
        match self {
            AvatarState::NeutralListening => "neutral_listening",
            AvatarState::AttentiveNod => "attentive_nod",
            AvatarState::Thinking => "thinking",
            AvatarState::Confused => "confused",
            AvatarState::MildlyImpressed => "mildly_impressed",
            AvatarState::PressureMode => "pressure_mode",
            AvatarState::Concluding => "concluding",
            AvatarState::Smiling => "smiling",
            AvatarState::Speaking => "speaking",
            AvatarState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AvatarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
