//! Terminal rendering of the session surface.

use interviewer_core::presenter::{
    ConnectionIndicator, Cue, MicIndicator, Presenter, Speaker,
};
use interviewer_types::{AvatarState, ObservationSnapshot, Report, SystemState, Warning};

pub struct TerminalPresenter;

impl TerminalPresenter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for TerminalPresenter {
    fn append_message(&self, speaker: Speaker, text: &str) {
        let label = match speaker {
            Speaker::Candidate => "you",
            Speaker::Interviewer => "interviewer",
            Speaker::System => "system",
        };
        println!("[{label}] {text}");
    }

    fn set_stage(&self, stage: SystemState) {
        println!("-- stage: {stage}");
    }

    fn set_avatar_state(&self, state: AvatarState) {
        tracing::debug!("avatar state: {}", state);
    }

    fn set_connection(&self, state: ConnectionIndicator) {
        let label = match state {
            ConnectionIndicator::Idle => "idle",
            ConnectionIndicator::Connecting => "connecting...",
            ConnectionIndicator::Connected => "connected",
            ConnectionIndicator::Disconnected => "disconnected",
        };
        println!("-- connection: {label}");
    }

    fn set_input_enabled(&self, enabled: bool) {
        tracing::debug!("input enabled: {}", enabled);
    }

    fn set_input_preview(&self, text: &str) {
        if !text.is_empty() {
            println!("   ... {text}");
        }
    }

    fn set_input_hint(&self, hint: &str) {
        println!("-- {hint}");
    }

    fn set_mic(&self, state: MicIndicator) {
        match state {
            MicIndicator::Listening => println!("-- microphone on"),
            MicIndicator::Idle => println!("-- microphone off"),
        }
    }

    fn set_continuous(&self, enabled: bool) {
        tracing::debug!("continuous mode: {}", enabled);
    }

    fn set_speaking_indicator(&self, speaking: bool) {
        tracing::debug!("candidate speaking: {}", speaking);
    }

    fn update_metrics(&self, snapshot: &ObservationSnapshot) {
        tracing::debug!("{}", format_metrics(snapshot));
    }

    fn show_warnings(&self, warnings: &[Warning]) {
        for warning in warnings {
            println!("!! [{:?}] {}", warning.severity, warning.message);
        }
    }

    fn clear_warnings(&self) {}

    fn show_report(&self, report: &Report) {
        print!("{}", format_report(report));
    }

    fn alert(&self, message: &str) {
        eprintln!("!! {message}");
    }

    fn request_consent(&self) {
        println!(
            "Camera and microphone access is required. Type :accept to continue or :decline to cancel."
        );
    }

    fn play_cue(&self, cue: Cue) {
        match cue {
            Cue::MicActivated => println!("(listening)"),
        }
    }
}

fn format_metrics(snapshot: &ObservationSnapshot) -> String {
    let eye = match snapshot.eye_contact_score() {
        Some(score) => format!("{score}/10"),
        None => "no face".to_string(),
    };
    let voice = match snapshot.voice_score() {
        Some(score) => format!("{score}/10"),
        None => "calibrating".to_string(),
    };
    format!(
        "eye contact {} | focus {}/10 | stress {:?} | voice {}",
        eye,
        snapshot.focus_score(),
        snapshot.stress_level(),
        voice
    )
}

fn format_report(report: &Report) -> String {
    let mut out = String::new();
    out.push_str("==============================================\n");
    out.push_str("  Behavioral report\n");
    out.push_str("==============================================\n");
    out.push_str(&format!("  Eye contact      {:>5.1}/10\n", report.eye_contact_score));
    out.push_str(&format!("  Focus            {:>5.1}/10\n", report.focus_score));
    out.push_str(&format!("  Voice confidence {:>5.1}/10\n", report.voice_confidence));
    if let Some(stress) = &report.stress_level {
        out.push_str(&format!("  Stress level     {stress}\n"));
    }
    if !report.behavioral_strengths.is_empty() {
        out.push_str("  Strengths:\n");
        for item in &report.behavioral_strengths {
            out.push_str(&format!("    + {item}\n"));
        }
    }
    if !report.behavioral_improvements.is_empty() {
        out.push_str("  Improvements:\n");
        for item in &report.behavioral_improvements {
            out.push_str(&format!("    - {item}\n"));
        }
    }
    if let Some(readiness) = &report.overall_interview_readiness {
        out.push_str(&format!("  Overall readiness: {readiness}\n"));
    }
    out.push_str(&format!(
        "  Session duration: {:.0} s\n",
        report.session_duration
    ));
    out.push_str("==============================================\n");
    out
}
