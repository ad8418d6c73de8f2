//! Device collaborator stand-ins for the terminal client.
//!
//! Speech recognition and speech synthesis are external collaborators; this
//! binary ships a recognizer that reports itself unavailable (matching a
//! platform without one) and a synthesizer that paces playback by word count
//! so completion events and mouth-cycle lifetimes behave like a real engine.

use std::time::Duration;

use async_trait::async_trait;

use interviewer_core::avatar::{AvatarRenderer, Synthesizer, Viseme, VoiceProfile};
use interviewer_core::capture::SpeechCapture;
use interviewer_core::error::{CaptureError, SynthesisError};
use interviewer_types::AvatarState;

/// Baseline speaking pace at voice rate 1.0.
const WORDS_PER_SECOND: f32 = 2.8;

/// Recognizer stand-in for platforms without a speech engine.
#[derive(Default)]
pub struct RecognizerUnavailable;

impl SpeechCapture for RecognizerUnavailable {
    fn start(&self) -> Result<(), CaptureError> {
        Err(CaptureError::Unavailable)
    }

    fn stop(&self) {}
}

/// Synthesizer that sleeps for the estimated playback time of the text.
#[derive(Default)]
pub struct PacedSynthesizer;

pub fn playback_duration(text: &str, rate: f32) -> Duration {
    let words = text.split_whitespace().count().max(1) as f32;
    let rate = rate.max(0.1);
    Duration::from_secs_f32(words / (WORDS_PER_SECOND * rate))
}

#[async_trait]
impl Synthesizer for PacedSynthesizer {
    async fn speak(&self, text: &str, voice: &VoiceProfile) -> Result<(), SynthesisError> {
        tokio::time::sleep(playback_duration(text, voice.rate)).await;
        Ok(())
    }
}

/// Renderer that traces expression and mouth updates instead of driving a
/// 3D scene.
#[derive(Default)]
pub struct LoggingRenderer;

impl AvatarRenderer for LoggingRenderer {
    fn set_expression(&self, slot: usize, state: AvatarState) {
        tracing::info!("avatar {} expression -> {}", slot, state);
    }

    fn set_mouth(&self, slot: usize, viseme: Viseme) {
        tracing::trace!("avatar {} mouth -> {:?}", slot, viseme);
    }

    fn reset_mouth(&self, slot: usize) {
        tracing::trace!("avatar {} mouth reset", slot);
    }
}
