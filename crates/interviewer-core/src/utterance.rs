//! Debounced utterance accumulation.
//!
//! Recognition events stream in as interim fragments (each superseding the
//! last) and final fragments (appended permanently). A 3-second silence
//! window after the last event finalizes the utterance. The timer is a
//! spawned task posting back to the session inbox; arming a new timer always
//! aborts the previous handle and bumps a generation counter, so a fire that
//! was already in flight when its timer was superseded is recognizably stale.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::Input;

/// Silence gap after the last recognition event before an utterance is
/// considered complete.
pub const SILENCE_WINDOW: Duration = Duration::from_millis(3000);

pub struct UtteranceAccumulator {
    final_text: String,
    interim_text: String,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    window: Duration,
    inbox: mpsc::Sender<Input>,
}

impl UtteranceAccumulator {
    pub fn new(inbox: mpsc::Sender<Input>) -> Self {
        Self::with_window(inbox, SILENCE_WINDOW)
    }

    pub fn with_window(inbox: mpsc::Sender<Input>, window: Duration) -> Self {
        Self {
            final_text: String::new(),
            interim_text: String::new(),
            generation: 0,
            timer: None,
            window,
            inbox,
        }
    }

    /// Reset for a fresh capture cycle.
    pub fn begin(&mut self) {
        self.cancel_timer();
        self.final_text.clear();
        self.interim_text.clear();
    }

    /// Latest interim hypothesis; supersedes the previous one.
    pub fn on_interim(&mut self, text: &str) -> String {
        self.interim_text = text.to_string();
        self.arm_timer();
        self.display()
    }

    /// Confirmed fragment; appended permanently.
    pub fn on_final(&mut self, text: &str) -> String {
        self.final_text.push_str(text);
        self.final_text.push(' ');
        self.interim_text.clear();
        self.arm_timer();
        self.display()
    }

    /// Text shown in the input preview: confirmed fragments plus the
    /// current interim hypothesis.
    pub fn display(&self) -> String {
        format!("{}{}", self.final_text, self.interim_text)
    }

    pub fn has_text(&self) -> bool {
        !self.final_text.trim().is_empty()
    }

    /// Whether a silence fire with this generation belongs to the timer
    /// that is currently armed.
    pub fn is_current(&self, generation: u64) -> bool {
        self.timer.is_some() && self.generation == generation
    }

    /// Cancel the timer and take the accumulated text, if any.
    pub fn finalize(&mut self) -> Option<String> {
        self.cancel_timer();
        let text = self.final_text.trim().to_string();
        self.final_text.clear();
        self.interim_text.clear();
        if text.is_empty() { None } else { Some(text) }
    }

    /// Cancel the timer and drop the buffer without emitting.
    pub fn discard(&mut self) {
        self.cancel_timer();
        self.final_text.clear();
        self.interim_text.clear();
    }

    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        // A fire already posted by the aborted task must not match.
        self.generation += 1;
    }

    fn arm_timer(&mut self) {
        self.cancel_timer();
        let generation = self.generation;
        let window = self.window;
        let inbox = self.inbox.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if inbox
                .send(Input::SilenceElapsed { generation })
                .await
                .is_err()
            {
                tracing::debug!("session inbox closed before silence fire");
            }
        }));
    }
}
