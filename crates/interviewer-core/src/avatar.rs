//! Avatar output coordination: speech playback and expression drive.
//!
//! Playback is cancel-then-replace: a new `speak` aborts whatever is in
//! flight, never queues behind it. While a slot is speaking, a fixed-tick
//! viseme cycle animates its mouth through the renderer; playback end (or
//! cancellation) resets the mouth to neutral. In multi-avatar mode the
//! active slot rotates round-robin on every `speak`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use interviewer_types::AvatarState;

use crate::error::SynthesisError;
use crate::session::Input;

/// Mouth-shape update cadence during playback.
pub const VISEME_TICK: Duration = Duration::from_millis(60);

pub const MULTI_AVATAR_SLOTS: usize = 3;

const VISEME_CYCLE: [Viseme; 6] = [
    Viseme::Aa,
    Viseme::Ee,
    Viseme::Oh,
    Viseme::Sil,
    Viseme::Ee,
    Viseme::Aa,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viseme {
    Aa,
    Ee,
    Oh,
    Sil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterviewMode {
    Individual,
    Multi,
}

/// Per-slot synthesis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceProfile {
    pub rate: f32,
    pub pitch: f32,
    pub voice_id: Option<String>,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            voice_id: None,
        }
    }
}

#[derive(Debug)]
pub struct AvatarSlot {
    pub index: usize,
    pub speaking: bool,
    pub voice: VoiceProfile,
}

/// Rendering surface for avatar slots. The 3D scene behind it is out of
/// scope; the orchestrator only pushes expression and mouth state.
#[cfg_attr(test, automock)]
pub trait AvatarRenderer: Send + Sync {
    fn set_expression(&self, slot: usize, state: AvatarState);
    fn set_mouth(&self, slot: usize, viseme: Viseme);
    fn reset_mouth(&self, slot: usize);
}

/// Speech synthesis collaborator; resolves when playback finishes.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait Synthesizer: Send + Sync {
    async fn speak(&self, text: &str, voice: &VoiceProfile) -> Result<(), SynthesisError>;
}

pub struct AvatarCoordinator {
    mode: InterviewMode,
    slots: Vec<AvatarSlot>,
    active: usize,
    generation: u64,
    playback: Option<JoinHandle<()>>,
    mouth: Option<JoinHandle<()>>,
    renderer: Arc<dyn AvatarRenderer>,
    synthesizer: Arc<dyn Synthesizer>,
    inbox: mpsc::Sender<Input>,
}

impl AvatarCoordinator {
    pub fn new(
        mode: InterviewMode,
        renderer: Arc<dyn AvatarRenderer>,
        synthesizer: Arc<dyn Synthesizer>,
        inbox: mpsc::Sender<Input>,
    ) -> Self {
        let count = match mode {
            InterviewMode::Individual => 1,
            InterviewMode::Multi => MULTI_AVATAR_SLOTS,
        };
        let slots = (0..count)
            .map(|index| AvatarSlot {
                index,
                speaking: false,
                voice: VoiceProfile::default(),
            })
            .collect();
        Self {
            mode,
            slots,
            active: 0,
            generation: 0,
            playback: None,
            mouth: None,
            renderer,
            synthesizer,
            inbox,
        }
    }

    pub fn active_slot(&self) -> usize {
        self.active
    }

    pub fn slots(&self) -> &[AvatarSlot] {
        &self.slots
    }

    pub fn is_speaking(&self) -> bool {
        self.slots.iter().any(|slot| slot.speaking)
    }

    /// Drive the active slot's expression. Unknown states are accepted but
    /// rendered as a no-op.
    pub fn set_expression(&self, state: AvatarState) {
        if state == AvatarState::Unknown {
            tracing::debug!("ignoring unknown avatar state");
            return;
        }
        self.renderer.set_expression(self.active, state);
    }

    /// Start playback of one reply, canceling whatever was in flight.
    pub fn speak(&mut self, text: &str) {
        self.cancel_playback();

        if let InterviewMode::Multi = self.mode {
            self.active = (self.active + 1) % self.slots.len();
        }
        let slot = self.active;
        self.slots[slot].speaking = true;
        self.start_mouth(slot);

        self.generation += 1;
        let generation = self.generation;
        let synthesizer = self.synthesizer.clone();
        let voice = self.slots[slot].voice.clone();
        let inbox = self.inbox.clone();
        let text = text.to_string();
        self.playback = Some(tokio::spawn(async move {
            let result = synthesizer.speak(&text, &voice).await;
            if let Err(ref e) = result {
                tracing::error!("speech synthesis failed: {}", e);
            }
            if inbox
                .send(Input::PlaybackEnded {
                    generation,
                    error: result.is_err(),
                })
                .await
                .is_err()
            {
                tracing::debug!("session inbox closed before playback end");
            }
        }));
    }

    /// Abort in-flight playback, stop the mouth cycle, and reset the
    /// speaking slot to neutral.
    pub fn cancel_playback(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }
        self.stop_mouth();
        // Invalidate any end event the aborted task already posted.
        self.generation += 1;
        let active = self.active;
        if let Some(slot) = self.slots.get_mut(active)
            && slot.speaking
        {
            slot.speaking = false;
            self.renderer.reset_mouth(active);
        }
    }

    /// Handle a playback-end notification. Returns false for stale
    /// generations (a canceled playback whose end event was already queued).
    pub fn on_playback_ended(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            tracing::debug!("ignoring stale playback end");
            return false;
        }
        self.playback = None;
        self.stop_mouth();
        let active = self.active;
        self.slots[active].speaking = false;
        self.renderer.reset_mouth(active);
        true
    }

    fn start_mouth(&mut self, slot: usize) {
        self.stop_mouth();
        let renderer = self.renderer.clone();
        self.mouth = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(VISEME_TICK);
            let mut step = 0usize;
            loop {
                ticker.tick().await;
                renderer.set_mouth(slot, VISEME_CYCLE[step % VISEME_CYCLE.len()]);
                step += 1;
            }
        }));
    }

    fn stop_mouth(&mut self) {
        if let Some(mouth) = self.mouth.take() {
            mouth.abort();
        }
    }
}

impl Drop for AvatarCoordinator {
    fn drop(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }
        self.stop_mouth();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relaxed_renderer() -> MockAvatarRenderer {
        let mut renderer = MockAvatarRenderer::new();
        renderer.expect_set_expression().return_const(());
        renderer.expect_set_mouth().return_const(());
        renderer.expect_reset_mouth().return_const(());
        renderer
    }

    fn instant_synthesizer() -> MockSynthesizer {
        let mut synthesizer = MockSynthesizer::new();
        synthesizer
            .expect_speak()
            .returning(|_, _| Box::pin(async { Ok(()) }));
        synthesizer
    }

    fn slow_synthesizer() -> MockSynthesizer {
        let mut synthesizer = MockSynthesizer::new();
        synthesizer.expect_speak().returning(|_, _| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
        });
        synthesizer
    }

    fn playback_generation(input: Input) -> u64 {
        match input {
            Input::PlaybackEnded { generation, .. } => generation,
            _ => panic!("expected playback end"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn multi_mode_rotates_round_robin() {
        let (tx, _rx) = mpsc::channel(8);
        let mut avatar = AvatarCoordinator::new(
            InterviewMode::Multi,
            Arc::new(relaxed_renderer()),
            Arc::new(slow_synthesizer()),
            tx,
        );

        let mut visited = Vec::new();
        for _ in 0..MULTI_AVATAR_SLOTS {
            avatar.speak("next question");
            visited.push(avatar.active_slot());
        }
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn individual_mode_always_slot_zero() {
        let (tx, _rx) = mpsc::channel(8);
        let mut avatar = AvatarCoordinator::new(
            InterviewMode::Individual,
            Arc::new(relaxed_renderer()),
            Arc::new(slow_synthesizer()),
            tx,
        );

        for _ in 0..4 {
            avatar.speak("hello");
            assert_eq!(avatar.active_slot(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_slot_speaks() {
        let (tx, _rx) = mpsc::channel(8);
        let mut avatar = AvatarCoordinator::new(
            InterviewMode::Multi,
            Arc::new(relaxed_renderer()),
            Arc::new(slow_synthesizer()),
            tx,
        );

        avatar.speak("first");
        avatar.speak("second");
        avatar.speak("third");

        let speaking = avatar.slots().iter().filter(|slot| slot.speaking).count();
        assert_eq!(speaking, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_end_does_not_silence_replacement() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut avatar = AvatarCoordinator::new(
            InterviewMode::Individual,
            Arc::new(relaxed_renderer()),
            Arc::new(instant_synthesizer()),
            tx,
        );

        avatar.speak("short reply");
        tokio::task::yield_now().await;
        let stale = playback_generation(rx.recv().await.unwrap());

        // Replacement starts before the first end event is handled.
        avatar.speak("follow-up");
        assert!(!avatar.on_playback_ended(stale));
        assert!(avatar.is_speaking());

        tokio::task::yield_now().await;
        let current = playback_generation(rx.recv().await.unwrap());
        assert!(avatar.on_playback_ended(current));
        assert!(!avatar.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_resets_speaking_state() {
        let (tx, _rx) = mpsc::channel(8);
        let mut avatar = AvatarCoordinator::new(
            InterviewMode::Individual,
            Arc::new(relaxed_renderer()),
            Arc::new(slow_synthesizer()),
            tx,
        );

        avatar.speak("interrupted");
        assert!(avatar.is_speaking());
        avatar.cancel_playback();
        assert!(!avatar.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn mouth_cycle_ticks_during_playback() {
        let (tx, _rx) = mpsc::channel(8);
        let mut renderer = MockAvatarRenderer::new();
        renderer.expect_set_expression().return_const(());
        renderer.expect_reset_mouth().return_const(());
        renderer.expect_set_mouth().times(3..).return_const(());

        let mut avatar = AvatarCoordinator::new(
            InterviewMode::Individual,
            Arc::new(renderer),
            Arc::new(slow_synthesizer()),
            tx,
        );

        avatar.speak("a long-winded answer");
        tokio::time::sleep(Duration::from_millis(200)).await;
        avatar.cancel_playback();
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_expression_is_a_no_op() {
        let (tx, _rx) = mpsc::channel(8);
        let mut renderer = MockAvatarRenderer::new();
        renderer.expect_set_expression().times(0);

        let avatar = AvatarCoordinator::new(
            InterviewMode::Individual,
            Arc::new(renderer),
            Arc::new(instant_synthesizer()),
            tx,
        );

        avatar.set_expression(AvatarState::Unknown);
    }
}
