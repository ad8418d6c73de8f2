//! Top-level session state machine.
//!
//! The controller runs as a single task consuming an `Input` inbox. Every
//! other component (channel receive task, silence timer, playback task,
//! observation poller, audio meter, user commands) posts into that inbox, so
//! all session state is owned and mutated in one place and every
//! side-effecting action sits behind an explicit state check. Outbound
//! messages are serialized by the turn-state gate: while one is unanswered,
//! further submissions are rejected, never queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use interviewer_channel::{self as channel, ChannelEvent};
use interviewer_types::{
    CandidateMessage, InterviewerMessage, ObservationSnapshot, Report, SystemState, Warning,
};

use crate::avatar::{AvatarCoordinator, AvatarRenderer, InterviewMode, Synthesizer};
use crate::capture::{SpeechCapture, SpeechEvent};
use crate::error::CaptureError;
use crate::observation::{self, FrameSource, ObservationApi, ObservationPoller};
use crate::presenter::{ConnectionIndicator, Cue, MicIndicator, Presenter, Speaker};
use crate::utterance::{self, UtteranceAccumulator};

/// Pause between playback end and automatic microphone re-activation in
/// continuous mode.
pub const SETTLE_DELAY: Duration = Duration::from_millis(800);

/// Microphone RMS level above which the candidate counts as speaking.
pub const DEFAULT_SPEAKING_THRESHOLD: f32 = 0.02;

const INBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

/// Gates whether the candidate may send the next message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingGreeting,
    ReadyForInput,
    WaitingForBackend,
    /// Terminal for the connected branch: the backend sent CLOSURE and input
    /// stays disabled until the user reconnects.
    Closed,
}

/// One unit of work for the session task.
pub enum Input {
    StartRequested,
    ConsentGranted,
    ConsentDeclined,
    EndRequested,
    /// Typed submission from the input box.
    Submit(String),
    MicToggled,
    ContinuousToggled,
    Speech(SpeechEvent),
    /// The utterance silence window elapsed. Stale generations are ignored.
    SilenceElapsed { generation: u64 },
    /// Speech playback finished or failed. Stale generations are ignored.
    PlaybackEnded { generation: u64, error: bool },
    /// The continuous-mode settle delay elapsed.
    RemicElapsed { generation: u64 },
    ConnectFinished(Result<channel::Client, channel::ChannelError>),
    Channel(ChannelEvent),
    Observation {
        snapshot: Option<ObservationSnapshot>,
        warnings: Vec<Warning>,
    },
    ReportReady(Option<Report>),
    /// Microphone RMS from the level meter; drives the speaking indicator.
    AudioLevel(f32),
    Shutdown,
}

#[derive(Clone)]
pub struct SessionConfig {
    pub channel: channel::Config,
    pub mode: InterviewMode,
    /// Initial continuous-mode setting; toggleable during the session.
    pub continuous: bool,
    pub poll_interval: Duration,
    pub frame_interval: Duration,
    pub silence_window: Duration,
    pub settle_delay: Duration,
    pub speaking_threshold: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: channel::Config::default(),
            mode: InterviewMode::Individual,
            continuous: false,
            poll_interval: observation::DEFAULT_POLL_INTERVAL,
            frame_interval: observation::DEFAULT_FRAME_INTERVAL,
            silence_window: utterance::SILENCE_WINDOW,
            settle_delay: SETTLE_DELAY,
            speaking_threshold: DEFAULT_SPEAKING_THRESHOLD,
        }
    }
}

/// External surfaces the orchestrator drives. Their implementations are out
/// of scope; the session only talks to these interfaces.
pub struct Collaborators {
    pub presenter: Arc<dyn Presenter>,
    pub renderer: Arc<dyn AvatarRenderer>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub capture: Arc<dyn SpeechCapture>,
    pub observation: Arc<dyn ObservationApi>,
    pub frames: Option<Arc<dyn FrameSource>>,
}

pub struct Session {
    config: SessionConfig,
    connection_state: ConnectionState,
    turn_state: TurnState,
    continuous: bool,
    consent_granted: bool,
    start_pending: bool,
    capture_active: bool,
    speaking: bool,
    had_session: bool,
    client: Option<channel::Client>,
    connect_task: Option<JoinHandle<()>>,
    channel_task: Option<JoinHandle<()>>,
    remic_generation: u64,
    remic_timer: Option<JoinHandle<()>>,
    accumulator: UtteranceAccumulator,
    avatar: AvatarCoordinator,
    poller: ObservationPoller,
    capture: Arc<dyn SpeechCapture>,
    presenter: Arc<dyn Presenter>,
    inbox_tx: mpsc::Sender<Input>,
    inbox_rx: mpsc::Receiver<Input>,
}

impl Session {
    pub fn new(config: SessionConfig, collaborators: Collaborators) -> (Self, mpsc::Sender<Input>) {
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let accumulator =
            UtteranceAccumulator::with_window(inbox_tx.clone(), config.silence_window);
        let avatar = AvatarCoordinator::new(
            config.mode,
            collaborators.renderer,
            collaborators.synthesizer,
            inbox_tx.clone(),
        );
        let poller = ObservationPoller::new(
            collaborators.observation,
            collaborators.frames,
            inbox_tx.clone(),
        );
        let continuous = config.continuous;
        let session = Self {
            config,
            connection_state: ConnectionState::Idle,
            turn_state: TurnState::Idle,
            continuous,
            consent_granted: false,
            start_pending: false,
            capture_active: false,
            speaking: false,
            had_session: false,
            client: None,
            connect_task: None,
            channel_task: None,
            remic_generation: 0,
            remic_timer: None,
            accumulator,
            avatar,
            poller,
            capture: collaborators.capture,
            presenter: collaborators.presenter,
            inbox_tx: inbox_tx.clone(),
            inbox_rx,
        };
        (session, inbox_tx)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn_state
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn capture_active(&self) -> bool {
        self.capture_active
    }

    /// Consume the inbox until shutdown. Handlers absorb their own failures,
    /// so no single input can kill the loop.
    pub async fn run(mut self) {
        while self.step().await {}
        tracing::debug!("session task finished");
    }

    async fn step(&mut self) -> bool {
        let Some(input) = self.inbox_rx.recv().await else {
            return false;
        };
        self.handle_input(input).await
    }

    async fn handle_input(&mut self, input: Input) -> bool {
        match input {
            Input::StartRequested => self.on_start_requested().await,
            Input::ConsentGranted => {
                self.consent_granted = true;
                if self.start_pending {
                    self.start_pending = false;
                    self.begin_session().await;
                }
            }
            Input::ConsentDeclined => {
                self.start_pending = false;
                self.presenter
                    .alert("Camera and microphone access is required for the interview.");
            }
            Input::EndRequested => self.end_session().await,
            Input::Submit(text) => self.on_submit(text).await,
            Input::MicToggled => self.on_mic_toggled().await,
            Input::ContinuousToggled => self.on_continuous_toggled(),
            Input::Speech(event) => self.on_speech(event),
            Input::SilenceElapsed { generation } => self.on_silence(generation).await,
            Input::PlaybackEnded { generation, error } => self.on_playback_ended(generation, error),
            Input::RemicElapsed { generation } => self.on_remic(generation),
            Input::ConnectFinished(result) => self.on_connect_finished(result).await,
            Input::Channel(ChannelEvent::Message(message)) => {
                self.on_interviewer_message(message)
            }
            Input::Channel(ChannelEvent::Closed { graceful }) => {
                self.on_channel_closed(graceful).await
            }
            Input::Observation { snapshot, warnings } => {
                if let Some(snapshot) = snapshot {
                    self.presenter.update_metrics(&snapshot);
                }
                // The warning set reflects the current instant only.
                if warnings.is_empty() {
                    self.presenter.clear_warnings();
                } else {
                    self.presenter.show_warnings(&warnings);
                }
            }
            Input::ReportReady(report) => match report {
                Some(report) => self.presenter.show_report(&report),
                None => self.presenter.append_message(
                    Speaker::System,
                    "No behavioral data was collected for this session.",
                ),
            },
            Input::AudioLevel(level) => {
                let speaking = level >= self.config.speaking_threshold;
                if speaking != self.speaking {
                    self.speaking = speaking;
                    self.presenter.set_speaking_indicator(speaking);
                }
            }
            Input::Shutdown => {
                self.end_session().await;
                return false;
            }
        }
        true
    }

    async fn on_start_requested(&mut self) {
        match self.connection_state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                tracing::debug!("session start requested while already in progress");
            }
            ConnectionState::Idle | ConnectionState::Disconnected => {
                if self.consent_granted {
                    self.begin_session().await;
                } else {
                    self.start_pending = true;
                    self.presenter.request_consent();
                }
            }
        }
    }

    async fn begin_session(&mut self) {
        self.connection_state = ConnectionState::Connecting;
        self.turn_state = TurnState::Idle;
        self.presenter.set_connection(ConnectionIndicator::Connecting);

        // A previous session's state must not leak into this one.
        if self.had_session {
            self.poller.reset().await;
        }
        self.poller
            .start(self.config.poll_interval, self.config.frame_interval)
            .await;

        let config = self.config.channel.clone();
        let inbox = self.inbox_tx.clone();
        self.connect_task = Some(tokio::spawn(async move {
            let result = channel::connect(config).await;
            if inbox.send(Input::ConnectFinished(result)).await.is_err() {
                tracing::debug!("session inbox closed before connect finished");
            }
        }));
    }

    async fn on_connect_finished(
        &mut self,
        result: Result<channel::Client, channel::ChannelError>,
    ) {
        self.connect_task = None;
        if self.connection_state != ConnectionState::Connecting {
            tracing::debug!("discarding connect result after session reset");
            if let Ok(mut client) = result {
                client.close().await;
            }
            return;
        }
        match result {
            Ok(mut client) => {
                match client.events() {
                    Ok(mut events) => {
                        let inbox = self.inbox_tx.clone();
                        self.channel_task = Some(tokio::spawn(async move {
                            loop {
                                match events.recv().await {
                                    Ok(event) => {
                                        if inbox.send(Input::Channel(event)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(broadcast::error::RecvError::Lagged(n)) => {
                                        tracing::warn!("channel events lagged by {}", n);
                                    }
                                    Err(broadcast::error::RecvError::Closed) => break,
                                }
                            }
                        }));
                    }
                    Err(e) => tracing::error!("failed to subscribe to channel events: {}", e),
                }
                self.client = Some(client);
                self.connection_state = ConnectionState::Connected;
                self.turn_state = TurnState::AwaitingGreeting;
                self.presenter.set_connection(ConnectionIndicator::Connected);
                self.presenter.set_input_enabled(false);
                self.presenter.set_input_hint("Waiting for the interviewer...");
            }
            Err(e) => {
                tracing::error!("failed to open session channel: {}", e);
                self.presenter
                    .alert(&format!("Could not reach the interview server: {}", e));
                self.end_session().await;
            }
        }
    }

    fn on_interviewer_message(&mut self, message: InterviewerMessage) {
        if self.connection_state != ConnectionState::Connected {
            tracing::debug!("dropping interviewer message outside a connected session");
            return;
        }
        self.presenter.set_stage(message.system_state);
        self.presenter.set_avatar_state(message.avatar_state);
        if !message.interviewer_response.is_empty() {
            self.presenter
                .append_message(Speaker::Interviewer, &message.interviewer_response);
        }

        if self.turn_state == TurnState::Closed {
            // Closure is terminal until reconnect; later messages are shown
            // but never re-enable input.
            tracing::debug!("interviewer message after closure; input stays disabled");
        } else {
            match message.system_state {
                SystemState::Closure => {
                    self.turn_state = TurnState::Closed;
                    if self.continuous {
                        self.continuous = false;
                        self.presenter.set_continuous(false);
                    }
                    self.cancel_remic();
                    self.stop_capture();
                    self.accumulator.discard();
                    self.presenter.set_input_enabled(false);
                    self.presenter.set_input_hint("The interview has concluded.");
                    self.presenter.append_message(
                        Speaker::System,
                        "The interview has concluded. End the session to see your report.",
                    );
                }
                SystemState::Greeting => {
                    self.turn_state = TurnState::ReadyForInput;
                    self.presenter.set_input_enabled(true);
                    self.presenter
                        .set_input_hint("Introduce yourself when you are ready.");
                }
                _ => {
                    self.turn_state = TurnState::ReadyForInput;
                    self.presenter.set_input_enabled(true);
                    self.presenter
                        .set_input_hint("Type your answer or use the microphone.");
                }
            }
        }

        self.avatar.set_expression(message.avatar_state);
        if message.tts_enabled && !message.interviewer_response.is_empty() {
            self.cancel_remic();
            self.avatar.speak(&message.interviewer_response);
        }
    }

    async fn on_channel_closed(&mut self, graceful: bool) {
        if self.connection_state != ConnectionState::Connected {
            tracing::debug!("close event outside a connected session (graceful: {})", graceful);
            return;
        }
        tracing::info!("session channel closed (graceful: {})", graceful);
        self.presenter
            .append_message(Speaker::System, "Connection to the interviewer was closed.");
        self.end_session().await;
    }

    async fn on_submit(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        if self.turn_state != TurnState::ReadyForInput
            || self.connection_state != ConnectionState::Connected
        {
            tracing::warn!(
                "submission rejected in turn state {:?} / connection state {:?}",
                self.turn_state,
                self.connection_state
            );
            return;
        }
        if self.client.is_none() {
            tracing::error!("submission while no channel client is attached");
            return;
        }

        self.stop_capture();
        self.accumulator.discard();
        self.cancel_remic();
        self.presenter.append_message(Speaker::Candidate, &text);
        self.presenter.set_input_preview("");
        let sent = match self.client.as_ref() {
            Some(client) => client.send(CandidateMessage::new(text)).await,
            None => return,
        };
        if let Err(e) = sent {
            // The channel will report its closure separately.
            tracing::error!("failed to send candidate message: {}", e);
            return;
        }
        self.turn_state = TurnState::WaitingForBackend;
        self.presenter.set_input_enabled(false);
        self.presenter.set_input_hint("Waiting for the interviewer...");
    }

    async fn on_mic_toggled(&mut self) {
        // A retained buffer counts as an active capture concern even if the
        // recognizer itself already wound down.
        if self.capture_active || self.accumulator.has_text() {
            self.stop_capture();
            if self.accumulator.has_text()
                && self.turn_state == TurnState::ReadyForInput
                && self.connection_state == ConnectionState::Connected
            {
                if let Some(text) = self.accumulator.finalize() {
                    self.on_submit(text).await;
                }
            } else {
                self.accumulator.discard();
                self.presenter.set_input_preview("");
            }
        } else {
            if self.connection_state != ConnectionState::Connected
                || self.turn_state != TurnState::ReadyForInput
            {
                tracing::debug!("microphone requested while input is disabled");
                return;
            }
            self.start_capture();
        }
    }

    fn start_capture(&mut self) {
        self.accumulator.begin();
        self.presenter.set_input_preview("");
        match self.capture.start() {
            Ok(()) => {
                self.capture_active = true;
                self.presenter.play_cue(Cue::MicActivated);
                self.presenter.set_mic(MicIndicator::Listening);
            }
            Err(CaptureError::PermissionDenied) => {
                self.presenter.alert("Microphone permission was denied.");
            }
            Err(e) => {
                self.presenter
                    .append_message(Speaker::System, &format!("Speech capture is unavailable: {}", e));
            }
        }
    }

    fn stop_capture(&mut self) {
        if self.capture_active {
            self.capture.stop();
            self.capture_active = false;
            self.presenter.set_mic(MicIndicator::Idle);
        }
    }

    fn on_speech(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Started => self.presenter.set_mic(MicIndicator::Listening),
            SpeechEvent::Interim(text) => {
                let display = self.accumulator.on_interim(&text);
                self.presenter.set_input_preview(&display);
            }
            SpeechEvent::Final(text) => {
                let display = self.accumulator.on_final(&text);
                self.presenter.set_input_preview(&display);
            }
            SpeechEvent::Ended => {
                self.capture_active = false;
                self.presenter.set_mic(MicIndicator::Idle);
            }
            SpeechEvent::Error(CaptureError::NoSpeech) => {
                // Intentionally silent: capture ends and the mic resets.
                self.capture_active = false;
                self.presenter.set_mic(MicIndicator::Idle);
            }
            SpeechEvent::Error(e) => {
                self.capture_active = false;
                self.presenter.set_mic(MicIndicator::Idle);
                self.presenter
                    .append_message(Speaker::System, &format!("Speech recognition error: {}", e));
            }
        }
    }

    async fn on_silence(&mut self, generation: u64) {
        if !self.accumulator.is_current(generation) {
            tracing::debug!("ignoring stale silence fire");
            return;
        }
        if self.turn_state == TurnState::ReadyForInput
            && self.connection_state == ConnectionState::Connected
            && self.accumulator.has_text()
        {
            self.stop_capture();
            if let Some(text) = self.accumulator.finalize() {
                self.on_submit(text).await;
            }
        } else {
            // A reply is still outstanding (or the buffer is empty); keep
            // accumulating and let an explicit mic stop decide.
            tracing::debug!("silence elapsed while input is gated; keeping buffer");
        }
    }

    fn on_playback_ended(&mut self, generation: u64, error: bool) {
        if !self.avatar.on_playback_ended(generation) {
            return;
        }
        if error {
            return;
        }
        if self.continuous
            && self.connection_state == ConnectionState::Connected
            && self.turn_state == TurnState::ReadyForInput
            && !self.capture_active
        {
            self.arm_remic();
        }
    }

    fn on_remic(&mut self, generation: u64) {
        if self.remic_timer.is_none() || generation != self.remic_generation {
            tracing::debug!("ignoring stale re-mic fire");
            return;
        }
        self.remic_timer = None;
        if self.connection_state == ConnectionState::Connected
            && self.turn_state == TurnState::ReadyForInput
            && !self.capture_active
        {
            self.start_capture();
        }
    }

    fn arm_remic(&mut self) {
        self.cancel_remic();
        let generation = self.remic_generation;
        let delay = self.config.settle_delay;
        let inbox = self.inbox_tx.clone();
        self.remic_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inbox.send(Input::RemicElapsed { generation }).await.is_err() {
                tracing::debug!("session inbox closed before re-mic fire");
            }
        }));
    }

    fn cancel_remic(&mut self) {
        if let Some(timer) = self.remic_timer.take() {
            timer.abort();
        }
        self.remic_generation += 1;
    }

    fn on_continuous_toggled(&mut self) {
        if self.turn_state == TurnState::Closed {
            tracing::debug!("continuous mode stays off after closure");
            return;
        }
        self.continuous = !self.continuous;
        self.presenter.set_continuous(self.continuous);
        self.presenter.append_message(
            Speaker::System,
            if self.continuous {
                "Continuous conversation enabled."
            } else {
                "Continuous conversation disabled."
            },
        );
        if !self.continuous {
            self.cancel_remic();
        }
    }

    /// Tear the session down to a well-defined idle state: cancel playback
    /// and timers, stop capture, close the channel, stop telemetry and drain
    /// the report. Safe to call from any state.
    async fn end_session(&mut self) {
        self.start_pending = false;
        self.cancel_remic();
        self.avatar.cancel_playback();
        self.stop_capture();
        self.accumulator.discard();
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        if let Some(task) = self.channel_task.take() {
            task.abort();
        }
        if let Some(mut client) = self.client.take() {
            client.close().await;
        }
        self.poller.stop();

        let indicator = if self.connection_state == ConnectionState::Connected {
            self.connection_state = ConnectionState::Disconnected;
            ConnectionIndicator::Disconnected
        } else {
            self.connection_state = ConnectionState::Idle;
            ConnectionIndicator::Idle
        };
        self.had_session = true;
        self.turn_state = TurnState::Idle;
        self.presenter.set_connection(indicator);
        self.presenter.set_input_enabled(false);
        self.presenter.set_input_preview("");
        self.presenter.clear_warnings();
        if self.speaking {
            self.speaking = false;
            self.presenter.set_speaking_indicator(false);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        if let Some(task) = self.channel_task.take() {
            task.abort();
        }
        if let Some(timer) = self.remic_timer.take() {
            timer.abort();
        }
    }
}
