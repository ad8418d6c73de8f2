//! Behavioral telemetry: frame upload, analysis polling, terminal report.
//!
//! The poller runs independently of message traffic once a session is
//! active. Every poll and every frame upload is fire-and-forget: a failure
//! is logged and skipped, never retried synchronously, and never blocks the
//! next scheduled tick. Stopping tears both loops down first and then
//! performs exactly one terminal report fetch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use interviewer_types::{LatestObservation, Report, ReportEnvelope, StartResponse};

use crate::error::TelemetryError;
use crate::session::Input;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Frame upload cadence, independent of the analysis poll cadence.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(167);

/// Log only one in N frame-upload failures.
const FRAME_ERROR_SAMPLE: u64 = 10;

/// The observation collaborator's HTTP surface.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait ObservationApi: Send + Sync {
    async fn start(&self) -> Result<StartResponse, TelemetryError>;
    async fn add_frame(&self, frame_jpeg: Vec<u8>) -> Result<(), TelemetryError>;
    async fn stop(&self) -> Result<(), TelemetryError>;
    async fn latest(&self) -> Result<LatestObservation, TelemetryError>;
    async fn report(&self) -> Result<Option<Report>, TelemetryError>;
    async fn reset(&self) -> Result<(), TelemetryError>;
}

/// Supplies encoded JPEG frames from the capture rig; the camera itself is
/// an external collaborator.
#[cfg_attr(test, automock)]
pub trait FrameSource: Send + Sync {
    fn next_frame(&self) -> Option<Vec<u8>>;
}

pub struct ObservationHttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl ObservationHttpClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn poll_failed(e: reqwest::Error) -> TelemetryError {
    TelemetryError::PollFailed(e.to_string())
}

#[async_trait]
impl ObservationApi for ObservationHttpClient {
    async fn start(&self) -> Result<StartResponse, TelemetryError> {
        let response = self
            .http
            .post(self.url("/observation/start"))
            .send()
            .await
            .map_err(poll_failed)?;
        response.json::<StartResponse>().await.map_err(poll_failed)
    }

    async fn add_frame(&self, frame_jpeg: Vec<u8>) -> Result<(), TelemetryError> {
        let body = serde_json::json!({ "frame_data": BASE64.encode(&frame_jpeg) });
        self.http
            .post(self.url("/observation/add_video_frame"))
            .json(&body)
            .send()
            .await
            .map_err(poll_failed)?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), TelemetryError> {
        self.http
            .post(self.url("/observation/stop"))
            .send()
            .await
            .map_err(poll_failed)?;
        Ok(())
    }

    async fn latest(&self) -> Result<LatestObservation, TelemetryError> {
        let response = self
            .http
            .get(self.url("/observation/latest"))
            .send()
            .await
            .map_err(poll_failed)?;
        response
            .json::<LatestObservation>()
            .await
            .map_err(poll_failed)
    }

    async fn report(&self) -> Result<Option<Report>, TelemetryError> {
        let response = self
            .http
            .get(self.url("/observation/report"))
            .send()
            .await
            .map_err(poll_failed)?;
        let envelope = response.json::<ReportEnvelope>().await.map_err(poll_failed)?;
        Ok(envelope.report)
    }

    async fn reset(&self) -> Result<(), TelemetryError> {
        self.http
            .post(self.url("/observation/reset"))
            .send()
            .await
            .map_err(poll_failed)?;
        Ok(())
    }
}

pub struct ObservationPoller {
    api: Arc<dyn ObservationApi>,
    frames: Option<Arc<dyn FrameSource>>,
    inbox: mpsc::Sender<Input>,
    poll_task: Option<JoinHandle<()>>,
    frame_task: Option<JoinHandle<()>>,
    stopped: bool,
}

impl ObservationPoller {
    pub fn new(
        api: Arc<dyn ObservationApi>,
        frames: Option<Arc<dyn FrameSource>>,
        inbox: mpsc::Sender<Input>,
    ) -> Self {
        Self {
            api,
            frames,
            inbox,
            poll_task: None,
            frame_task: None,
            stopped: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.poll_task.is_some()
    }

    /// Start the collaborator and both loops. A rejected or failed start is
    /// logged and polling proceeds; the collaborator may come up later.
    pub async fn start(&mut self, poll_interval: Duration, frame_interval: Duration) {
        if self.poll_task.is_some() {
            tracing::debug!("observation poller already running");
            return;
        }
        self.stopped = false;

        match self.api.start().await {
            Ok(ack) if !ack.success => {
                tracing::warn!("observation collaborator rejected start")
            }
            Err(e) => tracing::warn!("failed to start observation: {}", e),
            Ok(_) => {}
        }

        let api = self.api.clone();
        let inbox = self.inbox.clone();
        self.poll_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match api.latest().await {
                    Ok(latest) => {
                        let update = Input::Observation {
                            snapshot: latest.observation,
                            warnings: latest.warnings,
                        };
                        if inbox.send(update).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!("observation poll skipped: {}", e),
                }
            }
        }));

        if let Some(frames) = self.frames.clone() {
            let api = self.api.clone();
            self.frame_task = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(frame_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                let mut failures: u64 = 0;
                loop {
                    ticker.tick().await;
                    let Some(frame) = frames.next_frame() else {
                        continue;
                    };
                    if let Err(e) = api.add_frame(frame).await {
                        failures += 1;
                        if failures % FRAME_ERROR_SAMPLE == 1 {
                            tracing::warn!("frame upload failed ({} so far): {}", failures, e);
                        }
                    }
                }
            }));
        }
    }

    /// Stop capture and polling, then drain the terminal report. Idempotent
    /// per session: repeated stops fetch the report only once.
    pub fn stop(&mut self) {
        if self.stopped {
            tracing::debug!("observation poller already stopped");
            return;
        }
        self.stopped = true;

        if let Some(task) = self.frame_task.take() {
            task.abort();
        }
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }

        let api = self.api.clone();
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            if let Err(e) = api.stop().await {
                tracing::warn!("failed to stop observation: {}", e);
            }
            let report = match api.report().await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!("failed to fetch behavioral report: {}", e);
                    None
                }
            };
            if inbox.send(Input::ReportReady(report)).await.is_err() {
                tracing::debug!("session inbox closed before report delivery");
            }
        });
    }

    /// Clear collaborator state before a fresh session.
    pub async fn reset(&self) {
        if let Err(e) = self.api.reset().await {
            tracing::warn!("observation reset failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interviewer_types::{ObservationSnapshot, Warning, WarningSeverity};

    fn ok_start() -> StartResponse {
        StartResponse { success: true }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_feed_the_session_inbox() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut api = MockObservationApi::new();
        api.expect_start()
            .returning(|| Box::pin(async { Ok(ok_start()) }));
        api.expect_latest().returning(|| {
            Box::pin(async {
                Ok(LatestObservation {
                    observation: Some(ObservationSnapshot::default()),
                    warnings: vec![Warning {
                        severity: WarningSeverity::Warning,
                        message: "Looking away".into(),
                        kind: "GAZE".into(),
                    }],
                })
            })
        });

        let mut poller = ObservationPoller::new(Arc::new(api), None, tx);
        poller
            .start(Duration::from_millis(250), DEFAULT_FRAME_INTERVAL)
            .await;

        tokio::time::sleep(Duration::from_millis(600)).await;

        match rx.recv().await.unwrap() {
            Input::Observation { snapshot, warnings } => {
                assert!(snapshot.is_some());
                assert_eq!(warnings.len(), 1);
            }
            _ => panic!("expected observation update"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_polls_are_skipped_not_fatal() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut api = MockObservationApi::new();
        api.expect_start()
            .returning(|| Box::pin(async { Ok(ok_start()) }));
        let mut calls = 0u32;
        api.expect_latest().returning(move || {
            calls += 1;
            let fail = calls == 1;
            Box::pin(async move {
                if fail {
                    Err(TelemetryError::PollFailed("connection refused".into()))
                } else {
                    Ok(LatestObservation::default())
                }
            })
        });

        let mut poller = ObservationPoller::new(Arc::new(api), None, tx);
        poller
            .start(Duration::from_millis(250), DEFAULT_FRAME_INTERVAL)
            .await;

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            Input::Observation { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_fetches_exactly_one_report_and_halts_polls() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut api = MockObservationApi::new();
        api.expect_start()
            .returning(|| Box::pin(async { Ok(ok_start()) }));
        api.expect_latest()
            .returning(|| Box::pin(async { Ok(LatestObservation::default()) }));
        api.expect_stop()
            .times(1)
            .returning(|| Box::pin(async { Ok(()) }));
        api.expect_report()
            .times(1)
            .returning(|| Box::pin(async { Ok(Some(Report::default())) }));

        let mut poller = ObservationPoller::new(Arc::new(api), None, tx);
        poller
            .start(Duration::from_millis(250), DEFAULT_FRAME_INTERVAL)
            .await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        poller.stop();
        poller.stop();
        tokio::task::yield_now().await;

        let mut saw_report = false;
        while let Ok(input) = rx.try_recv() {
            if let Input::ReportReady(report) = input {
                assert!(!saw_report, "report delivered twice");
                assert!(report.is_some());
                saw_report = true;
            }
        }
        assert!(saw_report);

        // No polls after stop.
        tokio::time::sleep(Duration::from_secs(2)).await;
        while let Ok(input) = rx.try_recv() {
            assert!(!matches!(input, Input::Observation { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn frames_upload_on_their_own_cadence() {
        let (tx, _rx) = mpsc::channel(32);
        let mut api = MockObservationApi::new();
        api.expect_start()
            .returning(|| Box::pin(async { Ok(ok_start()) }));
        api.expect_latest()
            .returning(|| Box::pin(async { Ok(LatestObservation::default()) }));
        api.expect_add_frame()
            .times(3..)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut frames = MockFrameSource::new();
        frames.expect_next_frame().returning(|| Some(vec![0xFF, 0xD8]));

        let mut poller = ObservationPoller::new(Arc::new(api), Some(Arc::new(frames)), tx);
        poller
            .start(Duration::from_secs(3600), Duration::from_millis(167))
            .await;

        tokio::time::sleep(Duration::from_millis(600)).await;
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn frame_failures_never_surface() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut api = MockObservationApi::new();
        api.expect_start()
            .returning(|| Box::pin(async { Ok(ok_start()) }));
        api.expect_latest()
            .returning(|| Box::pin(async { Ok(LatestObservation::default()) }));
        api.expect_add_frame()
            .returning(|_| Box::pin(async { Err(TelemetryError::PollFailed("boom".into())) }));

        let mut frames = MockFrameSource::new();
        frames.expect_next_frame().returning(|| Some(vec![0xFF]));

        let mut poller = ObservationPoller::new(Arc::new(api), Some(Arc::new(frames)), tx);
        poller
            .start(Duration::from_secs(3600), Duration::from_millis(167))
            .await;

        tokio::time::sleep(Duration::from_secs(1)).await;

        // Only poll results reach the session, never frame errors.
        while let Ok(input) = rx.try_recv() {
            assert!(matches!(input, Input::Observation { .. }));
        }
    }

    mod http {
        use super::*;
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        #[tokio::test]
        async fn latest_decodes_observation_and_warnings() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/observation/latest"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(
                    r#"{"observation":{"face":{"face_detected":true,"looking_at_camera":true,"eye_contact_confidence":0.9}},"warnings":[{"severity":"warning","message":"Looking away from screen","type":"GAZE"}]}"#,
                    "application/json",
                ))
                .mount(&server)
                .await;

            let client = ObservationHttpClient::new(&server.uri());
            let latest = client.latest().await.unwrap();
            let snapshot = latest.observation.unwrap();
            assert!(snapshot.face.face_detected);
            assert_eq!(latest.warnings.len(), 1);
            assert_eq!(latest.warnings[0].kind, "GAZE");
        }

        #[tokio::test]
        async fn add_frame_posts_base64_jpeg() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/observation/add_video_frame"))
                .and(body_partial_json(
                    serde_json::json!({ "frame_data": BASE64.encode([0xFFu8, 0xD8, 0xFF]) }),
                ))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;

            let client = ObservationHttpClient::new(&server.uri());
            client.add_frame(vec![0xFF, 0xD8, 0xFF]).await.unwrap();
        }

        #[tokio::test]
        async fn missing_report_is_none_not_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/observation/report"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_raw(r#"{"report":null}"#, "application/json"),
                )
                .mount(&server)
                .await;

            let client = ObservationHttpClient::new(&server.uri());
            assert!(client.report().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn report_round_trips_scores() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/observation/report"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(
                    r#"{"report":{"eye_contact_score":7.5,"focus_score":8.0,"stress_level":"low","voice_confidence":6.0,"behavioral_strengths":["Steady eye contact"],"behavioral_improvements":["Reduce filler words"],"overall_interview_readiness":"Ready","session_duration":412.7}}"#,
                    "application/json",
                ))
                .mount(&server)
                .await;

            let client = ObservationHttpClient::new(&server.uri());
            let report = client.report().await.unwrap().unwrap();
            assert_eq!(report.eye_contact_score, 7.5);
            assert_eq!(report.behavioral_strengths.len(), 1);
            assert_eq!(report.overall_interview_readiness.as_deref(), Some("Ready"));
        }

        #[tokio::test]
        async fn unreachable_collaborator_is_a_poll_failure() {
            let client = ObservationHttpClient::new("http://127.0.0.1:1");
            let err = client.latest().await.unwrap_err();
            assert!(matches!(err, TelemetryError::PollFailed(_)));
        }
    }
}
