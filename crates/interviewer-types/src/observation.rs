//! Models for the behavioral observation collaborator.
//!
//! Snapshots are ephemeral: each poll supersedes the last, and the warning
//! set always replaces the previous one for display. The report is fetched
//! once, when the session ends.

/// One polled snapshot of the candidate's behavioral state.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObservationSnapshot {
    #[serde(default)]
    pub face: FaceMetrics,
    #[serde(default)]
    pub audio: AudioMetrics,
    #[serde(default)]
    pub emotion: EmotionMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FaceMetrics {
    #[serde(default)]
    pub face_detected: bool,
    #[serde(default)]
    pub looking_at_camera: bool,
    #[serde(default)]
    pub looking_away: bool,
    #[serde(default)]
    pub eye_contact_confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioMetrics {
    #[serde(default)]
    pub voice_confidence: Option<f64>,
    #[serde(default)]
    pub stress_level: Option<StressLevel>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmotionMetrics {
    #[serde(default)]
    pub stress_level: Option<StressLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StressLevel {
    #[default]
    Low,
    Medium,
    High,
    Calibrating,
    #[serde(other)]
    Unknown,
}

impl ObservationSnapshot {
    /// 0-10 eye contact score; `None` when no face is in frame.
    pub fn eye_contact_score(&self) -> Option<u8> {
        if !self.face.face_detected {
            return None;
        }
        Some((self.face.eye_contact_confidence.clamp(0.0, 1.0) * 10.0).round() as u8)
    }

    /// 0-10 focus score derived from gaze direction.
    pub fn focus_score(&self) -> u8 {
        if self.face.looking_away {
            3
        } else if self.face.looking_at_camera {
            9
        } else {
            6
        }
    }

    /// Voice stress, preferring the audio channel over the emotion channel.
    pub fn stress_level(&self) -> StressLevel {
        self.audio
            .stress_level
            .or(self.emotion.stress_level)
            .unwrap_or_default()
    }

    /// 0-10 voice confidence score; `None` while uncalibrated.
    pub fn voice_score(&self) -> Option<u8> {
        let confidence = self.audio.voice_confidence?;
        if confidence < 0.0 {
            return None;
        }
        Some((confidence.clamp(0.0, 1.0) * 10.0).round() as u8)
    }
}

/// One live proctoring warning. The set reported by each poll reflects the
/// current instant only, not an accumulated history.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Warning {
    #[serde(default)]
    pub severity: WarningSeverity,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Info,
    #[default]
    Warning,
    Critical,
    #[serde(other)]
    Unknown,
}

/// Response body of `GET /observation/latest`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LatestObservation {
    #[serde(default)]
    pub observation: Option<ObservationSnapshot>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

/// Response body of `POST /observation/start`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StartResponse {
    #[serde(default)]
    pub success: bool,
}

/// Response body of `GET /observation/report`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ReportEnvelope {
    #[serde(default)]
    pub report: Option<Report>,
}

/// Terminal behavioral report for the whole session.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Report {
    #[serde(default)]
    pub eye_contact_score: f64,
    #[serde(default)]
    pub focus_score: f64,
    #[serde(default)]
    pub stress_level: Option<String>,
    #[serde(default)]
    pub voice_confidence: f64,
    #[serde(default)]
    pub behavioral_strengths: Vec<String>,
    #[serde(default)]
    pub behavioral_improvements: Vec<String>,
    #[serde(default)]
    pub overall_interview_readiness: Option<String>,
    #[serde(default)]
    pub session_duration: f64,
}
