pub mod messages;
pub mod observation;

pub use messages::{AvatarState, CandidateMessage, InterviewerMessage, SystemState};
pub use observation::{
    LatestObservation, ObservationSnapshot, Report, ReportEnvelope, StartResponse, StressLevel,
    Warning, WarningSeverity,
};
