use std::time::Duration;

/// Budget for channel establishment up through the confirmed open event.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(8);

pub const DEFAULT_BASE_URL: &str = "ws://127.0.0.1:8000";
pub const SESSION_PATH: &str = "/ws";

pub const DEFAULT_CAPACITY: usize = 64;
