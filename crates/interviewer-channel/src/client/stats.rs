#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Stats {
    messages_sent: u64,
    messages_received: u64,
    malformed_dropped: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_sent(&mut self) {
        self.messages_sent += 1;
    }

    pub(crate) fn record_received(&mut self) {
        self.messages_received += 1;
    }

    pub(crate) fn record_malformed(&mut self) {
        self.malformed_dropped += 1;
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    pub fn malformed_dropped(&self) -> u64 {
        self.malformed_dropped
    }
}
