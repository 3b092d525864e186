use std::time::Duration;

/// Configuration for a live meeting session.
#[derive(Debug, Clone)]
pub struct MeetingConfig {
    /// Base endpoint of the meeting service, `http(s)://` or `ws(s)://`.
    pub endpoint: String,

    /// Spoken language sent in the session-start message.
    pub lang: String,

    /// Capture sample rate in Hz (the server expects 16kHz s16le mono).
    pub sample_rate: u32,

    /// Interval between uploaded PCM chunks.
    pub chunk_interval: Duration,

    /// Keepalive ping interval.
    pub ping_interval: Duration,

    /// How long to wait for a pong before declaring the link dead.
    pub pong_timeout: Duration,

    /// How often the live transcript window is pruned by TTL.
    pub prune_interval: Duration,
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            lang: "en-US".to_string(),
            sample_rate: 16000,
            chunk_interval: Duration::from_millis(100),
            ping_interval: Duration::from_secs(15),
            pong_timeout: Duration::from_secs(30),
            prune_interval: Duration::from_secs(2),
        }
    }
}
