use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::MeetingConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Meeting service base endpoint, `http(s)://` or `ws(s)://`.
    pub endpoint: String,
    pub lang: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub chunk_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct TransportConfig {
    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session settings derived from this file config.
    pub fn meeting_config(&self) -> MeetingConfig {
        MeetingConfig {
            endpoint: self.service.endpoint.clone(),
            lang: self.service.lang.clone(),
            sample_rate: self.audio.sample_rate,
            chunk_interval: Duration::from_millis(self.audio.chunk_interval_ms),
            ping_interval: Duration::from_secs(self.transport.ping_interval_secs),
            pong_timeout: Duration::from_secs(self.transport.pong_timeout_secs),
            ..MeetingConfig::default()
        }
    }
}
