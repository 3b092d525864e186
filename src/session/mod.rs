//! Meeting session lifecycle
//!
//! This module provides the `MeetingController` abstraction that manages:
//! - Session lifecycle (start/pause/resume/end/reconnect)
//! - Wiring transport events into the reconciliation engine
//! - Audio chunk upload while recording
//! - Live-window pruning and pending-prompt delivery

mod config;
mod controller;

pub use config::MeetingConfig;
pub use controller::MeetingController;
