//! Audio capture boundary
//!
//! The engine and transport never touch devices; capture implementations
//! push timed PCM chunks through a channel and are swappable behind the
//! `AudioCapture` trait.

mod capture;

pub use capture::{AudioCapture, CaptureConfig, SilenceCapture};
