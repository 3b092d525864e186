pub mod audio;
pub mod config;
pub mod engine;
pub mod events;
pub mod session;
pub mod ws;

pub use audio::{AudioCapture, CaptureConfig, SilenceCapture};
pub use config::Config;
pub use engine::{
    DisplayBuffer, MeetingState, OrphanTranslationEntry, SummaryState, SummaryStatus,
    TranscriptEntry, TranslationEntry,
};
pub use events::{ClientMessage, ErrorEvent, ServerEvent, SubtitleSegment, SuggestionItem};
pub use session::{MeetingConfig, MeetingController};
pub use ws::{session_url, WsClient, WsConfig, WsEvent};
