//! Event reconciliation engine
//!
//! Pure state machine that merges the server's transcript, translation and
//! display events into a consistent renderable meeting view:
//! - Live window of partial/recently-final utterances (bounded, TTL-pruned)
//! - Durable transcript history with correction and translation attachment
//! - Display buffer composition with progressive-translation carry-forward
//! - Orphan handling for translations that match nothing on arrival

mod model;
mod state;

pub use model::{
    DisplayBuffer, OrphanTranslationEntry, SummaryState, SummaryStatus, TranscriptEntry,
    TranslationEntry, DISPLAY_CONFIRMED_LIMIT, LIVE_HISTORY_LIMIT, LIVE_TRANSCRIPT_TTL_MS,
};
pub use state::MeetingState;
