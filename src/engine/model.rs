use serde::{Deserialize, Serialize};

use crate::events::SubtitleSegment;

/// How many confirmed subtitles the display keeps on screen.
pub const DISPLAY_CONFIRMED_LIMIT: usize = 4;

/// How many live (partial + recently-final) transcript entries are retained.
pub const LIVE_HISTORY_LIMIT: usize = 10;

/// TTL for non-final live entries, enforced by the controller's prune timer.
pub const LIVE_TRANSCRIPT_TTL_MS: i64 = 10_000;

/// A translation attached to a finalized or live transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationEntry {
    pub speaker: String,
    pub source_ts: i64,
    pub source_text: String,
    pub translated_text: String,
    pub segment_id: u64,
}

/// One utterance in the live window or the durable history.
///
/// Entries are mutable while `is_final` is false; a final event promotes
/// them in place, and corrections replace `text` afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: String,
    pub speaker: String,
    pub text: String,
    pub is_final: bool,
    pub ts: i64,
    pub segment_id: u64,
    pub translations: Vec<TranslationEntry>,
}

/// A translation that could not be matched to any known segment or speaker
/// at arrival time. Orphans are terminal: they are never reconciled against
/// transcripts that arrive later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanTranslationEntry {
    pub id: String,
    pub ts: i64,
    pub speaker: String,
    pub source_ts: i64,
    pub source_text: String,
    pub translated_text: String,
    pub segment_id: u64,
}

/// The renderable caption area: up to four confirmed lines plus at most one
/// in-progress line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayBuffer {
    pub confirmed: Vec<SubtitleSegment>,
    pub current: Option<SubtitleSegment>,
}

/// Meeting summary request/response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

impl Default for SummaryStatus {
    fn default() -> Self {
        SummaryStatus::Idle
    }
}

/// The current meeting summary, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryState {
    pub markdown: Option<String>,
    pub status: SummaryStatus,
    pub error: Option<String>,
}
