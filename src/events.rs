use serde::{Deserialize, Serialize};

/// One subtitle unit as the server renders it: either a confirmed
/// (finalized) caption or the in-progress `current` caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSegment {
    pub id: String,
    pub text: String,
    pub speaker: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub is_final: bool,
    pub llm_corrected: bool,
    /// Monotonic per-utterance id, the correlation key across
    /// partial/final/correction/translation events.
    pub segment_id: u64,
    #[serde(default)]
    pub translation: Option<String>,
}

/// A bilingual suggestion produced by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionItem {
    pub en: String,
    pub ko: String,
}

/// Server error event, also stored verbatim as the single user-visible error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub ts: i64,
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub retryable: Option<bool>,
}

/// Inbound events on the meeting WebSocket (JSON text frames).
///
/// `server.pong` is intercepted by the transport client and never reaches
/// the reconciliation engine; unrecognized types fall into `Unknown` and
/// are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "display.update", rename_all = "camelCase")]
    DisplayUpdate {
        ts: i64,
        session_id: String,
        confirmed: Vec<SubtitleSegment>,
        current: Option<SubtitleSegment>,
    },

    #[serde(rename = "transcript.partial", rename_all = "camelCase")]
    TranscriptPartial {
        ts: i64,
        session_id: String,
        speaker: String,
        text: String,
        segment_id: u64,
    },

    #[serde(rename = "transcript.final", rename_all = "camelCase")]
    TranscriptFinal {
        ts: i64,
        session_id: String,
        speaker: String,
        text: String,
        segment_id: u64,
    },

    #[serde(rename = "transcript.corrected", rename_all = "camelCase")]
    TranscriptCorrected {
        ts: i64,
        session_id: String,
        segment_id: u64,
        original_text: String,
        corrected_text: String,
    },

    #[serde(rename = "translation.final", rename_all = "camelCase")]
    TranslationFinal {
        ts: i64,
        session_id: String,
        source_ts: i64,
        segment_id: u64,
        speaker: String,
        source_text: String,
        translated_text: String,
    },

    #[serde(rename = "translation.corrected", rename_all = "camelCase")]
    TranslationCorrected {
        ts: i64,
        session_id: String,
        segment_id: u64,
        speaker: String,
        source_text: String,
        translated_text: String,
    },

    #[serde(rename = "suggestions.update", rename_all = "camelCase")]
    SuggestionsUpdate {
        ts: i64,
        session_id: String,
        items: Vec<SuggestionItem>,
    },

    #[serde(rename = "summary.update", rename_all = "camelCase")]
    SummaryUpdate {
        ts: i64,
        session_id: String,
        summary_markdown: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },

    #[serde(rename = "error")]
    Error {
        ts: i64,
        code: String,
        message: String,
        #[serde(default)]
        retryable: Option<bool>,
    },

    #[serde(rename = "server.pong")]
    ServerPong {
        #[serde(default)]
        ts: i64,
    },

    #[serde(other)]
    Unknown,
}

/// Outbound control messages on the meeting WebSocket.
///
/// Audio is not a control message; it travels as raw binary frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "session.start", rename_all = "camelCase")]
    SessionStart {
        sample_rate: u32,
        format: String,
        lang: String,
    },

    #[serde(rename = "session.stop")]
    SessionStop,

    #[serde(rename = "client.ping")]
    ClientPing { ts: i64 },

    #[serde(rename = "suggestions.prompt")]
    SuggestionsPrompt { prompt: String },

    #[serde(rename = "summary.request")]
    SummaryRequest,
}

impl ClientMessage {
    /// The standard start message for a 16kHz mono PCM capture.
    pub fn session_start(sample_rate: u32, lang: &str) -> Self {
        ClientMessage::SessionStart {
            sample_rate,
            format: "pcm_s16le".to_string(),
            lang: lang.to_string(),
        }
    }
}
