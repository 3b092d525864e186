use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::model::{
    DisplayBuffer, OrphanTranslationEntry, SummaryState, SummaryStatus, TranscriptEntry,
    TranslationEntry, DISPLAY_CONFIRMED_LIMIT, LIVE_HISTORY_LIMIT, LIVE_TRANSCRIPT_TTL_MS,
};
use crate::events::{ErrorEvent, ServerEvent, SubtitleSegment, SuggestionItem};

/// The reconciled client-side view of a meeting.
///
/// All mutation goes through [`MeetingState::apply`] (driven by inbound
/// server events) or the explicit lifecycle resets below. The state has no
/// knowledge of sockets or timers; the session controller feeds it events
/// in socket-delivery order and calls [`MeetingState::prune_live`] from its
/// periodic timer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingState {
    /// The renderable caption area (confirmed lines + in-progress line).
    pub display: DisplayBuffer,

    /// Rolling window of partial and recently-final utterances.
    pub live_transcripts: Vec<TranscriptEntry>,

    /// Durable history of finalized utterances, in arrival order.
    pub transcripts: Vec<TranscriptEntry>,

    /// Translations that matched no known segment or speaker on arrival.
    pub orphan_translations: Vec<OrphanTranslationEntry>,

    /// Latest suggestion batch from the server.
    pub suggestions: Vec<SuggestionItem>,

    /// Meeting summary request state.
    pub summary: SummaryState,

    /// The single retained user-visible error (last wins).
    pub error: Option<ErrorEvent>,

    /// Every speaker id seen on a transcript event this session. Used to
    /// decide whether an unmatched translation is filed as an orphan or
    /// dropped as a transient race.
    known_speakers: HashSet<String>,
}

impl MeetingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile one inbound server event. Total: no event, once past
    /// transport-level parsing, can fail or panic.
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::DisplayUpdate {
                confirmed, current, ..
            } => self.apply_display_update(confirmed, current),
            ServerEvent::TranscriptPartial {
                ts,
                speaker,
                text,
                segment_id,
                ..
            } => self.apply_transcript_partial(ts, speaker, text, segment_id),
            ServerEvent::TranscriptFinal {
                ts,
                speaker,
                text,
                segment_id,
                ..
            } => self.apply_transcript_final(ts, speaker, text, segment_id),
            ServerEvent::TranscriptCorrected {
                segment_id,
                corrected_text,
                ..
            } => self.apply_transcript_corrected(segment_id, corrected_text),
            ServerEvent::TranslationFinal {
                ts,
                source_ts,
                segment_id,
                speaker,
                source_text,
                translated_text,
                ..
            } => self.apply_translation_final(
                ts,
                source_ts,
                segment_id,
                speaker,
                source_text,
                translated_text,
            ),
            ServerEvent::TranslationCorrected {
                ts,
                segment_id,
                speaker,
                source_text,
                translated_text,
                ..
            } => self.apply_translation_corrected(
                ts,
                segment_id,
                speaker,
                source_text,
                translated_text,
            ),
            ServerEvent::SuggestionsUpdate { items, .. } => {
                self.suggestions = items;
            }
            ServerEvent::SummaryUpdate {
                summary_markdown,
                error,
                ..
            } => self.apply_summary_update(summary_markdown, error),
            ServerEvent::Error {
                ts,
                code,
                message,
                retryable,
            } => {
                self.error = Some(ErrorEvent {
                    ts,
                    code,
                    message,
                    retryable,
                });
            }
            // Pongs are intercepted by the transport; anything unrecognized
            // is ignored.
            ServerEvent::ServerPong { .. } | ServerEvent::Unknown => {}
        }
    }

    fn apply_display_update(
        &mut self,
        mut confirmed: Vec<SubtitleSegment>,
        current: Option<SubtitleSegment>,
    ) {
        // FIFO bound: keep only the most recent N confirmed lines.
        if confirmed.len() > DISPLAY_CONFIRMED_LIMIT {
            confirmed.drain(..confirmed.len() - DISPLAY_CONFIRMED_LIMIT);
        }

        // Carry a progressive translation forward while the same segment is
        // still composing, so it does not flicker back to empty.
        let current = current.map(|mut segment| {
            if segment.translation.is_none() {
                if let Some(previous) = &self.display.current {
                    if previous.segment_id == segment.segment_id {
                        segment.translation = previous.translation.clone();
                    }
                }
            }
            segment
        });

        self.display = DisplayBuffer { confirmed, current };
    }

    fn apply_transcript_partial(&mut self, ts: i64, speaker: String, text: String, segment_id: u64) {
        self.known_speakers.insert(speaker.clone());

        if let Some(entry) = self
            .live_transcripts
            .iter_mut()
            .find(|entry| !entry.is_final && entry.segment_id == segment_id)
        {
            entry.text = text;
            entry.ts = ts;
            return;
        }

        self.live_transcripts.push(TranscriptEntry {
            id: format!("partial-{speaker}-{ts}"),
            speaker,
            text,
            is_final: false,
            ts,
            segment_id,
            translations: Vec::new(),
        });
    }

    fn apply_transcript_final(&mut self, ts: i64, speaker: String, text: String, segment_id: u64) {
        self.known_speakers.insert(speaker.clone());

        let position = self
            .live_transcripts
            .iter()
            .position(|entry| entry.segment_id == segment_id);

        let finalized = if let Some(position) = position {
            // Promote in place, keeping translations that raced ahead of
            // the final transcript.
            let entry = &mut self.live_transcripts[position];
            entry.speaker = speaker;
            entry.text = text;
            entry.is_final = true;
            entry.ts = ts;
            entry.clone()
        } else {
            let entry = TranscriptEntry {
                id: format!("final-{ts}"),
                speaker,
                text,
                is_final: true,
                ts,
                segment_id,
                translations: Vec::new(),
            };
            self.live_transcripts.push(entry.clone());
            entry
        };

        // Exactly one final history entry per segment id: a repeated final
        // replaces the earlier one instead of duplicating it.
        self.transcripts
            .retain(|entry| entry.segment_id != segment_id);
        self.transcripts.push(finalized);

        // Newest segments first, bounded by count.
        self.live_transcripts
            .sort_by(|a, b| b.segment_id.cmp(&a.segment_id));
        self.live_transcripts.truncate(LIVE_HISTORY_LIMIT);
    }

    fn apply_transcript_corrected(&mut self, segment_id: u64, corrected_text: String) {
        // Corrections never create entries; for an unknown segment this is
        // a race-tolerant no-op.
        if let Some(entry) = self
            .transcripts
            .iter_mut()
            .find(|entry| entry.segment_id == segment_id)
        {
            entry.text = corrected_text;
        }
    }

    fn apply_translation_final(
        &mut self,
        ts: i64,
        source_ts: i64,
        segment_id: u64,
        speaker: String,
        source_text: String,
        translated_text: String,
    ) {
        let translation = TranslationEntry {
            speaker: speaker.clone(),
            source_ts,
            source_text,
            translated_text,
            segment_id,
        };

        // Resolution order: durable history, then live window, then orphan.
        if let Some(entry) = self
            .transcripts
            .iter_mut()
            .find(|entry| entry.segment_id == segment_id)
        {
            Self::attach_translation(entry, translation);
            return;
        }

        if let Some(entry) = self
            .live_transcripts
            .iter_mut()
            .find(|entry| entry.segment_id == segment_id)
        {
            Self::attach_translation(entry, translation);
            return;
        }

        // A known speaker with an unknown segment means the source segment
        // is still in flight; drop rather than orphan.
        if self.known_speakers.contains(&speaker) {
            return;
        }

        self.orphan_translations.push(OrphanTranslationEntry {
            id: format!("orphan-{ts}"),
            ts,
            speaker: translation.speaker,
            source_ts: translation.source_ts,
            source_text: translation.source_text,
            translated_text: translation.translated_text,
            segment_id,
        });
    }

    /// Append unless an identical `(sourceText, translatedText)` pair is
    /// already attached (the transport is at-least-once).
    fn attach_translation(entry: &mut TranscriptEntry, translation: TranslationEntry) {
        let duplicate = entry.translations.iter().any(|existing| {
            existing.source_text == translation.source_text
                && existing.translated_text == translation.translated_text
        });
        if !duplicate {
            entry.translations.push(translation);
        }
    }

    fn apply_translation_corrected(
        &mut self,
        ts: i64,
        segment_id: u64,
        speaker: String,
        source_text: String,
        translated_text: String,
    ) {
        // A corrected translation supersedes every prior candidate for the
        // segment: hard reset, not append.
        if let Some(entry) = self
            .transcripts
            .iter_mut()
            .find(|entry| entry.segment_id == segment_id)
        {
            entry.translations = vec![TranslationEntry {
                speaker,
                source_ts: ts,
                source_text,
                translated_text,
                segment_id,
            }];
        }
    }

    fn apply_summary_update(&mut self, markdown: Option<String>, error: Option<String>) {
        match (markdown, error) {
            (_, Some(message)) => {
                self.summary.status = SummaryStatus::Error;
                self.summary.error = Some(message);
            }
            (Some(markdown), None) => {
                self.summary = SummaryState {
                    markdown: Some(markdown),
                    status: SummaryStatus::Ready,
                    error: None,
                };
            }
            (None, None) => {
                self.summary = SummaryState::default();
            }
        }
    }

    /// Drop non-final live entries older than the TTL. Final entries are
    /// exempt; they are only bounded by count at finalization time.
    pub fn prune_live(&mut self, now_ms: i64) {
        self.live_transcripts
            .retain(|entry| entry.is_final || now_ms - entry.ts < LIVE_TRANSCRIPT_TTL_MS);
    }

    /// Mark a summary request as in flight.
    pub fn summary_requested(&mut self) {
        self.summary.status = SummaryStatus::Loading;
        self.summary.error = None;
    }

    /// Store a locally generated error (connection lost, summary
    /// unavailable). Same single-slot rule as server errors.
    pub fn set_error(&mut self, error: ErrorEvent) {
        self.error = Some(error);
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Full reset for a fresh session start.
    pub fn reset_all(&mut self) {
        *self = MeetingState::default();
    }

    /// Reset for a reconnect: the live window and display restart with the
    /// new session, while history, orphans, suggestions and summary survive.
    pub fn reset_live_and_display(&mut self) {
        self.live_transcripts.clear();
        self.display = DisplayBuffer::default();
        self.error = None;
    }

    /// Reset for session end: live/display state goes, durable history stays.
    pub fn clear_live_and_display(&mut self) {
        self.live_transcripts.clear();
        self.display = DisplayBuffer::default();
    }
}
