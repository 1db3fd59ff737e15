use std::collections::VecDeque;

use tokio::time::Instant;

use crate::config::OrchestratorConfig;
use crate::dedup::DedupFilter;
use crate::registry::Subscriber;
use crate::TranscriptEvent;

/// In-memory state for one active call.
///
/// A cache over the durable store, never persisted: a process restart starts
/// the call from a fresh session. All fields are mutated only under the
/// session's mutex held by the [`crate::SessionRegistry`].
pub struct CallSession {
    pub call_id: String,
    pub subscribers: Vec<Subscriber>,
    pub history: VecDeque<TranscriptEvent>,
    pub dedup: DedupFilter,
    /// Last-seen speaker label, for speaker-change detection.
    pub current_speaker: Option<String>,
    pub started_at: Instant,
    pub last_transcript_at: Option<Instant>,
    pub last_suggestion_at: Option<Instant>,
    /// At most one suggestion generation in flight per call.
    pub suggestion_in_flight: bool,
    /// Bumped on every join and every drain scheduling; a drain timer only
    /// destroys the session if the epoch it captured is still current.
    pub drain_epoch: u64,
    history_capacity: usize,
    context_max_entries: usize,
    context_max_words: usize,
}

impl CallSession {
    pub fn new(call_id: String, config: &OrchestratorConfig) -> Self {
        Self {
            call_id,
            subscribers: Vec::new(),
            history: VecDeque::with_capacity(config.history_capacity),
            dedup: DedupFilter::new(config.dedup_capacity),
            current_speaker: None,
            started_at: Instant::now(),
            last_transcript_at: None,
            last_suggestion_at: None,
            suggestion_in_flight: false,
            drain_epoch: 0,
            history_capacity: config.history_capacity,
            context_max_entries: config.context_max_entries,
            context_max_words: config.context_max_words,
        }
    }

    /// Appends in arrival order, evicting the oldest entry at capacity.
    pub fn append(&mut self, event: TranscriptEvent, now: Instant) {
        if self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(event);
        self.last_transcript_at = Some(now);
    }

    /// Total words currently buffered, the gate for trigger analysis.
    pub fn history_word_count(&self) -> usize {
        self.history
            .iter()
            .map(|e| e.text.split_whitespace().count())
            .sum()
    }

    /// Renders the most recent history entries as `"speaker: text"` lines,
    /// then truncates from the start to the configured word cap. Recency
    /// beats long-range context for a live trigger decision, so the oldest
    /// words are the ones dropped.
    pub fn recent_context(&self) -> String {
        let skip = self.history.len().saturating_sub(self.context_max_entries);
        let rendered = self
            .history
            .iter()
            .skip(skip)
            .map(|e| format!("{}: {}", e.speaker, e.text))
            .collect::<Vec<_>>()
            .join("\n");

        let words: Vec<&str> = rendered.split_whitespace().collect();
        if words.len() <= self.context_max_words {
            rendered
        } else {
            words[words.len() - self.context_max_words..].join(" ")
        }
    }
}
