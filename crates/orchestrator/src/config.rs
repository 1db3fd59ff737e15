use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the live session orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Below this many words of accumulated context, never trigger.
    pub min_words_for_analysis: usize,
    /// Hard floor between suggestion generations for one call (seconds).
    pub min_suggestion_interval_secs: u64,
    /// Gap since the previous transcript that counts as a pause (seconds).
    pub long_pause_threshold_secs: u64,
    /// Soft trigger keeping suggestions flowing without discrete events (seconds).
    pub periodic_interval_secs: u64,
    /// Absolute liveness fallback; fires even inside the cooldown (seconds).
    pub max_wait_without_suggestion_secs: u64,
    /// Transcript events retained per call, oldest evicted first.
    pub history_capacity: usize,
    /// History entries rendered into generator context.
    pub context_max_entries: usize,
    /// Word cap on rendered context; truncated from the start (recency wins).
    pub context_max_words: usize,
    /// Recently-seen dedup keys retained per call.
    pub dedup_capacity: usize,
    /// Bound on one generator call (seconds); timeout yields the fallback suggestion.
    pub generation_timeout_secs: u64,
    /// How long an empty session lingers before teardown, tolerating quick
    /// reconnects (seconds).
    pub drain_grace_secs: u64,
    /// Ingest-created sessions nobody ever views are reclaimed after this
    /// long without a transcript (seconds).
    pub idle_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_words_for_analysis: 20,
            min_suggestion_interval_secs: 30,
            long_pause_threshold_secs: 7,
            periodic_interval_secs: 60,
            max_wait_without_suggestion_secs: 120,
            history_capacity: 50,
            context_max_entries: 10,
            context_max_words: 400,
            dedup_capacity: 100,
            generation_timeout_secs: 15,
            drain_grace_secs: 30,
            idle_timeout_secs: 300,
        }
    }
}

impl OrchestratorConfig {
    pub fn min_suggestion_interval(&self) -> Duration {
        Duration::from_secs(self.min_suggestion_interval_secs)
    }

    pub fn long_pause_threshold(&self) -> Duration {
        Duration::from_secs(self.long_pause_threshold_secs)
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_interval_secs)
    }

    pub fn max_wait_without_suggestion(&self) -> Duration {
        Duration::from_secs(self.max_wait_without_suggestion_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
