use tokio::time::Instant;

use crate::config::OrchestratorConfig;
use crate::session::CallSession;
use crate::{SuggestionTrigger, TranscriptEvent, TriggerReason};

/// Decides, per incoming final transcript event, whether a suggestion should
/// be generated now and why. Pure policy: it never dispatches anything and
/// never stamps `last_suggestion_at`; that happens only once the coordinator
/// actually starts a generation, which closes the window where two rapid
/// events could both pass the policy and both generate.
pub struct TriggerPolicy {
    config: OrchestratorConfig,
}

impl TriggerPolicy {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    /// First match wins: speaker change, long pause (both inside the
    /// cooldown floor), periodic interval, then the max-wait fallback which
    /// overrides the cooldown to guarantee liveness.
    ///
    /// `prev_transcript_at` is the arrival time of the event before this one
    /// (the current event is already appended to history). Side effect:
    /// updates `current_speaker`.
    pub fn evaluate(
        &self,
        session: &mut CallSession,
        event: &TranscriptEvent,
        prev_transcript_at: Option<Instant>,
        now: Instant,
    ) -> Option<SuggestionTrigger> {
        let speaker_changed = session
            .current_speaker
            .as_deref()
            .is_some_and(|prev| prev != event.speaker);
        session.current_speaker = Some(event.speaker.clone());

        if session.history_word_count() < self.config.min_words_for_analysis {
            return None;
        }

        let cooldown_elapsed = match session.last_suggestion_at {
            None => true,
            Some(at) => now.duration_since(at) >= self.config.min_suggestion_interval(),
        };
        // No suggestion yet: measure the soft/fallback clocks from session start.
        let since_last_suggestion =
            now.duration_since(session.last_suggestion_at.unwrap_or(session.started_at));

        if speaker_changed && cooldown_elapsed {
            return Some(self.trigger(session, TriggerReason::SpeakerChange));
        }

        if cooldown_elapsed {
            if let Some(prev) = prev_transcript_at {
                if now.duration_since(prev) >= self.config.long_pause_threshold() {
                    return Some(self.trigger(session, TriggerReason::LongPause));
                }
            }
        }

        if cooldown_elapsed && since_last_suggestion >= self.config.periodic_interval() {
            return Some(self.trigger(session, TriggerReason::PeriodicInterval));
        }

        if since_last_suggestion >= self.config.max_wait_without_suggestion() {
            return Some(self.trigger(session, TriggerReason::MaxWaitFallback));
        }

        None
    }

    fn trigger(&self, session: &CallSession, reason: TriggerReason) -> SuggestionTrigger {
        SuggestionTrigger {
            reason,
            context: session.recent_context(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            min_words_for_analysis: 20,
            min_suggestion_interval_secs: 30,
            long_pause_threshold_secs: 7,
            periodic_interval_secs: 60,
            max_wait_without_suggestion_secs: 120,
            ..Default::default()
        }
    }

    fn event(speaker: &str, text: &str) -> TranscriptEvent {
        let timestamp = Utc::now();
        TranscriptEvent {
            id: TranscriptEvent::derive_id("call-1", text, timestamp),
            call_id: "call-1".to_string(),
            speaker: speaker.to_string(),
            text: text.to_string(),
            confidence: 0.9,
            timestamp,
            is_final: true,
        }
    }

    /// Appends and evaluates the way the pipeline does, returning the decision.
    fn feed(
        policy: &TriggerPolicy,
        session: &mut CallSession,
        ev: TranscriptEvent,
        now: Instant,
    ) -> Option<SuggestionTrigger> {
        let prev = session.last_transcript_at;
        session.append(ev.clone(), now);
        policy.evaluate(session, &ev, prev, now)
    }

    const FILLER: &str = "we have been talking about the product roadmap for a while now \
                          and there is plenty of recorded context here";

    #[tokio::test(start_paused = true)]
    async fn below_min_words_never_triggers() {
        let policy = TriggerPolicy::new(config());
        let mut session = CallSession::new("call-1".into(), &config());

        // 15 words total, under the 20-word floor; even hours of elapsed
        // time must not produce a trigger.
        let now = Instant::now();
        assert!(feed(&policy, &mut session, event("alice", "one two three four five"), now).is_none());
        tokio::time::advance(Duration::from_secs(3600)).await;
        let later = Instant::now();
        assert!(
            feed(
                &policy,
                &mut session,
                event("bob", "six seven eight nine ten eleven twelve thirteen fourteen fifteen"),
                later,
            )
            .is_none()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn speaker_change_triggers_once_context_exists() {
        let policy = TriggerPolicy::new(config());
        let mut session = CallSession::new("call-1".into(), &config());

        let now = Instant::now();
        assert!(feed(&policy, &mut session, event("alice", FILLER), now).is_none());

        // 1ms later, different speaker, no prior suggestion (cooldown vacuously
        // elapsed): speaker_change fires.
        tokio::time::advance(Duration::from_millis(1)).await;
        let trigger = feed(&policy, &mut session, event("bob", "let me jump in here"), Instant::now())
            .expect("speaker change should trigger");
        assert_eq!(trigger.reason, TriggerReason::SpeakerChange);
        assert!(trigger.context.contains("bob: let me jump in here"));
    }

    #[tokio::test(start_paused = true)]
    async fn speaker_change_respects_cooldown() {
        let policy = TriggerPolicy::new(config());
        let mut session = CallSession::new("call-1".into(), &config());

        let now = Instant::now();
        feed(&policy, &mut session, event("alice", FILLER), now);
        session.last_suggestion_at = Some(Instant::now());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(feed(&policy, &mut session, event("bob", "quick interjection"), Instant::now()).is_none());

        // Once the 30s floor has passed the same condition fires.
        tokio::time::advance(Duration::from_secs(30)).await;
        let trigger = feed(&policy, &mut session, event("alice", "back to me"), Instant::now())
            .expect("cooldown elapsed");
        assert_eq!(trigger.reason, TriggerReason::SpeakerChange);
    }

    #[tokio::test(start_paused = true)]
    async fn long_pause_triggers_after_gap() {
        let policy = TriggerPolicy::new(config());
        let mut session = CallSession::new("call-1".into(), &config());

        feed(&policy, &mut session, event("alice", FILLER), Instant::now());

        tokio::time::advance(Duration::from_secs(8)).await;
        let trigger = feed(&policy, &mut session, event("alice", "so what do you think"), Instant::now())
            .expect("8s gap exceeds the 7s pause threshold");
        assert_eq!(trigger.reason, TriggerReason::LongPause);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_interval_fires_without_discrete_triggers() {
        let policy = TriggerPolicy::new(config());
        let mut session = CallSession::new("call-1".into(), &config());

        feed(&policy, &mut session, event("alice", FILLER), Instant::now());
        session.last_suggestion_at = Some(Instant::now());

        // Same speaker, steady chatter: no speaker change, and every gap
        // stays under the 7s pause threshold.
        for _ in 0..11 {
            tokio::time::advance(Duration::from_secs(5)).await;
            assert!(feed(&policy, &mut session, event("alice", "and another point"), Instant::now()).is_none());
        }

        // 60s since the last suggestion now.
        tokio::time::advance(Duration::from_secs(5)).await;
        let trigger = feed(&policy, &mut session, event("alice", "still going"), Instant::now())
            .expect("periodic interval elapsed");
        assert_eq!(trigger.reason, TriggerReason::PeriodicInterval);
    }

    #[tokio::test(start_paused = true)]
    async fn max_wait_fallback_overrides_cooldown() {
        let policy = TriggerPolicy::new(OrchestratorConfig {
            // Pathological config: cooldown longer than every soft trigger, so
            // only the fallback can fire.
            min_suggestion_interval_secs: 600,
            ..config()
        });
        let mut session = CallSession::new("call-1".into(), &config());

        feed(&policy, &mut session, event("alice", FILLER), Instant::now());
        session.last_suggestion_at = Some(Instant::now());

        tokio::time::advance(Duration::from_secs(65)).await;
        assert!(feed(&policy, &mut session, event("alice", "cooldown blocks this"), Instant::now()).is_none());

        tokio::time::advance(Duration::from_secs(60)).await;
        let trigger = feed(&policy, &mut session, event("alice", "two minutes gone"), Instant::now())
            .expect("max wait guarantees liveness");
        assert_eq!(trigger.reason, TriggerReason::MaxWaitFallback);
    }

    #[tokio::test(start_paused = true)]
    async fn first_event_sets_speaker_without_triggering() {
        let policy = TriggerPolicy::new(config());
        let mut session = CallSession::new("call-1".into(), &config());

        assert!(feed(&policy, &mut session, event("alice", FILLER), Instant::now()).is_none());
        assert_eq!(session.current_speaker.as_deref(), Some("alice"));
    }
}
