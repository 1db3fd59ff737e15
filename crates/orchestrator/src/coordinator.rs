use std::sync::Arc;

use chrono::Utc;
use nanoid::nanoid;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::registry::SessionRegistry;
use crate::{
    EventStore, GeneratedSuggestion, RoomEvent, Suggestion, SuggestionGenerator,
    SuggestionPriority, SuggestionTrigger, SuggestionType,
};

/// Serializes suggestion generation per call and shepherds one generation
/// from trigger to broadcast.
///
/// The user-facing contract is "always eventually respond": generator errors
/// and timeouts degrade to a low-confidence filler, and a persistence outage
/// downgrades the suggestion to an ephemeral one rather than blocking it.
pub struct SuggestionCoordinator {
    registry: Arc<SessionRegistry>,
    generator: Arc<dyn SuggestionGenerator>,
    store: Arc<dyn EventStore>,
    config: OrchestratorConfig,
}

impl SuggestionCoordinator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        generator: Arc<dyn SuggestionGenerator>,
        store: Arc<dyn EventStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            generator,
            store,
            config,
        }
    }

    pub async fn request_suggestion(&self, call_id: &str, trigger: SuggestionTrigger) {
        let Some(session) = self.registry.get(call_id) else {
            debug!(%call_id, "suggestion requested for unknown call");
            return;
        };

        // Check-and-set under the session lock; the lock is never held
        // across the generator or storage awaits below.
        {
            let mut s = session.lock().await;
            if s.suggestion_in_flight {
                debug!(%call_id, reason = trigger.reason.as_str(), "generation already in flight, dropping trigger");
                return;
            }
            s.suggestion_in_flight = true;
        }

        let generated = match tokio::time::timeout(
            self.config.generation_timeout(),
            self.generator.generate(&trigger.context, &trigger),
        )
        .await
        {
            Ok(Ok(generated)) => generated,
            Ok(Err(e)) => {
                warn!(%call_id, generator = self.generator.name(), %e, "suggestion generation failed");
                Self::fallback()
            }
            Err(_) => {
                warn!(%call_id, generator = self.generator.name(), "suggestion generation timed out");
                Self::fallback()
            }
        };

        let mut suggestion = Suggestion {
            id: String::new(),
            call_id: call_id.to_string(),
            suggestion_type: generated
                .suggestion_type
                .unwrap_or_else(|| classify(&generated.text)),
            text: generated.text,
            confidence: generated.confidence.unwrap_or(0.5),
            reasoning: generated.reasoning.unwrap_or_default(),
            priority: generated.priority.unwrap_or(SuggestionPriority::Medium),
            trigger_reason: trigger.reason,
            created_at: Utc::now(),
        };

        match self.store.save_suggestion(&suggestion).await {
            Ok(id) => suggestion.id = id,
            Err(e) => {
                // Ephemeral id: delivery never waits for storage to recover.
                suggestion.id = nanoid!();
                warn!(%call_id, %e, "suggestion persistence failed, broadcasting ephemeral");
            }
        }

        // Single exit path: the flag is cleared and the cooldown stamped on
        // success, generator failure and timeout alike. An un-cleared flag
        // would starve this call of suggestions forever.
        {
            let mut s = session.lock().await;
            s.last_suggestion_at = Some(Instant::now());
            s.suggestion_in_flight = false;
        }

        info!(
            %call_id,
            suggestion = %suggestion.id,
            kind = suggestion.suggestion_type.as_str(),
            reason = trigger.reason.as_str(),
            "suggestion ready"
        );
        self.registry
            .publish(call_id, RoomEvent::Suggestion(suggestion))
            .await;
    }

    /// Low-confidence filler emitted when the generator errors or times out.
    fn fallback() -> GeneratedSuggestion {
        GeneratedSuggestion {
            text: "Keep the conversation going. I'm still listening and will chime in shortly."
                .to_string(),
            suggestion_type: Some(SuggestionType::General),
            confidence: Some(0.1),
            reasoning: Some("Generator unavailable; placeholder to keep the assistant responsive.".to_string()),
            priority: Some(SuggestionPriority::Low),
        }
    }
}

/// Content-based classification for generators that return bare text.
/// First keyword family matched wins; question-mark-heavy text falls through
/// to `Question`, everything else to `General`.
pub fn classify(text: &str) -> SuggestionType {
    let lower = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["objection", "concern", "hesitat", "pushback"]) {
        SuggestionType::ObjectionHandling
    } else if has(&["close the deal", "sign", "contract", "commit today"]) {
        SuggestionType::Closing
    } else if has(&["price", "pricing", "cost", "budget", "discount"]) {
        SuggestionType::Pricing
    } else if has(&["feature", "capability", "demo", "show them"]) {
        SuggestionType::FeatureHighlight
    } else if has(&["next step", "schedule", "calendar", "meeting"]) {
        SuggestionType::NextSteps
    } else if has(&["follow up", "follow-up", "send over", "recap"]) {
        SuggestionType::FollowUp
    } else if has(&["rapport", "weekend", "family", "weather"]) {
        SuggestionType::RapportBuilding
    } else if lower.contains('?') {
        SuggestionType::Question
    } else {
        SuggestionType::General
    }
}
