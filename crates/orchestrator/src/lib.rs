pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod registry;
pub mod session;
pub mod trigger;

pub use config::OrchestratorConfig;
pub use coordinator::SuggestionCoordinator;
pub use registry::{SessionRegistry, Subscriber};
pub use trigger::TriggerPolicy;

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

/// One recognized utterance delivered by the transcription provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Dedup key. Provider-supplied, or derived via [`TranscriptEvent::derive_id`]
    /// when the provider omits one.
    pub id: String,
    pub call_id: String,
    pub speaker: String,
    pub text: String,
    /// Recognition confidence in [0, 1].
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Partial (growing) results carry `false` and are fanned out as live
    /// captions only; all bookkeeping happens on finals.
    pub is_final: bool,
}

impl TranscriptEvent {
    /// Stable fallback id for providers that do not supply one.
    pub fn derive_id(call_id: &str, text: &str, timestamp: DateTime<Utc>) -> String {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        format!("{}:{:x}:{}", call_id, hasher.finish(), timestamp.timestamp_millis())
    }
}

/// Why a suggestion was (or is being) generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    SpeakerChange,
    LongPause,
    PeriodicInterval,
    MaxWaitFallback,
    ManualRequest,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::SpeakerChange => "speaker_change",
            TriggerReason::LongPause => "long_pause",
            TriggerReason::PeriodicInterval => "periodic_interval",
            TriggerReason::MaxWaitFallback => "max_wait_fallback",
            TriggerReason::ManualRequest => "manual_request",
        }
    }
}

/// Transient decision record produced by the trigger policy. Not persisted.
#[derive(Debug, Clone)]
pub struct SuggestionTrigger {
    pub reason: TriggerReason,
    /// Rendered text window handed to the generator.
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    ObjectionHandling,
    Closing,
    Question,
    Pricing,
    FeatureHighlight,
    RapportBuilding,
    NextSteps,
    FollowUp,
    General,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::ObjectionHandling => "objection_handling",
            SuggestionType::Closing => "closing",
            SuggestionType::Question => "question",
            SuggestionType::Pricing => "pricing",
            SuggestionType::FeatureHighlight => "feature_highlight",
            SuggestionType::RapportBuilding => "rapport_building",
            SuggestionType::NextSteps => "next_steps",
            SuggestionType::FollowUp => "follow_up",
            SuggestionType::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl SuggestionPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionPriority::Low => "low",
            SuggestionPriority::Medium => "medium",
            SuggestionPriority::High => "high",
            SuggestionPriority::Urgent => "urgent",
        }
    }
}

/// A coaching suggestion, ready for persistence and fanout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Storage id, or a locally generated one when persistence failed.
    pub id: String,
    pub call_id: String,
    pub suggestion_type: SuggestionType,
    pub text: String,
    pub confidence: f64,
    pub reasoning: String,
    pub priority: SuggestionPriority,
    pub trigger_reason: TriggerReason,
    pub created_at: DateTime<Utc>,
}

/// Frame delivered to every subscriber of a call.
///
/// Subscribers must render idempotently keyed by the inner event id: the
/// transport is at-least-once from their point of view (reconnects can replay
/// history they hydrate separately).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    Transcript(TranscriptEvent),
    Suggestion(Suggestion),
}

/// Raw generator output before classification and persistence.
#[derive(Debug, Clone, Default)]
pub struct GeneratedSuggestion {
    pub text: String,
    pub suggestion_type: Option<SuggestionType>,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
    pub priority: Option<SuggestionPriority>,
}

/// Pluggable AI suggestion generator.
#[async_trait]
pub trait SuggestionGenerator: Send + Sync + 'static {
    /// Produces one suggestion for the given conversation context.
    ///
    /// The coordinator wraps this call in a timeout; implementations do not
    /// need their own watchdog but should propagate provider errors.
    async fn generate(
        &self,
        context: &str,
        trigger: &SuggestionTrigger,
    ) -> anyhow::Result<GeneratedSuggestion>;

    /// Human-readable generator name, for logs.
    fn name(&self) -> &str;
}

/// Durable storage collaborator. Best-effort from the orchestrator's point of
/// view: every failure is logged and absorbed, never surfaced to a call.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    async fn save_transcript(&self, event: &TranscriptEvent) -> anyhow::Result<()>;

    /// Persists the suggestion and returns its storage id.
    async fn save_suggestion(&self, suggestion: &Suggestion) -> anyhow::Result<String>;

    /// Most recent transcripts for a call, oldest first.
    async fn recent_transcripts(
        &self,
        call_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<TranscriptEvent>>;
}

/// Outcome of feeding one transcript event through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Final event, first delivery: recorded, broadcast, policy evaluated.
    Accepted,
    /// Redelivery of an already-processed event; dropped.
    Duplicate,
    /// Non-final event; fanned out as a live caption only.
    Partial,
}

/// The live session orchestrator: one instance serves every active call.
///
/// Wires the dedup filter, conversation history, trigger policy, suggestion
/// coordinator and room fanout together. All per-call state lives in the
/// [`SessionRegistry`] and is mutated only under that session's lock.
pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
    policy: TriggerPolicy,
    coordinator: Arc<SuggestionCoordinator>,
    store: Arc<dyn EventStore>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        generator: Arc<dyn SuggestionGenerator>,
        store: Arc<dyn EventStore>,
    ) -> Arc<Self> {
        let registry = SessionRegistry::new(config.clone());
        let coordinator = Arc::new(SuggestionCoordinator::new(
            registry.clone(),
            generator,
            store.clone(),
            config.clone(),
        ));
        Arc::new(Self {
            registry,
            policy: TriggerPolicy::new(config),
            coordinator,
            store,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Adds a viewer to a call, creating the session if absent.
    pub async fn join(&self, call_id: &str, subscriber: Subscriber) {
        self.registry.join(call_id, subscriber).await;
    }

    /// Removes a viewer; the session is torn down after a grace period once
    /// the last one leaves.
    pub async fn leave(&self, call_id: &str, subscriber_id: &str) {
        self.registry.leave(call_id, subscriber_id).await;
    }

    /// Feeds one transcript event through dedup, history, fanout and the
    /// trigger policy. Events for a single call must be delivered one at a
    /// time, in arrival order.
    pub async fn handle_transcript(&self, mut event: TranscriptEvent) -> IngestOutcome {
        if event.id.is_empty() {
            event.id = TranscriptEvent::derive_id(&event.call_id, &event.text, event.timestamp);
        }

        if !event.is_final {
            let call_id = event.call_id.clone();
            self.registry.publish(&call_id, RoomEvent::Transcript(event)).await;
            return IngestOutcome::Partial;
        }

        let now = Instant::now();
        let session = self.registry.get_or_create(&event.call_id);
        let trigger = {
            let mut s = session.lock().await;
            if !s.dedup.should_process(&event.id) {
                debug!(call_id = %event.call_id, event_id = %event.id, "duplicate transcript dropped");
                return IngestOutcome::Duplicate;
            }
            let prev_transcript_at = s.last_transcript_at;
            s.append(event.clone(), now);
            self.policy.evaluate(&mut s, &event, prev_transcript_at, now)
        };

        // Fire-and-forget persistence: a storage outage must never stall the
        // live pipeline.
        let store = self.store.clone();
        let persisted = event.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save_transcript(&persisted).await {
                warn!(call_id = %persisted.call_id, %e, "transcript persistence failed");
            }
        });

        let call_id = event.call_id.clone();
        self.registry.publish(&call_id, RoomEvent::Transcript(event)).await;

        if let Some(trigger) = trigger {
            debug!(%call_id, reason = trigger.reason.as_str(), "suggestion triggered");
            let coordinator = self.coordinator.clone();
            tokio::spawn(async move {
                coordinator.request_suggestion(&call_id, trigger).await;
            });
        }

        IngestOutcome::Accepted
    }

    /// Subscriber-initiated suggestion request. Bypasses all timing checks;
    /// the single-flight guard still applies.
    pub async fn request_manual(&self, call_id: &str) {
        let Some(session) = self.registry.get(call_id) else {
            debug!(%call_id, "manual request for unknown call ignored");
            return;
        };
        let trigger = {
            let s = session.lock().await;
            SuggestionTrigger {
                reason: TriggerReason::ManualRequest,
                context: s.recent_context(),
            }
        };
        self.coordinator.request_suggestion(call_id, trigger).await;
    }
}
