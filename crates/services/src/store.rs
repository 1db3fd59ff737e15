use async_trait::async_trait;
use bson::DateTime;
use mongodb::Database;
use tracing::debug;

use callpilot_db::models::{SuggestionRecord, TranscriptRecord};
use callpilot_orchestrator::{EventStore, Suggestion, TranscriptEvent};

use crate::dao::base::DaoError;
use crate::dao::{SuggestionDao, TranscriptDao};

/// MongoDB-backed [`EventStore`]. Every operation is best-effort from the
/// orchestrator's point of view; errors bubble up as `anyhow` and are logged
/// and absorbed by the caller.
pub struct MongoEventStore {
    transcripts: TranscriptDao,
    suggestions: SuggestionDao,
}

impl MongoEventStore {
    pub fn new(db: &Database) -> Self {
        Self {
            transcripts: TranscriptDao::new(db),
            suggestions: SuggestionDao::new(db),
        }
    }
}

#[async_trait]
impl EventStore for MongoEventStore {
    async fn save_transcript(&self, event: &TranscriptEvent) -> anyhow::Result<()> {
        let record = TranscriptRecord {
            id: None,
            event_id: event.id.clone(),
            call_id: event.call_id.clone(),
            speaker: event.speaker.clone(),
            text: event.text.clone(),
            confidence: event.confidence,
            spoken_at: DateTime::from_chrono(event.timestamp),
            created_at: DateTime::now(),
        };
        match self.transcripts.insert(&record).await {
            Ok(_) => Ok(()),
            // The unique (call_id, event_id) index makes retried persistence
            // idempotent; a duplicate write is not a failure.
            Err(DaoError::DuplicateKey(_)) => {
                debug!(call_id = %event.call_id, event_id = %event.id, "transcript already persisted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_suggestion(&self, suggestion: &Suggestion) -> anyhow::Result<String> {
        let record = SuggestionRecord {
            id: None,
            call_id: suggestion.call_id.clone(),
            suggestion_type: suggestion.suggestion_type.as_str().to_string(),
            text: suggestion.text.clone(),
            confidence: suggestion.confidence,
            reasoning: suggestion.reasoning.clone(),
            priority: suggestion.priority.as_str().to_string(),
            trigger_reason: suggestion.trigger_reason.as_str().to_string(),
            created_at: DateTime::from_chrono(suggestion.created_at),
        };
        let id = self.suggestions.insert(&record).await?;
        Ok(id.to_hex())
    }

    async fn recent_transcripts(
        &self,
        call_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<TranscriptEvent>> {
        let records = self.transcripts.recent(call_id, limit as i64).await?;
        Ok(records
            .into_iter()
            .map(|r| TranscriptEvent {
                id: r.event_id,
                call_id: r.call_id,
                speaker: r.speaker,
                text: r.text,
                confidence: r.confidence,
                timestamp: r.spoken_at.to_chrono(),
                is_final: true,
            })
            .collect())
    }
}
