use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use callpilot_db::models::{SuggestionRecord, TranscriptRecord};
use callpilot_orchestrator::{IngestOutcome, TranscriptEvent};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct IngestTranscriptRequest {
    /// Provider event id (dedup key); derived server-side when absent.
    pub id: Option<String>,
    pub speaker: String,
    pub text: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default = "default_is_final")]
    pub is_final: bool,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_is_final() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: IngestOutcome,
    pub event_id: String,
}

/// Provider webhook: one transcript event per request, in arrival order.
pub async fn ingest_transcript(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Json(req): Json<IngestTranscriptRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("transcript text is empty".to_string()));
    }
    if !(0.0..=1.0).contains(&req.confidence) {
        return Err(ApiError::BadRequest(
            "confidence must be within [0, 1]".to_string(),
        ));
    }

    let timestamp = req.timestamp.unwrap_or_else(Utc::now);
    let event = TranscriptEvent {
        id: req
            .id
            .unwrap_or_else(|| TranscriptEvent::derive_id(&call_id, &req.text, timestamp)),
        call_id,
        speaker: req.speaker,
        text: req.text,
        confidence: req.confidence,
        timestamp,
        is_final: req.is_final,
    };
    let event_id = event.id.clone();
    let status = state.orchestrator.handle_transcript(event).await;

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { status, event_id })))
}

/// Viewer-initiated suggestion. Generation runs in the background; the
/// result arrives on the call's WebSocket room like any other suggestion.
pub async fn request_suggestion(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> StatusCode {
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.request_manual(&call_id).await;
    });
    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub id: String,
    pub event_id: String,
    pub call_id: String,
    pub speaker: String,
    pub text: String,
    pub confidence: f64,
    pub spoken_at: String,
    pub created_at: String,
}

impl From<TranscriptRecord> for TranscriptResponse {
    fn from(r: TranscriptRecord) -> Self {
        Self {
            id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
            event_id: r.event_id,
            call_id: r.call_id,
            speaker: r.speaker,
            text: r.text,
            confidence: r.confidence,
            spoken_at: r.spoken_at.try_to_rfc3339_string().unwrap_or_default(),
            created_at: r.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

/// Recent persisted transcripts, oldest first. Used by viewers to hydrate
/// history on join; live updates come over the WebSocket, never by polling.
pub async fn recent_transcripts(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<TranscriptResponse>>, ApiError> {
    let limit = params.limit.clamp(1, 500);
    let records = state.transcripts.recent(&call_id, limit).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub id: String,
    pub call_id: String,
    pub suggestion_type: String,
    pub text: String,
    pub confidence: f64,
    pub reasoning: String,
    pub priority: String,
    pub trigger_reason: String,
    pub created_at: String,
}

impl From<SuggestionRecord> for SuggestionResponse {
    fn from(r: SuggestionRecord) -> Self {
        Self {
            id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
            call_id: r.call_id,
            suggestion_type: r.suggestion_type,
            text: r.text,
            confidence: r.confidence,
            reasoning: r.reasoning,
            priority: r.priority,
            trigger_reason: r.trigger_reason,
            created_at: r.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

pub async fn recent_suggestions(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<SuggestionResponse>>, ApiError> {
    let limit = params.limit.clamp(1, 500);
    let records = state.suggestions.recent(&call_id, limit).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}
