use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// One persisted transcript utterance. Stored independently of the in-memory
/// session cache; the live pipeline treats this collection as best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Provider-supplied or derived dedup key.
    pub event_id: String,
    pub call_id: String,
    pub speaker: String,
    pub text: String,
    pub confidence: f64,
    /// When the utterance was spoken (provider clock).
    pub spoken_at: DateTime,
    pub created_at: DateTime,
}

impl TranscriptRecord {
    pub const COLLECTION: &'static str = "transcripts";
}
