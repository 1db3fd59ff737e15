use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// One persisted AI suggestion. Suggestions broadcast during a storage outage
/// are never backfilled here; they exist only on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub call_id: String,
    pub suggestion_type: String,
    pub text: String,
    pub confidence: f64,
    pub reasoning: String,
    pub priority: String,
    pub trigger_reason: String,
    pub created_at: DateTime,
}

impl SuggestionRecord {
    pub const COLLECTION: &'static str = "suggestions";
}
