use std::sync::Arc;

use callpilot_orchestrator::Orchestrator;
use callpilot_services::dao::{SuggestionDao, TranscriptDao};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub transcripts: Arc<TranscriptDao>,
    pub suggestions: Arc<SuggestionDao>,
}
