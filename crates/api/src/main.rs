use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use callpilot_api::{build_router, state::AppState};
use callpilot_config::{AppConfig, OrchestratorSettings};
use callpilot_orchestrator::{EventStore, Orchestrator, OrchestratorConfig, SuggestionGenerator};
use callpilot_services::dao::{SuggestionDao, TranscriptDao};
use callpilot_services::{MongoEventStore, OpenAiGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let client = mongodb::Client::with_uri_str(&config.mongo.uri).await?;
    let db = client.database(&config.mongo.database);
    callpilot_db::indexes::ensure_indexes(&db).await?;

    let generator: Arc<dyn SuggestionGenerator> =
        Arc::new(OpenAiGenerator::new(config.generator.clone())?);
    let store: Arc<dyn EventStore> = Arc::new(MongoEventStore::new(&db));
    let orchestrator = Orchestrator::new(
        orchestrator_config(&config.orchestrator),
        generator,
        store,
    );

    let state = AppState {
        orchestrator,
        transcripts: Arc::new(TranscriptDao::new(&db)),
        suggestions: Arc::new(SuggestionDao::new(&db)),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, version = env!("CARGO_PKG_VERSION"), "CallPilot API listening");
    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

fn orchestrator_config(s: &OrchestratorSettings) -> OrchestratorConfig {
    OrchestratorConfig {
        min_words_for_analysis: s.min_words_for_analysis,
        min_suggestion_interval_secs: s.min_suggestion_interval_secs,
        long_pause_threshold_secs: s.long_pause_threshold_secs,
        periodic_interval_secs: s.periodic_interval_secs,
        max_wait_without_suggestion_secs: s.max_wait_without_suggestion_secs,
        history_capacity: s.history_capacity,
        context_max_entries: s.context_max_entries,
        context_max_words: s.context_max_words,
        dedup_capacity: s.dedup_capacity,
        generation_timeout_secs: s.generation_timeout_secs,
        drain_grace_secs: s.drain_grace_secs,
        idle_timeout_secs: s.idle_timeout_secs,
    }
}
