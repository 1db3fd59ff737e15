use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use callpilot_config::GeneratorConfig;
use callpilot_orchestrator::{
    GeneratedSuggestion, SuggestionGenerator, SuggestionPriority, SuggestionTrigger,
    SuggestionType,
};

const SYSTEM_PROMPT: &str = "You are a real-time sales coach listening to a live call. \
Given the recent conversation, reply with one short, immediately actionable suggestion \
for the seller. Respond as JSON: {\"text\": ..., \"type\": one of objection_handling|\
closing|question|pricing|feature_highlight|rapport_building|next_steps|follow_up|general, \
\"confidence\": 0..1, \"reasoning\": ..., \"priority\": low|medium|high|urgent}.";

/// Suggestion generator backed by an OpenAI-compatible chat completions
/// endpoint. The orchestrator owns the hard generation timeout; the client
/// timeout here only guards against a wedged connection.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl OpenAiGenerator {
    pub fn new(config: GeneratorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("building generator HTTP client")?;
        Ok(Self { client, config })
    }

    /// Tolerant reply parsing: the model is asked for JSON but plain text
    /// comes back often enough that it must still produce a usable
    /// suggestion (the coordinator classifies untyped text itself).
    fn parse_reply(content: &str) -> GeneratedSuggestion {
        #[derive(Deserialize)]
        struct Reply {
            text: String,
            #[serde(rename = "type")]
            suggestion_type: Option<String>,
            confidence: Option<f64>,
            reasoning: Option<String>,
            priority: Option<String>,
        }

        match serde_json::from_str::<Reply>(content.trim()) {
            Ok(reply) => GeneratedSuggestion {
                text: reply.text,
                suggestion_type: reply.suggestion_type.as_deref().and_then(parse_type),
                confidence: reply.confidence.map(|c| c.clamp(0.0, 1.0)),
                reasoning: reply.reasoning,
                priority: reply.priority.as_deref().and_then(parse_priority),
            },
            Err(_) => GeneratedSuggestion {
                text: content.trim().to_string(),
                ..Default::default()
            },
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl SuggestionGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        context: &str,
        trigger: &SuggestionTrigger,
    ) -> anyhow::Result<GeneratedSuggestion> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!(
                        "Trigger: {}\n\nRecent conversation:\n{}",
                        trigger.reason.as_str(),
                        context
                    ),
                },
            ],
            "temperature": 0.7,
            "max_tokens": 250,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("generator request failed")?
            .error_for_status()
            .context("generator returned an error status")?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("decoding generator response")?;
        let content = &parsed
            .choices
            .first()
            .context("generator returned no choices")?
            .message
            .content;

        debug!(model = %self.config.model, reason = trigger.reason.as_str(), "suggestion generated");
        Ok(Self::parse_reply(content))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn parse_type(label: &str) -> Option<SuggestionType> {
    match label {
        "objection_handling" => Some(SuggestionType::ObjectionHandling),
        "closing" => Some(SuggestionType::Closing),
        "question" => Some(SuggestionType::Question),
        "pricing" => Some(SuggestionType::Pricing),
        "feature_highlight" => Some(SuggestionType::FeatureHighlight),
        "rapport_building" => Some(SuggestionType::RapportBuilding),
        "next_steps" => Some(SuggestionType::NextSteps),
        "follow_up" => Some(SuggestionType::FollowUp),
        "general" => Some(SuggestionType::General),
        _ => None,
    }
}

fn parse_priority(label: &str) -> Option<SuggestionPriority> {
    match label {
        "low" => Some(SuggestionPriority::Low),
        "medium" => Some(SuggestionPriority::Medium),
        "high" => Some(SuggestionPriority::High),
        "urgent" => Some(SuggestionPriority::Urgent),
        _ => None,
    }
}
