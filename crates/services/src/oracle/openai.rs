use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use surge_core::model::{Message, MessageRole, SsiScore};

use crate::error::OracleError;
use crate::oracle::{OracleReply, ScoringOracle};

/// Coaching persona plus the scoring contract. The model is asked to close
/// every reply with a machine-readable `SSI:` line which is parsed off and
/// never shown to the student.
const SYSTEM_PROMPT: &str = "\
You are an AI co-founder coaching a student founder through the SURGE \
reflective framework. Ask one probing question at a time and keep replies \
under 120 words. When the user message is exactly __AUTO_SURGE_START__, \
treat it as the start of the session and open with your first reflective \
question. After every reply, on a final separate line, emit the student's \
current Solution-Seeking Index as \
SSI: {\"overall\":N,\"selfAwareness\":N,\"understandingOpportunities\":N,\
\"resilience\":N,\"growthExecution\":N,\"entrepreneurialLeadership\":N} \
with each value 0-100. Omit the SSI line entirely if the conversation does \
not yet carry enough signal to score.";

const SSI_LINE_PREFIX: &str = "SSI:";

#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl OracleConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("SURGE_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("SURGE_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("SURGE_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// `ScoringOracle` backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiOracle {
    client: Client,
    config: Option<OracleConfig>,
}

impl OpenAiOracle {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(OracleConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<OracleConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl ScoringOracle for OpenAiOracle {
    async fn exchange(&self, transcript: &[Message]) -> Result<OracleReply, OracleError> {
        let config = self.config.as_ref().ok_or(OracleError::Disabled)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        });
        for message in transcript {
            messages.push(ChatMessage {
                role: match message.role() {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: message.text().to_string(),
            });
        }
        let payload = ChatRequest {
            model: config.model.clone(),
            messages,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OracleError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(OracleError::EmptyResponse)?;

        let (message, score) = split_ssi_line(&content);
        if message.is_empty() {
            return Err(OracleError::EmptyResponse);
        }

        Ok(OracleReply { message, score })
    }
}

/// Splits the trailing `SSI:` line off a completion. A malformed or missing
/// line yields no score rather than an error: the engine then retains the
/// previous score.
fn split_ssi_line(content: &str) -> (String, Option<SsiScore>) {
    let trimmed = content.trim();
    // A reply that is nothing but the score line still gets the line
    // stripped; the caller then rejects the empty remainder.
    let (head, last_line) = match trimmed.rsplit_once('\n') {
        Some((head, last_line)) => (head, last_line),
        None => ("", trimmed),
    };
    let last_line = last_line.trim();
    let Some(raw_json) = last_line.strip_prefix(SSI_LINE_PREFIX) else {
        return (trimmed.to_string(), None);
    };
    let score = serde_json::from_str::<SsiWire>(raw_json.trim())
        .ok()
        .and_then(SsiWire::into_score);
    (head.trim().to_string(), score)
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SsiWire {
    overall: u8,
    self_awareness: u8,
    understanding_opportunities: u8,
    resilience: u8,
    growth_execution: u8,
    entrepreneurial_leadership: u8,
}

impl SsiWire {
    fn into_score(self) -> Option<SsiScore> {
        SsiScore::new(
            self.overall,
            self.self_awareness,
            self.understanding_opportunities,
            self.resilience,
            self.growth_execution,
            self.entrepreneurial_leadership,
        )
        .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_api_key() {
        let oracle = OpenAiOracle::new(None);
        assert!(!oracle.enabled());
    }

    #[test]
    fn splits_trailing_ssi_line() {
        let content = "What obstacle scares you most?\nSSI: {\"overall\":55,\
            \"selfAwareness\":60,\"understandingOpportunities\":50,\
            \"resilience\":52,\"growthExecution\":48,\"entrepreneurialLeadership\":58}";
        let (message, score) = split_ssi_line(content);
        assert_eq!(message, "What obstacle scares you most?");
        let score = score.expect("score parsed");
        assert_eq!(score.overall(), 55);
        assert_eq!(score.self_awareness(), 60);
    }

    #[test]
    fn reply_without_ssi_line_has_no_score() {
        let (message, score) = split_ssi_line("Tell me more about your idea.");
        assert_eq!(message, "Tell me more about your idea.");
        assert!(score.is_none());
    }

    #[test]
    fn ssi_only_reply_never_leaks_the_score_line() {
        let content = "SSI: {\"overall\":55,\"selfAwareness\":60,\
            \"understandingOpportunities\":50,\"resilience\":52,\
            \"growthExecution\":48,\"entrepreneurialLeadership\":58}";
        let (message, score) = split_ssi_line(content);
        assert!(message.is_empty());
        assert!(score.is_some());
    }

    #[test]
    fn malformed_ssi_line_is_dropped_not_fatal() {
        let (message, score) = split_ssi_line("Good thought.\nSSI: {not json}");
        assert_eq!(message, "Good thought.");
        assert!(score.is_none());
    }

    #[test]
    fn out_of_range_ssi_is_dropped() {
        let content = "Noted.\nSSI: {\"overall\":120,\"selfAwareness\":60,\
            \"understandingOpportunities\":50,\"resilience\":52,\
            \"growthExecution\":48,\"entrepreneurialLeadership\":58}";
        let (_, score) = split_ssi_line(content);
        assert!(score.is_none());
    }
}
