use std::env;
use std::fmt::Write as _;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use tutor_core::mastery::MasteryEstimate;
use tutor_core::model::{AnswerEvent, TopicEstimate, TopicId};

use crate::error::AnalysisError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You assess a learner's mastery per topic from their \
answers. Reply with JSON only, shaped as \
{\"topics\":[{\"topic_id\":<integer>,\"percentage\":<0-100>}]}, \
with one entry per topic that appears in the answers.";

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl AnalysisConfig {
    /// Read `TUTOR_AI_API_KEY`, `TUTOR_AI_BASE_URL` and `TUTOR_AI_MODEL`.
    ///
    /// Returns `None` when no usable API key is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("TUTOR_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("TUTOR_AI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model = env::var("TUTOR_AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Chat-completions client that turns answer history into topic estimates.
#[derive(Clone)]
pub struct MasteryAnalysisClient {
    client: Client,
    config: Option<AnalysisConfig>,
}

impl MasteryAnalysisClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AnalysisConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<AnalysisConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Ask the model for per-topic mastery estimates.
    ///
    /// An empty answer list short-circuits to an empty result without a
    /// request.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` when the client is disabled, the request fails,
    /// or the reply cannot be parsed.
    pub async fn analyze(
        &self,
        events: &[AnswerEvent],
    ) -> Result<Vec<TopicEstimate>, AnalysisError> {
        let config = self.config.as_ref().ok_or(AnalysisError::Disabled)?;
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: render_events(events),
                },
            ],
            temperature: 0.0,
        };

        tracing::debug!(model = %config.model, answers = events.len(), "requesting mastery analysis");
        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "mastery analysis request rejected");
            return Err(AnalysisError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AnalysisError::EmptyResponse)?;

        parse_estimates(&content)
    }
}

impl std::fmt::Debug for MasteryAnalysisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasteryAnalysisClient")
            .field("enabled", &self.enabled())
            .field("model", &self.config.as_ref().map(|c| c.model.as_str()))
            .finish_non_exhaustive()
    }
}

/// One line per answer: `topic=<id> correct=<bool> [secs=<n>]`.
fn render_events(events: &[AnswerEvent]) -> String {
    let mut out = String::from("Answers:\n");
    for event in events {
        let _ = write!(out, "topic={} correct={}", event.topic_id, event.is_correct);
        if let Some(secs) = event.time_taken_secs {
            let _ = write!(out, " secs={secs}");
        }
        out.push('\n');
    }
    out
}

/// Parse a model reply into topic estimates.
///
/// Accepts the bare JSON object or one wrapped in a Markdown code fence.
/// Percentages outside 0..=100 are clamped. Fractions are kept and only
/// rounded when blended into a stored record.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidPayload` if the reply is not the expected
/// JSON shape.
pub fn parse_estimates(content: &str) -> Result<Vec<TopicEstimate>, AnalysisError> {
    let json = strip_code_fence(content.trim());
    let payload: EstimatePayload =
        serde_json::from_str(json).map_err(|e| AnalysisError::InvalidPayload(e.to_string()))?;

    Ok(payload
        .topics
        .into_iter()
        .map(|entry| TopicEstimate::new(entry.topic_id, MasteryEstimate::clamped(entry.percentage)))
        .collect())
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    // Drop an optional language tag on the opening fence.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Deserialize)]
struct EstimatePayload {
    topics: Vec<EstimateEntry>,
}

#[derive(Debug, Deserialize)]
struct EstimateEntry {
    topic_id: TopicId,
    percentage: f64,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let estimates =
            parse_estimates(r#"{"topics":[{"topic_id":3,"percentage":72},{"topic_id":1,"percentage":0}]}"#)
                .unwrap();
        assert_eq!(estimates.len(), 2);
        assert_eq!(estimates[0].topic_id, TopicId::new(3));
        assert_eq!(estimates[0].percentage.value(), 72.0);
        assert_eq!(estimates[1].percentage.value(), 0.0);
    }

    #[test]
    fn parses_fenced_json_with_language_tag() {
        let content = "```json\n{\"topics\":[{\"topic_id\":2,\"percentage\":55.6}]}\n```\n";
        let estimates = parse_estimates(content).unwrap();
        assert_eq!(estimates[0].topic_id, TopicId::new(2));
        assert_eq!(estimates[0].percentage.value(), 55.6);
    }

    #[test]
    fn clamps_out_of_range_percentages() {
        let estimates = parse_estimates(
            r#"{"topics":[{"topic_id":1,"percentage":140},{"topic_id":2,"percentage":-20}]}"#,
        )
        .unwrap();
        assert_eq!(estimates[0].percentage.value(), 100.0);
        assert_eq!(estimates[1].percentage.value(), 0.0);
    }

    #[test]
    fn rejects_unexpected_shape() {
        assert!(matches!(
            parse_estimates("the learner is doing fine"),
            Err(AnalysisError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_estimates(r#"{"topics":[{"topic":1}]}"#),
            Err(AnalysisError::InvalidPayload(_))
        ));
    }

    #[test]
    fn empty_topic_list_is_valid() {
        assert!(parse_estimates(r#"{"topics":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn render_lists_each_answer() {
        let events = [
            AnswerEvent::new(TopicId::new(1), true).with_time_taken(9),
            AnswerEvent::new(TopicId::new(2), false),
        ];
        assert_eq!(
            render_events(&events),
            "Answers:\ntopic=1 correct=true secs=9\ntopic=2 correct=false\n"
        );
    }

    #[tokio::test]
    async fn disabled_client_refuses_to_analyze() {
        let client = MasteryAnalysisClient::new(None);
        assert!(!client.enabled());
        let err = client
            .analyze(&[AnswerEvent::new(TopicId::new(1), true)])
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Disabled));
    }
}
