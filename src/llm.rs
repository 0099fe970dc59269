//! LLM-backed spam classification (spec §4.9, component C9).
//!
//! Input reduction mirrors a conventional char-based token estimator
//! (tokens ≈ chars / 4): history is dropped oldest-first until the request
//! fits `max_tokens_request`; if it still doesn't, the message itself is
//! truncated to `max_symbols_request` characters as a blunter fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CheckError;
use crate::history::HistoryEntry;
use crate::model::CheckResponse;

const CHARS_PER_TOKEN: usize = 4;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a spam filter for chat messages. \
Respond with a JSON object of the shape {\"spam\": bool, \"reason\": string, \"confidence\": number} \
where confidence is an integer from 1 to 100. Set spam=true only when confidence is greater than 80.";

static THOUGHT_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<thought>.*?</thought>").expect("static thought-span regex is valid"));

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens_request: usize,
    pub max_symbols_request: usize,
    pub retry_count: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_base: String::new(),
            model: "gpt-4o-mini".to_owned(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            max_tokens_request: 2048,
            max_symbols_request: 4096,
            retry_count: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Verdict {
    spam: bool,
    reason: String,
    confidence: f64,
}

fn estimate_tokens(text: &str) -> usize {
    text.len() / CHARS_PER_TOKEN + 1
}

fn format_history(history: &[HistoryEntry]) -> String {
    history
        .iter()
        .map(|entry| format!("\"{}\": \"{}\"", entry.user_name, entry.msg))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the user-message content, trimming oldest history entries first to
/// fit `max_tokens_request`, falling back to truncating the message itself
/// to `max_symbols_request` characters.
fn build_user_content(msg: &str, history: &[HistoryEntry], config: &LlmConfig) -> String {
    let mut kept = history.to_vec();
    loop {
        let content = render_content(msg, &kept);
        if estimate_tokens(&content) <= config.max_tokens_request || kept.is_empty() {
            if estimate_tokens(&content) <= config.max_tokens_request {
                return content;
            }
            break;
        }
        kept.remove(0);
    }

    let truncated: String = msg.chars().take(config.max_symbols_request).collect();
    render_content(&truncated, &[])
}

fn render_content(msg: &str, history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        format!("User message:\n{}", msg)
    } else {
        format!("User message:\n{}\n\nHistory:\n{}", msg, format_history(history))
    }
}

fn strip_thoughts(text: &str) -> String {
    THOUGHT_SPAN.replace_all(text, "").trim().to_owned()
}

pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("llm http client configuration is valid");
        LlmClient { client, config }
    }

    /// Classifies `msg` given prior clean messages from the same chat,
    /// retrying transport/parse failures up to `retry_count` times.
    pub async fn check(&self, msg: &str, history: &[HistoryEntry]) -> CheckResponse {
        let content = build_user_content(msg, history, &self.config);
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage { role: "system", content: self.config.system_prompt.clone() },
                ChatMessage { role: "user", content },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let mut last_error = String::new();
        for attempt in 1..=self.config.retry_count.max(1) {
            match self.attempt(&request).await {
                Ok(verdict) => {
                    let reason = verdict.reason.trim_end_matches('.');
                    let details = format!("{}, confidence: {}%", reason, verdict.confidence as i64);
                    return if verdict.spam && verdict.confidence > 80.0 {
                        CheckResponse::spam("openai", details)
                    } else {
                        CheckResponse::ham("openai", details)
                    };
                }
                Err(err) => {
                    warn!(attempt, error = %err, "llm check attempt failed");
                    last_error = err;
                }
            }
        }

        let error = CheckError::Transport(last_error.clone());
        let mut response = CheckResponse::ham("openai", format!("OpenAI error: {}", last_error));
        response.error = Some(error);
        response
    }

    async fn attempt(&self, request: &ChatCompletionRequest) -> Result<Verdict, String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base.trim_end_matches('/')))
            .json(request)
            .send()
            .await
            .map_err(|err| err.to_string())?;

        if !response.status().is_success() {
            return Err(format!("unexpected status {}", response.status().as_u16()));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|err| err.to_string())?;
        let raw = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| "empty response".to_owned())?;

        let cleaned = strip_thoughts(&raw);
        serde_json::from_str::<Verdict>(&cleaned).map_err(|err| err.to_string())
    }
}
