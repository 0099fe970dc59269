//! Reputation lookup against an external anti-spam service (spec §4.8,
//! component C8).

use serde::Deserialize;
use tracing::warn;

use crate::error::CheckError;
use crate::model::CheckResponse;

#[derive(Debug, Clone, Deserialize)]
struct ReputationResponse {
    ok: bool,
    #[serde(default)]
    description: String,
}

/// Configuration the reputation client needs to reach the external service.
#[derive(Debug, Clone)]
pub struct ReputationConfig {
    pub api_base: String,
    pub user_agent: Option<String>,
    pub repeats: u32,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        ReputationConfig {
            api_base: String::new(),
            user_agent: None,
            repeats: 3,
        }
    }
}

pub struct ReputationClient {
    client: reqwest::Client,
    config: ReputationConfig,
}

impl ReputationClient {
    pub fn new(config: ReputationConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        let agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned());
        builder = builder.user_agent(agent);
        let client = builder.build().expect("reputation http client configuration is valid");
        ReputationClient { client, config }
    }

    /// Looks up `user_id`'s reputation, retrying on transport error, a
    /// non-2xx status, or a non-JSON content type, up to `repeats` attempts.
    pub async fn check(&self, user_id: &str) -> CheckResponse {
        if user_id.is_empty() {
            return CheckResponse::ham("cas", "check disabled");
        }

        let url = format!("{}/check?user_id={}", self.config.api_base.trim_end_matches('/'), user_id);

        let mut last_error = CheckError::Transport("failed to send request".to_owned());
        for attempt in 1..=self.config.repeats.max(1) {
            match self.client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        last_error = CheckError::UnexpectedStatus(status.as_u16());
                        warn!(user_id, attempt, status = status.as_u16(), "reputation check got a non-2xx status");
                        continue;
                    }

                    let content_type = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("")
                        .to_owned();
                    if !content_type.contains("json") {
                        last_error = CheckError::UnexpectedContentType(content_type);
                        warn!(user_id, attempt, "reputation check got a non-JSON content type");
                        continue;
                    }

                    match response.json::<ReputationResponse>().await {
                        Ok(body) => return Self::to_response(body),
                        Err(err) => {
                            last_error = CheckError::UnexpectedContentType(content_type);
                            warn!(user_id, attempt, error = %err, "reputation response did not parse as JSON");
                            continue;
                        }
                    }
                }
                Err(err) => {
                    last_error = CheckError::Transport(format!("failed to send request: {}", err));
                    warn!(user_id, attempt, error = %err, "reputation check transport error");
                }
            }
        }

        CheckResponse::errored("cas", last_error)
    }

    fn to_response(body: ReputationResponse) -> CheckResponse {
        let description = body.description.to_lowercase();
        if body.ok {
            let details = description.trim_end_matches('.');
            let details = if details.is_empty() { "spam detected".to_owned() } else { details.to_owned() };
            CheckResponse::spam("cas", details)
        } else {
            CheckResponse::ham("cas", description)
        }
    }
}
