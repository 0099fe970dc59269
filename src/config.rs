//! Detector configuration: every threshold and toggle named across spec
//! §4, loaded from YAML the way the original platform config was (spec
//! §2/§4.13, component C13).

use serde::Deserialize;

use crate::error::ConfigError;

fn default_min_msg_len() -> usize {
    150
}

fn default_max_allowed_emoji() -> i64 {
    2
}

fn default_similarity_threshold() -> f64 {
    0.5
}

fn default_threshold() -> i64 {
    3
}

fn default_window_secs() -> u64 {
    3600
}

fn default_max_entries_per_user() -> usize {
    200
}

fn default_max_users() -> usize {
    10_000
}

fn default_first_messages_count() -> u64 {
    1
}

fn default_repeats() -> u32 {
    3
}

fn default_retry_count() -> u32 {
    3
}

fn default_max_tokens_request() -> usize {
    2048
}

fn default_max_symbols_request() -> usize {
    4096
}

fn default_multi_lang_words() -> usize {
    usize::MAX
}

fn default_min_words_count() -> usize {
    usize::MAX
}

fn default_history_size() -> usize {
    10
}

fn default_mentions_limit() -> i64 {
    -1
}

fn default_links_limit() -> u32 {
    u32::MAX
}

/// Abnormal-spacing thresholds (spec §4.12 step 6): space-ratio and
/// short-word-ratio over a message's tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpacingConfig {
    pub space_ratio_threshold: f64,
    pub short_word_ratio_threshold: f64,
    pub short_word_len: usize,
}

impl Default for SpacingConfig {
    fn default() -> Self {
        SpacingConfig {
            space_ratio_threshold: 1.0,
            short_word_ratio_threshold: 1.0,
            short_word_len: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReputationSection {
    pub api_base: String,
    pub user_agent: Option<String>,
    #[serde(default = "default_repeats")]
    pub repeats: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub api_base: String,
    pub model: String,
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_tokens_request")]
    pub max_tokens_request: usize,
    #[serde(default = "default_max_symbols_request")]
    pub max_symbols_request: usize,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    pub open_ai_veto: bool,
    pub check_short_messages_with_open_ai: bool,
}

impl Default for LlmSection {
    fn default() -> Self {
        LlmSection {
            api_base: String::new(),
            model: "gpt-4o-mini".to_owned(),
            system_prompt: None,
            max_tokens_request: default_max_tokens_request(),
            max_symbols_request: default_max_symbols_request(),
            retry_count: default_retry_count(),
            open_ai_veto: false,
            check_short_messages_with_open_ai: false,
        }
    }
}

/// Full detector configuration (spec §2/§4.13). Every field has a sane
/// default so a near-empty YAML document still produces a working config;
/// `validate` then checks for internally-inconsistent combinations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    #[serde(default = "default_min_msg_len")]
    pub min_msg_len: usize,
    /// Negative disables the emoji check entirely.
    #[serde(default = "default_max_allowed_emoji")]
    pub max_allowed_emoji: i64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Duplicate-detector threshold; `<= 0` disables C7.
    #[serde(default = "default_threshold")]
    pub threshold: i64,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_entries_per_user")]
    pub max_entries_per_user: usize,
    #[serde(default = "default_max_users")]
    pub max_users: usize,

    #[serde(default = "default_first_messages_count")]
    pub first_messages_count: u64,
    pub first_message_only: bool,

    #[serde(default = "default_multi_lang_words")]
    pub multi_lang_words: usize,
    #[serde(default = "default_min_words_count")]
    pub min_words_count: usize,
    pub spacing: SpacingConfig,

    #[serde(default = "default_mentions_limit")]
    pub mentions_limit: i64,
    #[serde(default = "default_links_limit")]
    pub links_limit: u32,
    pub username_denied_symbols: Vec<char>,

    #[serde(default = "default_history_size")]
    pub history_size: usize,

    pub stop_words_file: Option<String>,
    pub spam_samples_file: Option<String>,
    pub ham_samples_file: Option<String>,
    pub excluded_tokens_file: Option<String>,

    pub reputation: ReputationSection,
    pub llm: LlmSection,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            min_msg_len: default_min_msg_len(),
            max_allowed_emoji: default_max_allowed_emoji(),
            similarity_threshold: default_similarity_threshold(),
            threshold: default_threshold(),
            window_secs: default_window_secs(),
            max_entries_per_user: default_max_entries_per_user(),
            max_users: default_max_users(),
            first_messages_count: default_first_messages_count(),
            first_message_only: false,
            multi_lang_words: default_multi_lang_words(),
            min_words_count: default_min_words_count(),
            spacing: SpacingConfig::default(),
            mentions_limit: default_mentions_limit(),
            links_limit: default_links_limit(),
            username_denied_symbols: Vec::new(),
            history_size: default_history_size(),
            stop_words_file: None,
            spam_samples_file: None,
            ham_samples_file: None,
            excluded_tokens_file: None,
            reputation: ReputationSection::default(),
            llm: LlmSection::default(),
        }
    }
}

impl DetectorConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: DetectorConfig = serde_yaml::from_str(text)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn load_file(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
        Self::from_yaml(&text)
    }

    /// Accumulates every problem rather than failing on the first, matching
    /// how platform configs in this codebase have always reported invalid
    /// combinations.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.similarity_threshold < 0.0 || self.similarity_threshold > 1.0 {
            errors.push(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            ));
        }

        if self.max_entries_per_user == 0 {
            errors.push("max_entries_per_user must be at least 1".to_owned());
        }

        if self.max_users == 0 {
            errors.push("max_users must be at least 1".to_owned());
        }

        if self.threshold > 0 && self.window_secs == 0 {
            errors.push("window_secs must be positive when the duplicate threshold is enabled".to_owned());
        }

        if !self.llm.api_base.is_empty() && self.llm.max_tokens_request == 0 {
            errors.push("llm.max_tokens_request must be positive when an llm api_base is configured".to_owned());
        }

        if self.llm.open_ai_veto && self.llm.api_base.is_empty() {
            errors.push("llm.open_ai_veto is set but llm.api_base is empty".to_owned());
        }

        if !self.reputation.api_base.is_empty() && self.reputation.repeats == 0 {
            errors.push("reputation.repeats must be at least 1 when an api_base is configured".to_owned());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
