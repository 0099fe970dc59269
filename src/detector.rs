//! The Detector pipeline (spec §4.12, component C12): wires C1–C11 together
//! behind the locking discipline spec §5 mandates.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::info;

use crate::approved::ApprovedUsers;
use crate::classifier::Classifier;
use crate::config::DetectorConfig;
use crate::duplicate::DuplicateDetector;
use crate::emoji;
use crate::error::{ClassifierError, ConfigError};
use crate::history::HistoryRing;
use crate::llm::{LlmClient, LlmConfig};
use crate::meta_checks;
use crate::model::{CheckRequest, CheckResponse, Document, HAM, SPAM};
use crate::multilang;
use crate::reputation::{ReputationClient, ReputationConfig};
use crate::similarity::SimilarityIndex;
use crate::stopwords::StopWords;
use crate::tokenizer;

/// State shared behind the single reader/writer lock spec §5 describes:
/// the classifier, the similarity index, and the stop-word/excluded-token
/// sets all move together under `learn`/`unlearn`/`reset`/`loadSamples`.
struct SharedState {
    classifier: Classifier,
    similarity: SimilarityIndex,
    stop_words: StopWords,
    excluded_tokens: HashSet<String>,
}

pub struct Detector {
    config: DetectorConfig,
    state: RwLock<SharedState>,
    duplicates: DuplicateDetector,
    approved: ApprovedUsers,
    ham_history: HistoryRing,
    spam_history: HistoryRing,
    reputation: Option<ReputationClient>,
    llm: Option<LlmClient>,
}

fn load_lines(path: &str) -> Result<Vec<String>, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
    tokenizer::read_lines(BufReader::new(file)).map_err(|source| ConfigError::Io { path: path.to_owned(), source })
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;

        let stop_words = match &config.stop_words_file {
            Some(path) => StopWords::from_lines(load_lines(path)?),
            None => StopWords::new(),
        };

        let excluded_tokens: HashSet<String> = match &config.excluded_tokens_file {
            Some(path) => load_lines(path)?.into_iter().collect(),
            None => HashSet::new(),
        };

        let mut classifier = Classifier::new();
        let mut spam_samples = Vec::new();

        if let Some(path) = &config.spam_samples_file {
            for line in load_lines(path)? {
                let tokens = tokenizer::tokenize_unique(&line, &excluded_tokens);
                spam_samples.push(tokens.iter().map(|t| (t.clone(), 1usize)).collect());
                classifier.learn(&[Document::new(SPAM, tokens)]);
            }
        }

        if let Some(path) = &config.ham_samples_file {
            for line in load_lines(path)? {
                let tokens = tokenizer::tokenize_unique(&line, &excluded_tokens);
                classifier.learn(&[Document::new(HAM, tokens)]);
            }
        }

        let similarity = SimilarityIndex::from_samples(spam_samples);

        let reputation = if config.reputation.api_base.is_empty() {
            None
        } else {
            Some(ReputationClient::new(ReputationConfig {
                api_base: config.reputation.api_base.clone(),
                user_agent: config.reputation.user_agent.clone(),
                repeats: config.reputation.repeats,
            }))
        };

        let llm = if config.llm.api_base.is_empty() {
            None
        } else {
            Some(LlmClient::new(LlmConfig {
                api_base: config.llm.api_base.clone(),
                model: config.llm.model.clone(),
                system_prompt: config
                    .llm
                    .system_prompt
                    .clone()
                    .unwrap_or_else(|| crate::llm::DEFAULT_SYSTEM_PROMPT.to_owned()),
                max_tokens_request: config.llm.max_tokens_request,
                max_symbols_request: config.llm.max_symbols_request,
                retry_count: config.llm.retry_count,
            }))
        };

        let duplicates = DuplicateDetector::new(
            std::time::Duration::from_secs(config.window_secs),
            config.max_entries_per_user,
            config.max_users,
        );
        let approved = ApprovedUsers::new(config.first_messages_count);
        let ham_history = HistoryRing::new(config.history_size);
        let spam_history = HistoryRing::new(config.history_size);

        Ok(Detector {
            state: RwLock::new(SharedState { classifier, similarity, stop_words, excluded_tokens }),
            duplicates,
            approved,
            ham_history,
            spam_history,
            reputation,
            llm,
            config,
        })
    }

    /// Runs the full pipeline (spec §4.12) against one request.
    pub async fn check(&self, request: &CheckRequest) -> (bool, Vec<CheckResponse>) {
        let mut responses = Vec::new();
        let now = SystemTime::now();

        let is_approved = self.approved.is_approved(&request.user_id).await;
        if is_approved && self.config.first_message_only {
            let duplicate = self.duplicates.check_request(request, self.config.threshold, now);
            if duplicate.spam {
                responses.push(duplicate);
                return (true, responses);
            }
            responses.push(duplicate);
            responses.push(CheckResponse::ham("pre-approved", "user is pre-approved"));
            return (false, responses);
        }

        let mut spam = false;

        // 2. Stop words.
        let stop_word_response = {
            let state = self.state.read().await;
            state.stop_words.check(request)
        };
        if stop_word_response.spam {
            spam = true;
        }
        responses.push(stop_word_response);

        // 3. Emoji.
        if self.config.max_allowed_emoji >= 0 {
            let count = emoji::count_emoji(&request.msg) as i64;
            let limit = self.config.max_allowed_emoji;
            let response = if count > limit {
                spam = true;
                CheckResponse::spam("emoji", format!("too many emoji {}/{}", count, limit))
            } else {
                CheckResponse::ham("emoji", format!("{}/{}", count, limit))
            };
            responses.push(response);
        }

        // 4. Message length gate.
        let length_ok = request.msg.chars().count() >= self.config.min_msg_len;
        if !length_ok {
            responses.push(CheckResponse::ham("message length", "too short"));
        }

        let excluded_tokens = { self.state.read().await.excluded_tokens.clone() };
        let tokens = tokenizer::tokenize(&request.msg, &excluded_tokens);

        // 5. Multilingual script mixing (optional).
        if self.config.multi_lang_words != usize::MAX {
            let mixed = multilang::count_mixed_script_tokens(tokens.keys().map(String::as_str));
            let response = if mixed >= self.config.multi_lang_words {
                spam = true;
                CheckResponse::spam("multi-lingual", format!("{} mixed-script tokens", mixed))
            } else {
                CheckResponse::ham("multi-lingual", format!("{} mixed-script tokens", mixed))
            };
            responses.push(response);
        }

        // 6. Abnormal spacing (optional).
        if self.config.min_words_count != usize::MAX {
            let word_count = tokens.len();
            if word_count >= self.config.min_words_count {
                let space_count = request.msg.chars().filter(|c| c.is_whitespace()).count();
                let space_ratio = space_count as f64 / request.msg.chars().count().max(1) as f64;
                let short_words =
                    tokens.keys().filter(|t| t.chars().count() <= self.config.spacing.short_word_len).count();
                let short_word_ratio = short_words as f64 / word_count.max(1) as f64;

                let abnormal = space_ratio > self.config.spacing.space_ratio_threshold
                    && short_word_ratio > self.config.spacing.short_word_ratio_threshold;

                let details = format!("space ratio {:.2}, short word ratio {:.2}", space_ratio, short_word_ratio);
                let response = if abnormal {
                    spam = true;
                    CheckResponse::spam("spacing", details)
                } else {
                    CheckResponse::ham("spacing", details)
                };
                responses.push(response);
            }
        }

        // 7. Meta checks.
        let links_response = meta_checks::links(request, self.config.links_limit);
        if links_response.spam {
            spam = true;
        }
        responses.push(links_response);
        let link_only_response = meta_checks::link_only(request);
        if link_only_response.spam {
            spam = true;
        }
        responses.push(link_only_response);
        for response in [
            meta_checks::images(request),
            meta_checks::videos(request),
            meta_checks::audio(request),
            meta_checks::forward(request),
            meta_checks::keyboard(request),
        ] {
            if response.spam {
                spam = true;
            }
            responses.push(response);
        }
        let mentions_response = meta_checks::mentions(request, self.config.mentions_limit as i32);
        if mentions_response.spam {
            spam = true;
        }
        responses.push(mentions_response);
        let username_response = meta_checks::username_symbols(request, &self.config.username_denied_symbols);
        if username_response.spam {
            spam = true;
        }
        responses.push(username_response);

        // 8. Duplicate detector (always, independent of approval).
        let duplicate_response = self.duplicates.check_request(request, self.config.threshold, now);
        if duplicate_response.spam {
            spam = true;
        }
        responses.push(duplicate_response);

        // 9. Similarity and classifier, only if the length gate passed.
        if length_ok {
            let state = self.state.read().await;
            if !state.similarity.is_empty() {
                let similarity = state.similarity.similarity(&tokens);
                let response = if similarity >= self.config.similarity_threshold {
                    spam = true;
                    CheckResponse::spam("similarity", format!("{:.2}", similarity))
                } else {
                    CheckResponse::ham("similarity", format!("{:.2}", similarity))
                };
                responses.push(response);
            }

            if let Some(classification) = state.classifier.classify(tokens.keys().map(String::as_str)) {
                let response = if classification.class == SPAM {
                    spam = true;
                    CheckResponse::spam("classifier", format!("{:.2}%", classification.probability_percent))
                } else {
                    CheckResponse::ham("classifier", format!("{:.2}%", classification.probability_percent))
                };
                responses.push(response);
            }
        }

        // 10. Reputation, only for first-message-only mode.
        if self.config.first_message_only && (!spam || self.config.llm.open_ai_veto) {
            if let Some(reputation) = &self.reputation {
                let response = reputation.check(&request.user_id).await;
                if response.spam {
                    spam = true;
                }
                responses.push(response);
            }
        }

        // 11. LLM check.
        let short_override = !length_ok && self.config.llm.check_short_messages_with_open_ai;
        let mut llm_actually_ran = false;
        if !spam {
            let should_run = length_ok || short_override;
            if should_run {
                if let Some(llm) = &self.llm {
                    let history = self.ham_history.last(self.config.history_size);
                    let response = llm.check(&request.msg, &history).await;
                    llm_actually_ran = true;
                    if response.spam {
                        spam = true;
                    }
                    responses.push(response);
                }
            }
        } else if self.config.llm.open_ai_veto && length_ok {
            if let Some(llm) = &self.llm {
                let history = self.ham_history.last(self.config.history_size);
                let response = llm.check(&request.msg, &history).await;
                llm_actually_ran = true;
                if !response.spam {
                    spam = false;
                }
                responses.push(response);
            }
        }

        // 12. Post-check bookkeeping.
        let actually_checked = length_ok || (short_override && llm_actually_ran);
        if !spam && actually_checked {
            self.ham_history.push(request.user_name.clone(), &request.msg);
            self.approved.record_checked_ham(&request.user_id, &request.user_name, now).await;
        } else if spam {
            self.spam_history.push(request.user_name.clone(), &request.msg);
        }

        (spam, responses)
    }

    /// Loads additional spam/ham samples into the classifier and similarity
    /// index under the write lock (spec §5, §9).
    pub async fn load_samples(&self, spam: &[String], ham: &[String]) -> Result<(), ClassifierError> {
        let mut state = self.state.write().await;
        let excluded = state.excluded_tokens.clone();

        let mut new_samples = Vec::new();
        for line in spam {
            let tokens = tokenizer::tokenize_unique(line, &excluded);
            new_samples.push(tokens.iter().map(|t| (t.clone(), 1usize)).collect());
            state.classifier.learn(&[Document::new(SPAM, tokens)]);
        }
        for line in ham {
            let tokens = tokenizer::tokenize_unique(line, &excluded);
            state.classifier.learn(&[Document::new(HAM, tokens)]);
        }

        let mut samples = state.similarity.clone_samples();
        samples.extend(new_samples);
        state.similarity = SimilarityIndex::from_samples(samples);
        Ok(())
    }

    pub async fn update_spam(&self, msg: &str) -> Result<(), ClassifierError> {
        let mut state = self.state.write().await;
        let excluded = state.excluded_tokens.clone();
        let tokens = tokenizer::tokenize_unique(msg, &excluded);
        state.classifier.learn(&[Document::new(SPAM, tokens)]);
        Ok(())
    }

    pub async fn update_ham(&self, msg: &str) -> Result<(), ClassifierError> {
        let mut state = self.state.write().await;
        let excluded = state.excluded_tokens.clone();
        let tokens = tokenizer::tokenize_unique(msg, &excluded);
        state.classifier.learn(&[Document::new(HAM, tokens)]);
        Ok(())
    }

    pub async fn reload_stop_words(&self, path: &str) -> Result<(), ConfigError> {
        let lines = load_lines(path)?;
        let mut state = self.state.write().await;
        state.stop_words = StopWords::from_lines(lines);
        info!(path, "reloaded stop words");
        Ok(())
    }

    pub async fn reload_excluded_tokens(&self, path: &str) -> Result<(), ConfigError> {
        let lines = load_lines(path)?;
        let mut state = self.state.write().await;
        state.excluded_tokens = lines.into_iter().collect();
        info!(path, "reloaded excluded tokens");
        Ok(())
    }

    pub async fn approved_users(&self) -> Vec<crate::approved::ApprovedUser> {
        self.approved.approved_users().await
    }
}
