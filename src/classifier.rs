//! Online multinomial Naive Bayes classifier (spec §4.3, component C3).
//!
//! This mirrors the shape of a conventional spam-filter Bayesian classifier
//! (token counts per class, Laplace smoothing, log-space posteriors) but
//! generalizes it to support `unlearn` with strict failure semantics and a
//! numerically stable softmax over an arbitrary number of classes, neither
//! of which a simple two-class, learn-only classifier needs.

use std::collections::HashMap;

use crate::error::ClassifierError;
use crate::model::{Class, Document};

/// The classifier's full mutable state (spec §3, `ClassifierState`).
#[derive(Debug, Clone, Default)]
pub struct ClassifierState {
    /// token -> class -> count
    pub learning_results: HashMap<String, HashMap<Class, u64>>,
    pub n_document_by_class: HashMap<Class, u64>,
    pub n_frequency_by_class: HashMap<Class, u64>,
    pub n_all_document: u64,
    pub prior_probabilities: HashMap<Class, f64>,
}

impl ClassifierState {
    fn recompute_priors(&mut self) {
        self.prior_probabilities.clear();
        if self.n_all_document == 0 {
            return;
        }

        for (class, &count) in &self.n_document_by_class {
            let p = count as f64 / self.n_all_document as f64;
            self.prior_probabilities.insert(class.clone(), p.ln());
        }
    }

    fn vocabulary_size(&self) -> usize {
        self.learning_results.len()
    }
}

/// The result of [`Classifier::classify`] (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class: Class,
    pub probability_percent: f64,
    pub certain: bool,
}

/// A trainable, thread-local (locking is the caller's job per spec §5)
/// Bayesian classifier.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    state: ClassifierState,
}

impl Classifier {
    pub fn new() -> Self {
        Classifier::default()
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    /// Trains on each document: increments document/class/token counts and
    /// recomputes priors.
    pub fn learn<'a>(&mut self, docs: impl IntoIterator<Item = &'a Document>) {
        for doc in docs {
            self.state.n_all_document += 1;
            *self.state.n_document_by_class.entry(doc.class.clone()).or_insert(0) += 1;

            for token in &doc.tokens {
                *self
                    .state
                    .n_frequency_by_class
                    .entry(doc.class.clone())
                    .or_insert(0) += 1;
                let per_class = self
                    .state
                    .learning_results
                    .entry(token.clone())
                    .or_insert_with(HashMap::new);
                *per_class.entry(doc.class.clone()).or_insert(0) += 1;
            }
        }

        self.state.recompute_priors();
    }

    /// Reverses the effect of having learned `docs`. Fails without mutating
    /// state if any document's removal would violate an invariant (spec
    /// §4.3).
    pub fn unlearn<'a>(
        &mut self,
        docs: impl IntoIterator<Item = &'a Document>,
    ) -> Result<(), ClassifierError> {
        let docs: Vec<&Document> = docs.into_iter().collect();

        if docs.len() as u64 > self.state.n_all_document {
            return Err(ClassifierError::OverUnlearn {
                requested: docs.len(),
                available: self.state.n_all_document as usize,
            });
        }

        for doc in &docs {
            let class_count = self.state.n_document_by_class.get(&doc.class).copied().unwrap_or(0);
            if class_count == 0 {
                return Err(ClassifierError::ClassEmpty(doc.class.clone()));
            }

            for token in &doc.tokens {
                let count = self
                    .state
                    .learning_results
                    .get(token)
                    .and_then(|per_class| per_class.get(&doc.class))
                    .copied()
                    .unwrap_or(0);
                if count == 0 {
                    return Err(ClassifierError::TokenMissing {
                        token: token.clone(),
                        class: doc.class.clone(),
                    });
                }
            }
        }

        // All documents validated; apply the removal.
        for doc in &docs {
            self.state.n_all_document -= 1;
            if let Some(count) = self.state.n_document_by_class.get_mut(&doc.class) {
                *count -= 1;
                if *count == 0 {
                    self.state.n_document_by_class.remove(&doc.class);
                }
            }

            for token in &doc.tokens {
                if let Some(count) = self.state.n_frequency_by_class.get_mut(&doc.class) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        self.state.n_frequency_by_class.remove(&doc.class);
                    }
                }

                let mut purge_token = false;
                if let Some(per_class) = self.state.learning_results.get_mut(token) {
                    if let Some(count) = per_class.get_mut(&doc.class) {
                        *count -= 1;
                        if *count == 0 {
                            per_class.remove(&doc.class);
                        }
                    }
                    purge_token = per_class.is_empty();
                }
                if purge_token {
                    self.state.learning_results.remove(token);
                }
            }
        }

        self.state.recompute_priors();
        Ok(())
    }

    /// Zeros all state.
    pub fn reset(&mut self) {
        self.state = ClassifierState::default();
    }

    /// Classifies a token multiset, returning the most probable class. Returns
    /// `None` if there are no known classes to score against (i.e. nothing
    /// has ever been learned).
    pub fn classify<'a>(&self, tokens: impl IntoIterator<Item = &'a str>) -> Option<Classification> {
        if self.state.prior_probabilities.is_empty() {
            return None;
        }

        let tokens: std::collections::HashSet<&str> = tokens.into_iter().collect();
        let vocabulary_size = self.state.vocabulary_size().max(1) as f64;

        let mut log_posteriors: HashMap<Class, f64> = HashMap::new();
        for (class, &prior) in &self.state.prior_probabilities {
            let freq_for_class = self.state.n_frequency_by_class.get(class).copied().unwrap_or(0) as f64;
            let mut posterior = prior;

            for token in &tokens {
                let count = self
                    .state
                    .learning_results
                    .get(*token)
                    .and_then(|per_class| per_class.get(class))
                    .copied()
                    .unwrap_or(0) as f64;

                posterior += ((count + 1.0) / (freq_for_class + vocabulary_size)).ln();
            }

            log_posteriors.insert(class.clone(), posterior);
        }

        let max_log_posterior = log_posteriors
            .values()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);

        let mut exp_sum = 0.0;
        let mut probabilities: HashMap<Class, f64> = HashMap::new();
        for (class, log_posterior) in &log_posteriors {
            let exp_value = (log_posterior - max_log_posterior).exp();
            probabilities.insert(class.clone(), exp_value);
            exp_sum += exp_value;
        }

        for value in probabilities.values_mut() {
            *value /= exp_sum;
        }

        let mut sorted: Vec<(&Class, &f64)> = probabilities.iter().collect();
        sorted.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (best_class, &best_probability) = sorted[0];
        let certain = sorted.len() < 2 || (best_probability - sorted[1].1).abs() > f64::EPSILON;

        Some(Classification {
            class: best_class.clone(),
            probability_percent: best_probability * 100.0,
            certain,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{HAM, SPAM};

    fn doc(class: &str, tokens: &[&str]) -> Document {
        Document::new(class, tokens.iter().map(|t| t.to_string()))
    }

    #[test]
    fn learn_then_unlearn_is_identity() {
        let mut classifier = Classifier::new();
        let docs = vec![
            doc(SPAM, &["win", "free", "iphone"]),
            doc(HAM, &["hello", "world"]),
        ];

        classifier.learn(&docs);
        let before = classifier.state().clone();

        classifier.unlearn(&docs).expect("unlearn should succeed");

        assert_eq!(classifier.state().n_all_document, 0);
        assert!(classifier.state().learning_results.is_empty());
        assert!(classifier.state().n_document_by_class.is_empty());
        assert!(classifier.state().n_frequency_by_class.is_empty());

        // Learning again reaches the same state as before the round trip.
        classifier.learn(&docs);
        assert_eq!(classifier.state().n_all_document, before.n_all_document);
        assert_eq!(classifier.state().learning_results, before.learning_results);
        assert_eq!(classifier.state().n_document_by_class, before.n_document_by_class);
        assert_eq!(classifier.state().n_frequency_by_class, before.n_frequency_by_class);
    }

    #[test]
    fn unlearn_over_budget_fails() {
        let mut classifier = Classifier::new();
        let docs = vec![doc(SPAM, &["a"])];
        classifier.learn(&docs);

        let over = vec![doc(SPAM, &["a"]), doc(SPAM, &["a"])];
        let result = classifier.unlearn(&over);
        assert_eq!(
            result,
            Err(ClassifierError::OverUnlearn {
                requested: 2,
                available: 1
            })
        );
    }

    #[test]
    fn unlearn_unknown_class_fails() {
        let mut classifier = Classifier::new();
        classifier.learn(&[doc(SPAM, &["a"])]);

        let result = classifier.unlearn(&[doc(HAM, &["a"])]);
        assert_eq!(result, Err(ClassifierError::ClassEmpty(HAM.to_owned())));
    }

    #[test]
    fn unlearn_missing_token_fails() {
        let mut classifier = Classifier::new();
        classifier.learn(&[doc(SPAM, &["a"])]);

        let result = classifier.unlearn(&[doc(SPAM, &["b"])]);
        assert_eq!(
            result,
            Err(ClassifierError::TokenMissing {
                token: "b".to_owned(),
                class: SPAM.to_owned()
            })
        );
    }

    #[test]
    fn classify_empty_state_returns_none() {
        let classifier = Classifier::new();
        assert_eq!(classifier.classify(["anything"]), None);
    }

    #[test]
    fn classify_picks_the_more_probable_class() {
        let mut classifier = Classifier::new();
        classifier.learn(&[
            doc(SPAM, &["win", "free", "iphone"]),
            doc(SPAM, &["lottery", "prize", "xyz"]),
            doc(HAM, &["hello", "world"]),
            doc(HAM, &["how", "are", "you"]),
            doc(HAM, &["have", "a", "good", "day"]),
        ]);

        let ham_tokens: Vec<&str> = vec!["hello", "how", "are", "you"];
        let classification = classifier.classify(ham_tokens).unwrap();
        assert_eq!(classification.class, HAM);
        assert!(classification.certain);

        let spam_tokens: Vec<&str> = vec!["win", "a", "free", "iphone", "now"];
        let classification = classifier.classify(spam_tokens).unwrap();
        assert_eq!(classification.class, SPAM);
        assert!(classification.certain);
    }

    #[test]
    fn classify_softmax_sums_to_one_and_has_no_nan_or_inf() {
        let mut classifier = Classifier::new();
        classifier.learn(&[
            doc(SPAM, &["a", "b", "c"]),
            doc(HAM, &["d", "e", "f"]),
        ]);

        let classification = classifier.classify(["a", "z", "q"]).unwrap();
        assert!(classification.probability_percent.is_finite());
        assert!(classification.probability_percent >= 0.0);
        assert!(classification.probability_percent <= 100.0);
    }

    #[test]
    fn classify_tie_is_uncertain() {
        let mut classifier = Classifier::new();
        classifier.learn(&[doc(SPAM, &["a"]), doc(HAM, &["a"])]);

        // With identical priors and identical token distributions, the
        // posteriors tie.
        let classification = classifier.classify(["a"]).unwrap();
        assert!(!classification.certain);
    }

    #[test]
    fn reset_zeros_all_state() {
        let mut classifier = Classifier::new();
        classifier.learn(&[doc(SPAM, &["a"])]);
        classifier.reset();

        assert_eq!(classifier.state().n_all_document, 0);
        assert!(classifier.state().learning_results.is_empty());
        assert!(classifier.classify(["a"]).is_none());
    }
}
