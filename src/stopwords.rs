//! Stop-word / banned-phrase matching (spec §4.6, component C6).

use crate::model::{CheckRequest, CheckResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    /// Substring match against the normalized target.
    Substring(String),
    /// Exact match against the normalized target.
    Exact(String),
    /// A lone `=`; matches nothing.
    Disabled,
}

/// Collapses consecutive whitespace to a single space, trims, and
/// lowercases — applied identically to both the stop word and the text
/// being scanned.
fn normalize(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                result.push(' ');
            }
            last_was_space = true;
        } else {
            result.extend(c.to_lowercase());
            last_was_space = false;
        }
    }
    result
}

fn parse_rule(raw: &str) -> Rule {
    if raw == "=" {
        return Rule::Disabled;
    }

    if let Some(rest) = raw.strip_prefix("==") {
        // `==foo` means exact match for the literal `=foo`.
        return Rule::Exact(normalize(&format!("={}", rest)));
    }

    if let Some(rest) = raw.strip_prefix('=') {
        return Rule::Exact(normalize(rest));
    }

    Rule::Substring(normalize(raw))
}

impl Rule {
    fn matches(&self, normalized_target: &str) -> bool {
        match self {
            Rule::Disabled => false,
            Rule::Exact(pattern) => normalized_target == pattern,
            Rule::Substring(pattern) => !pattern.is_empty() && normalized_target.contains(pattern.as_str()),
        }
    }
}

/// A loaded list of stop-word rules (spec §6: one rule per line, blank
/// lines ignored).
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    rules: Vec<(String, Rule)>,
}

impl StopWords {
    pub fn new() -> Self {
        StopWords::default()
    }

    pub fn from_lines(lines: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let rules = lines
            .into_iter()
            .map(|line| {
                let raw = line.as_ref().to_owned();
                let rule = parse_rule(&raw);
                (raw, rule)
            })
            .collect();
        StopWords { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn first_match<'a>(&'a self, normalized_target: &str) -> Option<&'a str> {
        self.rules
            .iter()
            .find(|(_, rule)| rule.matches(normalized_target))
            .map(|(raw, _)| raw.as_str())
    }

    /// Scans `msg`, `userName`, and `userId` in that order; the first hit
    /// wins and is reported with the original (un-normalized) rule text.
    pub fn check(&self, request: &CheckRequest) -> CheckResponse {
        let targets = [
            normalize(&request.msg),
            normalize(&request.user_name),
            normalize(&request.user_id),
        ];

        for target in &targets {
            if let Some(matched) = self.first_match(target) {
                return CheckResponse::spam("stopword", matched.to_owned());
            }
        }

        CheckResponse::ham("stopword", "not found")
    }
}
