use serde::{Deserialize, Serialize};

use crate::error::CheckError;

/// Lightweight per-message metadata the platform layer attaches to a
/// [`CheckRequest`]. None of these fields require the platform to do more
/// than count things it already has on hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Meta {
    #[serde(default)]
    pub images: u32,
    #[serde(default)]
    pub links: u32,
    #[serde(default)]
    pub mentions: u32,
    #[serde(default)]
    pub has_video: bool,
    #[serde(default)]
    pub has_audio: bool,
    #[serde(default)]
    pub has_forward: bool,
    #[serde(default)]
    pub has_keyboard: bool,
    /// Platform message id; 0 means unknown.
    #[serde(default)]
    pub message_id: i64,
}

/// A single message to classify, plus the sender identity and metadata the
/// pipeline needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckRequest {
    pub msg: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub meta: Meta,
}

/// The result of one check within the pipeline (spec §3).
#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    pub name: &'static str,
    pub spam: bool,
    pub details: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extra_delete_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<CheckError>,
}

fn serialize_error<S>(error: &Option<CheckError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(err) => serializer.serialize_str(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

impl CheckResponse {
    pub fn ham(name: &'static str, details: impl Into<String>) -> Self {
        CheckResponse {
            name,
            spam: false,
            details: details.into(),
            extra_delete_ids: Vec::new(),
            error: None,
        }
    }

    pub fn spam(name: &'static str, details: impl Into<String>) -> Self {
        CheckResponse {
            name,
            spam: true,
            details: details.into(),
            extra_delete_ids: Vec::new(),
            error: None,
        }
    }

    pub fn errored(name: &'static str, error: CheckError) -> Self {
        CheckResponse {
            name,
            spam: false,
            details: error.to_string(),
            extra_delete_ids: Vec::new(),
            error: Some(error),
        }
    }
}

/// A class label used by the Bayesian classifier. The spec only ever
/// exercises `spam`/`ham`, but nothing in §4.3 restricts the classifier to
/// exactly two classes, so this is a plain owned string rather than a fixed
/// enum.
pub type Class = String;

pub const SPAM: &str = "spam";
pub const HAM: &str = "ham";

/// A training document: a class label plus the *set* of distinct tokens it
/// contains (spec §3: "duplicates within a single document collapse to a
/// set").
#[derive(Debug, Clone)]
pub struct Document {
    pub class: Class,
    pub tokens: std::collections::HashSet<String>,
}

impl Document {
    pub fn new(class: impl Into<String>, tokens: impl IntoIterator<Item = String>) -> Self {
        Document {
            class: class.into(),
            tokens: tokens.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) fn request(msg: &str) -> CheckRequest {
        CheckRequest {
            msg: msg.to_owned(),
            user_id: "123".to_owned(),
            user_name: "tester".to_owned(),
            meta: Meta::default(),
        }
    }
}
