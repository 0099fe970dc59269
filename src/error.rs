use thiserror::Error;

/// Errors that can occur while building a [`crate::detector::Detector`] or
/// reloading one of its on-disk inputs (stop words, samples, excluded
/// tokens). These are always fatal to the operation that raised them; unlike
/// [`CheckError`], nothing here is meant to be swallowed into a
/// [`crate::model::CheckResponse`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("couldn't read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("configuration is invalid:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

/// Errors returned by the Bayesian classifier's mutating operations
/// (`learn`/`unlearn`). These map directly onto spec §3's `ClassifierState`
/// invariants and spec §4.3's failure semantics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("cannot unlearn {requested} document(s); only {available} are known")]
    OverUnlearn { requested: usize, available: usize },
    #[error("class `{0}` has no documents to unlearn from")]
    ClassEmpty(String),
    #[error("token `{token}` has no recorded count for class `{class}`")]
    TokenMissing { token: String, class: String },
}

/// Non-fatal errors attached to a [`crate::model::CheckResponse`] when a
/// check could not complete normally. The detector never fails `check`
/// because of one of these; they are reported, not propagated (spec §7).
#[derive(Error, Debug, Clone)]
pub enum CheckError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),
    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),
    #[error("couldn't parse response: {0}")]
    Parse(String),
    #[error("invariant violation: {0}")]
    Invariant(String),
}
