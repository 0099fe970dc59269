//! Minimal demo binary: loads a [`DetectorConfig`], then reads newline-
//! delimited [`CheckRequest`] JSON objects from stdin and writes the
//! resulting `(spam, responses)` pair as JSON to stdout, one line per
//! request.

use std::io::{self, BufRead, Write};

use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;
use sprout_guard::{CheckRequest, Detector, DetectorConfig};

#[cfg(debug_assertions)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .pretty()
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sprout_guard=trace".parse().unwrap()),
        )
        .init();
}

#[cfg(not(debug_assertions))]
fn init_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[derive(Serialize)]
struct Verdict<'a> {
    spam: bool,
    responses: &'a [sprout_guard::CheckResponse],
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();
    dotenv::dotenv().ok();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sprout-guard.cfg.yml".to_owned());

    let config = DetectorConfig::load_file(&config_path)
        .wrap_err_with(|| format!("couldn't load configuration from {}", config_path))?;
    let detector = Detector::new(config).wrap_err("couldn't build detector")?;

    tracing::info!(config_path, "spamcheck is ready; reading requests from stdin");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line.wrap_err("couldn't read stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let request: CheckRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                tracing::error!(error = %err, line, "couldn't parse request");
                continue;
            }
        };

        let (spam, responses) = detector.check(&request).await;
        let verdict = Verdict { spam, responses: &responses };
        let serialized = serde_json::to_string(&verdict).wrap_err("couldn't serialize verdict")?;
        writeln!(out, "{}", serialized).wrap_err("couldn't write to stdout")?;
    }

    Ok(())
}
