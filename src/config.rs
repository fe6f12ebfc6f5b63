use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::IngestError;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/highlights.db";
const DEFAULT_KEYWORDS_FILE: &str = "seeds/keywords.json";
const DEFAULT_MAX_RESULTS_PER_TERM: u32 = 25;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_REQUEST_DELAY_MS: u64 = 200;

/// Runtime configuration, read once at startup from the environment
/// (dotenv-compatible).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub database_url: String,
    pub keywords_file: PathBuf,
    pub max_results_per_term: u32,
    pub request_timeout: Duration,
    pub request_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, IngestError> {
        let api_key = std::env::var("YOUTUBE_API_KEY")
            .map_err(|_| IngestError::Config("YOUTUBE_API_KEY is not set".to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let keywords_file = std::env::var("KEYWORDS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_KEYWORDS_FILE));

        let max_results_per_term =
            parse_env("MAX_RESULTS_PER_TERM", DEFAULT_MAX_RESULTS_PER_TERM)?;
        let timeout_seconds =
            parse_env("REQUEST_TIMEOUT_SECONDS", DEFAULT_REQUEST_TIMEOUT_SECONDS)?;
        let delay_ms = parse_env("REQUEST_DELAY_MS", DEFAULT_REQUEST_DELAY_MS)?;

        Ok(Config {
            api_key,
            database_url,
            keywords_file,
            max_results_per_term,
            request_timeout: Duration::from_secs(timeout_seconds),
            request_delay: Duration::from_millis(delay_ms),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, IngestError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            IngestError::Config(format!("{} is not a valid number: {:?}", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

/// Loads the ordered search-term list from the seeds file (a JSON array of
/// strings).
pub fn load_search_terms(path: &Path) -> Result<Vec<String>, IngestError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        IngestError::Config(format!(
            "Failed to read keywords file {}: {}",
            path.display(),
            e
        ))
    })?;

    serde_json::from_str(&raw).map_err(|e| {
        IngestError::Config(format!(
            "Keywords file {} is not a JSON array of strings: {}",
            path.display(),
            e
        ))
    })
}
