use anyhow::Error as AnyError;

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YouTube API quota exhausted for this credential")]
    QuotaExceeded,

    #[error("Transient API error: {0}")]
    TransientApi(#[source] AnyError),

    #[error("Invalid {field}: {reason}")]
    Normalization { field: &'static str, reason: String },

    #[error("Store write error: {0}")]
    StoreWrite(#[source] AnyError),

    #[error("Database error: {0}")]
    Database(#[source] AnyError),
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Database(AnyError::new(err).context("SQLx operation failed"))
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        let mut context_parts = Vec::new();

        if let Some(url) = err.url() {
            context_parts.push(format!("URL: {}", url));
        }

        if let Some(status) = err.status() {
            context_parts.push(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            ));
        }

        let error_type = match &err {
            e if e.is_timeout() => "Request Timeout",
            e if e.is_connect() => "Connection Failed",
            e if e.is_decode() => "Response Decode Failed",
            e if e.is_request() => "Invalid Request",
            e if e.is_body() => "Request Body Error",
            _ => "Unknown HTTP Error",
        };
        context_parts.push(format!("Type: {}", error_type));

        let context = format!("YouTube API request failed - {}", context_parts.join(", "));

        // Timeouts and connection failures follow the same bounded-retry
        // policy as 5xx responses; the caller decides when to stop retrying.
        IngestError::TransientApi(AnyError::new(err).context(context))
    }
}
