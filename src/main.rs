use std::error::Error;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use highlights_ingest::config::{self, Config};
use highlights_ingest::db::init_db;
use highlights_ingest::pipeline::{self, TermOutcome};
use highlights_ingest::store::HighlightStore;
use highlights_ingest::youtube::YoutubeClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "highlights_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let terms = config::load_search_terms(&config.keywords_file)?;
    if terms.is_empty() {
        tracing::warn!(
            file = %config.keywords_file.display(),
            "No search terms configured, nothing to ingest"
        );
    }

    let pool = init_db(&config.database_url).await?;
    let store = HighlightStore::new(pool);
    let client = YoutubeClient::new(&config)?;

    let summary = pipeline::run(&client, &store, &terms, config.max_results_per_term).await;

    for report in &summary.terms {
        match &report.outcome {
            TermOutcome::Completed => {
                tracing::info!(
                    term = %report.term,
                    candidates = report.candidates,
                    inserted = report.inserted,
                    updated = report.updated,
                    skipped = report.skipped.len(),
                    "Term complete"
                );
                for skip in &report.skipped {
                    tracing::info!(
                        term = %report.term,
                        video_id = %skip.video_id,
                        reason = %skip.reason,
                        "Skipped video"
                    );
                }
            }
            TermOutcome::Failed(reason) => {
                tracing::error!(term = %report.term, reason = %reason, "Term failed");
            }
            TermOutcome::NotAttempted => {
                tracing::warn!(term = %report.term, "Term not attempted: quota exhausted");
            }
        }
    }

    if !summary.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
