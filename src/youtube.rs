//! YouTube Data API v3 client: keyword search and batch video statistics.
//!
//! Quota discipline: search.list costs 100 units per page, so pages are only
//! fetched while more candidates are needed; videos.list retrieves snippet
//! and statistics for up to 50 videos in a single unit.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Config;
use crate::errors::IngestError;
use crate::pipeline::VideoApi;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const SEARCH_PAGE_SIZE: u32 = 50;
const STATS_BATCH_SIZE: usize = 50;
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// A video surfaced by a search query, before statistics enrichment.
#[derive(Debug, Clone)]
pub struct CandidateVideo {
    pub video_id: String,
    pub title_hint: Option<String>,
}

/// Per-video payload from videos.list, kept loosely typed; the normalizer
/// owns all validation.
#[derive(Debug, Clone)]
pub struct RawStats {
    pub video_id: String,
    pub title: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<String>,
    pub view_count: Option<String>,
}

/// Serializes outbound calls so the whole run stays under the per-credential
/// rate ceiling regardless of which component is calling.
struct Pacer {
    min_interval: Duration,
    next_call: Mutex<Instant>,
}

impl Pacer {
    fn new(min_interval: Duration) -> Self {
        Pacer {
            min_interval,
            next_call: Mutex::new(Instant::now()),
        }
    }

    async fn wait(&self) {
        let mut next_call = self.next_call.lock().await;
        let now = Instant::now();
        if *next_call > now {
            tokio::time::sleep_until(*next_call).await;
        }
        *next_call = Instant::now() + self.min_interval;
    }
}

pub struct YoutubeClient {
    http: Client,
    api_key: String,
    pacer: Pacer,
}

impl YoutubeClient {
    pub fn new(config: &Config) -> Result<Self, IngestError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(YoutubeClient {
            http,
            api_key: config.api_key.clone(),
            pacer: Pacer::new(config.request_delay),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, IngestError> {
        let url = format!("{}/{}", API_BASE, path);
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;

        loop {
            self.pacer.wait().await;

            match self.try_get(&url, query).await {
                Ok(value) => return Ok(value),
                Err(IngestError::TransientApi(e)) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        error = %e,
                        "Transient YouTube API failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, IngestError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body));
        }

        response.json::<T>().await.map_err(IngestError::from)
    }
}

impl VideoApi for YoutubeClient {
    /// Pages through search.list until `max_results` candidates are produced
    /// or the platform reports no further page.
    async fn search(
        &self,
        term: &str,
        max_results: u32,
    ) -> Result<Vec<CandidateVideo>, IngestError> {
        let mut candidates: Vec<CandidateVideo> = Vec::new();
        let mut page_token: Option<String> = None;

        while (candidates.len() as u32) < max_results {
            let remaining = max_results - candidates.len() as u32;
            let mut query = vec![
                ("part", "snippet".to_string()),
                ("q", term.to_string()),
                ("type", "video".to_string()),
                ("order", "date".to_string()),
                ("maxResults", remaining.min(SEARCH_PAGE_SIZE).to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: SearchListResponse = self.get_json("search", &query).await?;
            candidates.extend(page_candidates(page.items, max_results - candidates.len() as u32));

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        tracing::debug!(term = %term, candidates = candidates.len(), "Search pagination finished");
        Ok(candidates)
    }

    /// Fetches snippet and statistics for the given IDs, one videos.list
    /// call per batch of 50. Deleted or private videos come back missing
    /// from the response and are simply absent from the returned map.
    async fn fetch_statistics(
        &self,
        video_ids: &[String],
    ) -> Result<HashMap<String, RawStats>, IngestError> {
        let mut stats = HashMap::with_capacity(video_ids.len());

        for chunk in video_ids.chunks(STATS_BATCH_SIZE) {
            let query = [
                ("part", "snippet,statistics".to_string()),
                ("id", chunk.join(",")),
            ];

            let page: VideoListResponse = self.get_json("videos", &query).await?;
            for item in page.items {
                stats.insert(item.id.clone(), RawStats::from(item));
            }
        }

        Ok(stats)
    }
}

// Search results can carry non-video resources with no videoId; drop them.
fn page_candidates(items: Vec<SearchItem>, limit: u32) -> Vec<CandidateVideo> {
    items
        .into_iter()
        .filter_map(|item| {
            item.id.video_id.map(|video_id| CandidateVideo {
                video_id,
                title_hint: item.snippet.map(|s| s.title),
            })
        })
        .take(limit as usize)
        .collect()
}

fn classify_api_error(status: StatusCode, body: &str) -> IngestError {
    if status == StatusCode::FORBIDDEN {
        let quota = serde_json::from_str::<ApiErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error.errors)
            .map(|details| {
                details.iter().any(|d| {
                    matches!(
                        d.reason.as_deref(),
                        Some("quotaExceeded" | "dailyLimitExceeded")
                    )
                })
            })
            .unwrap_or_else(|| body.contains("quotaExceeded"));

        if quota {
            return IngestError::QuotaExceeded;
        }
    }

    IngestError::TransientApi(anyhow::anyhow!(
        "YouTube API error: HTTP {} - {}",
        status.as_u16(),
        body
    ))
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    errors: Option<Vec<ApiErrorDetail>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Option<SearchSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Option<VideoSnippet>,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    channel_title: String,
    published_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
}

impl From<VideoItem> for RawStats {
    fn from(item: VideoItem) -> Self {
        let (title, channel_title, published_at) = match item.snippet {
            Some(snippet) => (
                Some(snippet.title),
                Some(snippet.channel_title),
                Some(snippet.published_at),
            ),
            None => (None, None, None),
        };

        RawStats {
            video_id: item.id,
            title,
            channel_title,
            published_at,
            view_count: item.statistics.and_then(|s| s.view_count),
        }
    }
}
