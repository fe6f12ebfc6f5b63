//! Run orchestration: search -> statistics -> normalize -> upsert per term,
//! with failures isolated at the narrowest scope (video, then term, then run).

use std::collections::HashMap;

use crate::errors::IngestError;
use crate::normalize::normalize;
use crate::store::{HighlightStore, UpsertOutcome};
use crate::youtube::{CandidateVideo, RawStats};

/// What the orchestrator needs from the video platform. Implemented by
/// `YoutubeClient`; scripted in tests.
#[allow(async_fn_in_trait)]
pub trait VideoApi {
    async fn search(&self, term: &str, max_results: u32)
        -> Result<Vec<CandidateVideo>, IngestError>;

    async fn fetch_statistics(
        &self,
        video_ids: &[String],
    ) -> Result<HashMap<String, RawStats>, IngestError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermOutcome {
    Completed,
    Failed(String),
    /// Quota ran out on an earlier term; this one was never started.
    NotAttempted,
}

#[derive(Debug, Clone)]
pub struct SkippedVideo {
    pub video_id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct TermReport {
    pub term: String,
    pub candidates: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: Vec<SkippedVideo>,
    pub outcome: TermOutcome,
}

impl TermReport {
    fn new(term: &str) -> Self {
        TermReport {
            term: term.to_string(),
            candidates: 0,
            inserted: 0,
            updated: 0,
            skipped: Vec::new(),
            outcome: TermOutcome::Completed,
        }
    }

    fn failed(term: &str, error: &IngestError) -> Self {
        TermReport {
            outcome: TermOutcome::Failed(error.to_string()),
            ..TermReport::new(term)
        }
    }

    fn not_attempted(term: &str) -> Self {
        TermReport {
            outcome: TermOutcome::NotAttempted,
            ..TermReport::new(term)
        }
    }

    fn skip(&mut self, video_id: &str, reason: String) {
        self.skipped.push(SkippedVideo {
            video_id: video_id.to_string(),
            reason,
        });
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub terms: Vec<TermReport>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.terms
            .iter()
            .all(|report| report.outcome == TermOutcome::Completed)
    }
}

/// Executes one full ingestion pass over the configured terms, in order.
/// A failed term never stops the ones after it, except quota exhaustion,
/// which would fail every remaining call identically.
pub async fn run<A: VideoApi>(
    api: &A,
    store: &HighlightStore,
    terms: &[String],
    max_results_per_term: u32,
) -> RunSummary {
    let mut reports = Vec::with_capacity(terms.len());
    let mut quota_exhausted = false;

    for term in terms {
        if quota_exhausted {
            reports.push(TermReport::not_attempted(term));
            continue;
        }

        match ingest_term(api, store, term, max_results_per_term).await {
            Ok(report) => reports.push(report),
            Err(IngestError::QuotaExceeded) => {
                tracing::error!(
                    term = %term,
                    "YouTube API quota exhausted, aborting remaining terms"
                );
                quota_exhausted = true;
                reports.push(TermReport::failed(term, &IngestError::QuotaExceeded));
            }
            Err(e) => {
                tracing::error!(term = %term, error = %e, "Search term failed");
                reports.push(TermReport::failed(term, &e));
            }
        }
    }

    RunSummary { terms: reports }
}

async fn ingest_term<A: VideoApi>(
    api: &A,
    store: &HighlightStore,
    term: &str,
    max_results_per_term: u32,
) -> Result<TermReport, IngestError> {
    let candidates = api.search(term, max_results_per_term).await?;
    tracing::info!(term = %term, candidates = candidates.len(), "Search complete");

    let ids: Vec<String> = candidates.iter().map(|c| c.video_id.clone()).collect();
    let mut stats = api.fetch_statistics(&ids).await?;

    let mut report = TermReport::new(term);
    report.candidates = candidates.len();

    for candidate in &candidates {
        let Some(raw) = stats.remove(&candidate.video_id) else {
            // Deleted or private since the search indexed it.
            tracing::debug!(
                video_id = %candidate.video_id,
                title_hint = ?candidate.title_hint,
                "No statistics returned, skipping"
            );
            report.skip(&candidate.video_id, "absent from statistics response".to_string());
            continue;
        };

        let record = match normalize(raw, term) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(video_id = %candidate.video_id, error = %e, "Normalization failed, skipping");
                report.skip(&candidate.video_id, e.to_string());
                continue;
            }
        };

        match store.upsert(&record).await {
            Ok(UpsertOutcome::Inserted) => report.inserted += 1,
            Ok(UpsertOutcome::Updated) => report.updated += 1,
            Err(e) => {
                tracing::error!(video_id = %candidate.video_id, error = %e, "Upsert failed, skipping");
                report.skip(&candidate.video_id, e.to_string());
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    use crate::store::{memory_store, QueryFilters};

    fn candidate(video_id: &str) -> CandidateVideo {
        CandidateVideo {
            video_id: video_id.to_string(),
            title_hint: None,
        }
    }

    fn raw(video_id: &str, view_count: &str) -> RawStats {
        RawStats {
            video_id: video_id.to_string(),
            title: Some(format!("{} title", video_id)),
            channel_title: Some("NBA".to_string()),
            published_at: Some("2024-03-01T12:00:00Z".to_string()),
            view_count: Some(view_count.to_string()),
        }
    }

    /// Scripted platform: fixed search results per term, one statistics
    /// response popped per fetch call, and terms that fail on demand.
    struct ScriptedApi {
        search_results: HashMap<String, Vec<CandidateVideo>>,
        stats_responses: Mutex<VecDeque<HashMap<String, RawStats>>>,
        quota_terms: HashSet<String>,
        transient_terms: HashSet<String>,
    }

    impl ScriptedApi {
        fn new() -> Self {
            ScriptedApi {
                search_results: HashMap::new(),
                stats_responses: Mutex::new(VecDeque::new()),
                quota_terms: HashSet::new(),
                transient_terms: HashSet::new(),
            }
        }

        fn with_term(mut self, term: &str, candidates: Vec<CandidateVideo>, stats: Vec<RawStats>) -> Self {
            self.search_results.insert(term.to_string(), candidates);
            self.stats_responses.get_mut().unwrap().push_back(
                stats.into_iter().map(|s| (s.video_id.clone(), s)).collect(),
            );
            self
        }
    }

    impl VideoApi for ScriptedApi {
        async fn search(
            &self,
            term: &str,
            _max_results: u32,
        ) -> Result<Vec<CandidateVideo>, IngestError> {
            if self.quota_terms.contains(term) {
                return Err(IngestError::QuotaExceeded);
            }
            if self.transient_terms.contains(term) {
                return Err(IngestError::TransientApi(anyhow::anyhow!("boom")));
            }
            Ok(self.search_results.get(term).cloned().unwrap_or_default())
        }

        async fn fetch_statistics(
            &self,
            video_ids: &[String],
        ) -> Result<HashMap<String, RawStats>, IngestError> {
            let scripted = self
                .stats_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            Ok(scripted
                .into_iter()
                .filter(|(id, _)| video_ids.contains(id))
                .collect())
        }
    }

    fn terms(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn quota_on_third_term_commits_earlier_terms_and_skips_the_rest() {
        let mut api = ScriptedApi::new()
            .with_term("t1", vec![candidate("v1")], vec![raw("v1", "100")])
            .with_term("t2", vec![candidate("v2")], vec![raw("v2", "200")]);
        api.quota_terms.insert("t3".to_string());

        let store = memory_store().await;
        let summary = run(&api, &store, &terms(&["t1", "t2", "t3", "t4", "t5"]), 25).await;

        assert_eq!(summary.terms[0].outcome, TermOutcome::Completed);
        assert_eq!(summary.terms[1].outcome, TermOutcome::Completed);
        assert!(matches!(summary.terms[2].outcome, TermOutcome::Failed(_)));
        assert_eq!(summary.terms[3].outcome, TermOutcome::NotAttempted);
        assert_eq!(summary.terms[4].outcome, TermOutcome::NotAttempted);
        assert!(!summary.is_success());

        // Terms 1-2 committed before the abort.
        let rows = store.query(&QueryFilters::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn bad_video_is_skipped_without_dropping_the_batch() {
        let api = ScriptedApi::new().with_term(
            "t1",
            vec![candidate("good"), candidate("bad"), candidate("gone")],
            vec![raw("good", "100"), raw("bad", "not-a-number")],
        );

        let store = memory_store().await;
        let summary = run(&api, &store, &terms(&["t1"]), 25).await;

        let report = &summary.terms[0];
        assert_eq!(report.outcome, TermOutcome::Completed);
        assert_eq!(report.candidates, 3);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped.iter().any(|s| s.video_id == "bad"));
        assert!(report
            .skipped
            .iter()
            .any(|s| s.video_id == "gone" && s.reason.contains("absent")));

        let rows = store.query(&QueryFilters::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].video_id, "good");
    }

    #[tokio::test]
    async fn transient_failure_on_one_term_does_not_stop_the_next() {
        let mut api = ScriptedApi::new().with_term("t2", vec![candidate("v1")], vec![raw("v1", "100")]);
        api.transient_terms.insert("t1".to_string());

        let store = memory_store().await;
        let summary = run(&api, &store, &terms(&["t1", "t2"]), 25).await;

        assert!(matches!(summary.terms[0].outcome, TermOutcome::Failed(_)));
        assert_eq!(summary.terms[1].outcome, TermOutcome::Completed);
        assert_eq!(summary.terms[1].inserted, 1);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn rediscovery_by_a_later_term_updates_stats_but_not_attribution() {
        let api = ScriptedApi::new()
            .with_term("Lakers highlights", vec![candidate("V1")], vec![raw("V1", "1000")])
            .with_term("Celtics highlights", vec![candidate("V1")], vec![raw("V1", "1200")]);

        let store = memory_store().await;
        let summary = run(
            &api,
            &store,
            &terms(&["Lakers highlights", "Celtics highlights"]),
            25,
        )
        .await;

        assert_eq!(summary.terms[0].inserted, 1);
        assert_eq!(summary.terms[1].inserted, 0);
        assert_eq!(summary.terms[1].updated, 1);

        let rows = store.query(&QueryFilters::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].view_count, 1200);
        assert_eq!(rows[0].search_term, "Lakers highlights");
    }

    #[tokio::test]
    async fn rerunning_the_same_discoveries_is_idempotent() {
        let store = memory_store().await;

        let api = ScriptedApi::new().with_term("t1", vec![candidate("v1"), candidate("v2")], vec![raw("v1", "100"), raw("v2", "200")]);
        let first = run(&api, &store, &terms(&["t1"]), 25).await;
        assert_eq!(first.terms[0].inserted, 2);

        let api = ScriptedApi::new().with_term("t1", vec![candidate("v1"), candidate("v2")], vec![raw("v1", "100"), raw("v2", "200")]);
        let second = run(&api, &store, &terms(&["t1"]), 25).await;
        assert_eq!(second.terms[0].inserted, 0);
        assert_eq!(second.terms[0].updated, 2);

        let rows = store.query(&QueryFilters::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
