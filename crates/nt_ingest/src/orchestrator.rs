use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nt_core::{
    cap_content, Article, ArticleDraft, ArticleId, ArticleIntelligence, ArticleStore, Enrichment,
    Error, TextIntelligence,
};
use nt_inference::embeddings::EmbeddingGenerator;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::classifier::ContentClassifier;
use crate::dedup::{DedupEngine, DedupReport};
use crate::feeds::{FeedFetcher, FeedSource};
use crate::logging::Logger;
use crate::schedule::next_scheduled_run;
use crate::trust::TrustScorer;

const SUMMARY_FALLBACK_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Articles published longer ago than this are deleted after each run.
    pub retention_days: i64,
    pub startup_delay: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            startup_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Scheduled,
    Startup,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Scheduled => "scheduled",
            Trigger::Startup => "startup",
            Trigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum ItemOutcome {
    Stored(ArticleId),
    /// The canonical URL was already in the store.
    Existing,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub url: String,
    pub title: String,
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedReport {
    pub feed: String,
    pub items: Vec<ItemReport>,
    /// Set when the feed itself could not be fetched.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feeds: Vec<FeedReport>,
    pub dedup: DedupReport,
    pub dedup_error: Option<String>,
    pub retention_deleted: u64,
    pub retention_error: Option<String>,
}

impl IngestionReport {
    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.feeds
            .iter()
            .flat_map(|f| f.items.iter())
            .filter(|i| pred(&i.outcome))
            .count()
    }

    pub fn stored(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Stored(_)))
    }

    pub fn existing(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Existing))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    pub fn failed_feeds(&self) -> usize {
        self.feeds.iter().filter(|f| f.error.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionStatus {
    pub is_running: bool,
    pub last_ingestion_date: Option<DateTime<Utc>>,
    pub ingestion_count: u64,
    pub next_scheduled_run: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RunStats {
    last_ingestion_date: Option<DateTime<Utc>>,
    ingestion_count: u64,
}

/// Clears the running flag on every exit path.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// The ingestion pipeline: fetch, enrich, persist, dedup, retention.
///
/// One instance per process, shared behind an `Arc` by the scheduler, the
/// HTTP layer and the CLI. At most one run is in flight; a run requested
/// while another is active is a no-op.
pub struct Ingestor {
    store: Arc<dyn ArticleStore>,
    intelligence: Arc<dyn TextIntelligence>,
    fetcher: Arc<dyn FeedFetcher>,
    feeds: Vec<FeedSource>,
    config: IngestConfig,
    classifier: ContentClassifier,
    scorer: TrustScorer,
    dedup: DedupEngine,
    embeddings: EmbeddingGenerator,
    running: AtomicBool,
    stats: Mutex<RunStats>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        intelligence: Arc<dyn TextIntelligence>,
        fetcher: Arc<dyn FeedFetcher>,
        feeds: Vec<FeedSource>,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            embeddings: EmbeddingGenerator::new(intelligence.clone()),
            intelligence,
            fetcher,
            feeds,
            config,
            classifier: ContentClassifier::new(),
            scorer: TrustScorer::new(),
            dedup: DedupEngine::new(),
            running: AtomicBool::new(false),
            stats: Mutex::new(RunStats::default()),
        }
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> IngestionStatus {
        let stats = self.stats.lock().await;
        IngestionStatus {
            is_running: self.is_running(),
            last_ingestion_date: stats.last_ingestion_date,
            ingestion_count: stats.ingestion_count,
            next_scheduled_run: next_scheduled_run(Utc::now()),
        }
    }

    /// Run the full pipeline once. Returns `None` without doing anything
    /// when another run holds the lock.
    pub async fn run(&self, trigger: Trigger) -> Option<IngestionReport> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            info!(%trigger, "⏭️ ingestion already running, ignoring trigger");
            return None;
        };

        let started_at = Utc::now();
        info!(%trigger, feeds = self.feeds.len(), "🚀 ingestion started");

        let mut feeds = Vec::with_capacity(self.feeds.len());
        for feed in &self.feeds {
            feeds.push(self.ingest_feed(feed).await);
        }

        let (dedup, dedup_error) = match self.dedup.run(self.store.as_ref()).await {
            Ok(report) => (report, None),
            Err(e) => {
                warn!(error = %e, "dedup pass failed");
                (DedupReport::default(), Some(e.to_string()))
            }
        };

        let (retention_deleted, retention_error) =
            match self.store.delete_old_articles(self.config.retention_days).await {
                Ok(deleted) => (deleted, None),
                Err(e) => {
                    warn!(error = %e, "retention cleanup failed");
                    (0, Some(e.to_string()))
                }
            };

        let finished_at = Utc::now();
        {
            let mut stats = self.stats.lock().await;
            stats.last_ingestion_date = Some(finished_at);
            stats.ingestion_count += 1;
        }

        let report = IngestionReport {
            trigger,
            started_at,
            finished_at,
            feeds,
            dedup,
            dedup_error,
            retention_deleted,
            retention_error,
        };
        info!(
            %trigger,
            stored = report.stored(),
            existing = report.existing(),
            failed = report.failed(),
            failed_feeds = report.failed_feeds(),
            duplicates = report.dedup.marked,
            retention_deleted,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "✅ ingestion finished"
        );
        Some(report)
    }

    async fn ingest_feed(&self, feed: &FeedSource) -> FeedReport {
        let log = Logger::new().with_prefix(format!("[{}]", feed.name));
        let drafts = match self.fetcher.fetch(feed).await {
            Ok(drafts) => drafts,
            Err(e) => {
                log.error(&format!("❌ fetch failed: {}", e));
                return FeedReport {
                    feed: feed.name.clone(),
                    items: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };
        log.info(&format!("📥 {} items", drafts.len()));

        let mut items = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let url = draft.canonical_url();
            let title = draft.title.clone();
            let outcome = self.ingest_item(draft).await;
            match &outcome {
                ItemOutcome::Stored(_) => log.info(&format!("🆕 {}", title)),
                ItemOutcome::Existing => log.debug(&format!("⏭️ {}", title)),
                ItemOutcome::Failed(e) => log.warn(&format!("❌ {}: {}", title, e)),
            }
            items.push(ItemReport {
                url,
                title,
                outcome,
            });
        }

        FeedReport {
            feed: feed.name.clone(),
            items,
            error: None,
        }
    }

    async fn ingest_item(&self, draft: ArticleDraft) -> ItemOutcome {
        match self.store.exists_by_url(&draft.canonical_url()).await {
            Ok(true) => return ItemOutcome::Existing,
            Ok(false) => {}
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        }

        let article = self.enrich(draft).await;
        match self.store.insert_article(&article).await {
            Ok(()) => ItemOutcome::Stored(article.id),
            Err(Error::Duplicate(_)) => ItemOutcome::Existing,
            Err(e) => ItemOutcome::Failed(e.to_string()),
        }
    }

    /// Classification, intelligence and trust for one draft. Service
    /// failures fall back to defaults; this never fails.
    pub async fn enrich(&self, draft: ArticleDraft) -> Article {
        let now = Utc::now();
        let content = cap_content(&draft.content);
        let classification = self.classifier.classify(&draft);
        let model = self.intelligence.name();

        let summary = match self.intelligence.summarize(&draft.title, &content).await {
            Ok(summary) if !summary.trim().is_empty() => Some(summary.trim().to_string()),
            Ok(_) => fallback_summary(&content),
            Err(e) => {
                warn!(model, url = %draft.url, error = %e, "summary failed, using leading text");
                fallback_summary(&content)
            }
        };

        let evaluation = self.intelligence.evaluate_credibility(&draft.title, &content).await;
        let credibility = match evaluation {
            Ok(evaluation) => Some(evaluation),
            Err(e) => {
                warn!(model, url = %draft.url, error = %e, "credibility evaluation failed");
                None
            }
        };

        let insights = match self.intelligence.generate_insights(&draft.title, &content).await {
            Ok(insights) => insights.capped(),
            Err(e) => {
                warn!(model, url = %draft.url, error = %e, "insight generation failed");
                Default::default()
            }
        };

        let embedding = self
            .embeddings
            .generate_article_embedding(&draft.title, summary.as_deref(), &content)
            .await;

        let trust = self.scorer.score_at(
            &draft.source.name,
            credibility.as_ref(),
            draft.published_at.unwrap_or(now),
            now,
        );

        let enrichment = Enrichment {
            classification,
            trust,
            summary,
            intelligence: ArticleIntelligence {
                credibility,
                insights,
            },
            embedding,
        };
        draft.into_article(enrichment, now)
    }
}

fn fallback_summary(content: &str) -> Option<String> {
    let lead: String = content.trim().chars().take(SUMMARY_FALLBACK_CHARS).collect();
    (!lead.is_empty()).then_some(lead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nt_core::{ArticleQuery, CredibilityEvaluation, Insights, QueryAnswer, Result, Sentiment};
    use nt_storage::InMemoryStorage;

    struct SlowFetcher;

    #[async_trait]
    impl FeedFetcher for SlowFetcher {
        async fn fetch(&self, feed: &FeedSource) -> Result<Vec<ArticleDraft>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(vec![ArticleDraft {
                url: format!("{}/story", feed.url),
                title: format!("{} story about Microsoft cloud software", feed.name),
                content: "Microsoft reported strong cloud revenue.".to_string(),
                author: None,
                published_at: Some(Utc::now()),
                source: feed.source(),
                source_categories: feed.categories.clone(),
            }])
        }
    }

    #[derive(Debug)]
    struct BrokenModel;

    #[async_trait]
    impl TextIntelligence for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }

        async fn summarize(&self, _t: &str, _c: &str) -> Result<String> {
            Err(Error::Inference("down".to_string()))
        }

        async fn evaluate_credibility(&self, _t: &str, _c: &str) -> Result<CredibilityEvaluation> {
            Err(Error::Inference("down".to_string()))
        }

        async fn generate_insights(&self, _t: &str, _c: &str) -> Result<Insights> {
            Err(Error::Inference("down".to_string()))
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::Inference("down".to_string()))
        }

        async fn answer_query(&self, _q: &str, _a: &[Article]) -> Result<QueryAnswer> {
            Err(Error::Inference("down".to_string()))
        }
    }

    fn ingestor(store: Arc<InMemoryStorage>) -> Ingestor {
        Ingestor::new(
            store,
            Arc::new(BrokenModel),
            Arc::new(SlowFetcher),
            vec![FeedSource::new("Example", "https://example.com", &["Technology"])],
            IngestConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_concurrent_run_is_noop() {
        let store = Arc::new(InMemoryStorage::new());
        let ingestor = ingestor(store);

        let (first, second) =
            tokio::join!(ingestor.run(Trigger::Manual), ingestor.run(Trigger::Manual));
        assert_eq!(first.is_some() as u8 + second.is_some() as u8, 1);

        let status = ingestor.status().await;
        assert_eq!(status.ingestion_count, 1);
        assert!(!status.is_running);
        assert!(status.last_ingestion_date.is_some());
        assert!(status.next_scheduled_run > Utc::now());
    }

    #[tokio::test]
    async fn test_guard_released_after_run() {
        let store = Arc::new(InMemoryStorage::new());
        let ingestor = ingestor(store);
        assert!(ingestor.run(Trigger::Startup).await.is_some());
        let second = ingestor.run(Trigger::Scheduled).await.unwrap();
        assert_eq!(second.existing(), 1);
        assert_eq!(second.stored(), 0);
        assert_eq!(ingestor.status().await.ingestion_count, 2);
    }

    #[tokio::test]
    async fn test_enrichment_defaults_when_service_fails() {
        let store = Arc::new(InMemoryStorage::new());
        let ingestor = ingestor(store.clone());
        let report = ingestor.run(Trigger::Manual).await.unwrap();
        assert_eq!(report.stored(), 1);

        let articles = store.query_articles(&ArticleQuery::active()).await.unwrap();
        let article = &articles[0];
        assert_eq!(
            article.summary.as_deref(),
            Some("Microsoft reported strong cloud revenue.")
        );
        assert!(article.intelligence.credibility.is_none());
        assert_eq!(article.intelligence.insights.sentiment, Sentiment::Neutral);
        assert!(article.embedding.is_none());
        assert_eq!(article.trust.content_quality(), 50);
        assert_eq!(article.companies, vec!["Microsoft".to_string()]);
        assert_eq!(article.source.name, "Example");
        assert!(article.is_active);
    }

    #[test]
    fn test_fallback_summary() {
        assert_eq!(fallback_summary("   "), None);
        let long = "x".repeat(1_000);
        assert_eq!(fallback_summary(&long).map(|s| s.len()), Some(SUMMARY_FALLBACK_CHARS));
    }

    #[test]
    fn test_run_guard() {
        let flag = AtomicBool::new(false);
        let guard = RunGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(RunGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(RunGuard::acquire(&flag).is_some());
    }
}
