use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use nt_core::{
    cosine_similarity, days_before, Article, ArticleId, ArticleQuery, ArticleStore, Category,
    EngagementKind, Error, Overlap, Result, SearchFilters, SortKey, TextIntelligence,
};
use nt_inference::embeddings::EmbeddingGenerator;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::merge::{merge_results, ScoreWeights, ScoredArticle};

pub const TRENDING_MIN_TRUST: u8 = 60;
pub const HIGH_TRUST_MIN: u8 = 75;
pub const DEFAULT_TRENDING_DAYS: i64 = 7;
/// Widest trending window accepted from API callers.
pub const MAX_TRENDING_DAYS: i64 = 365;
const TRENDING_ATTACHED: usize = 3;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub skip: usize,
    pub filters: SearchFilters,
    pub min_trust: u8,
    pub weights: ScoreWeights,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            skip: 0,
            filters: SearchFilters::default(),
            min_trust: 0,
            weights: ScoreWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub results: Vec<ScoredArticle>,
    /// Candidates before pagination.
    pub total: usize,
    /// Present only when none of the top trending articles made the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending: Option<Vec<Article>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    pub articles_used: Vec<ArticleId>,
    pub sources: Vec<Article>,
}

/// Keyword, semantic and trust ranking over the article store, plus the
/// curated listings built on the same filters.
pub struct HybridSearchEngine {
    store: Arc<dyn ArticleStore>,
    intelligence: Arc<dyn TextIntelligence>,
    embeddings: EmbeddingGenerator,
}

impl HybridSearchEngine {
    pub fn new(store: Arc<dyn ArticleStore>, intelligence: Arc<dyn TextIntelligence>) -> Self {
        Self {
            store,
            embeddings: EmbeddingGenerator::new(intelligence.clone()),
            intelligence,
        }
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResults> {
        let cap = options.limit.saturating_mul(2);
        let (keyword, semantic, trending) = tokio::join!(
            self.keyword_candidates(query, options, cap),
            self.semantic_candidates(query, options, cap),
            self.get_trending_articles(TRENDING_ATTACHED, &options.filters, DEFAULT_TRENDING_DAYS),
        );

        let keyword = keyword.unwrap_or_else(|e| {
            warn!(query, error = %e, "keyword search failed");
            Vec::new()
        });
        let semantic = semantic.unwrap_or_else(|e| {
            warn!(query, error = %e, "semantic search failed");
            Vec::new()
        });
        let trending = trending.unwrap_or_else(|e| {
            warn!(error = %e, "trending lookup failed");
            Vec::new()
        });
        debug!(
            query,
            keyword = keyword.len(),
            semantic = semantic.len(),
            "🔎 candidates collected"
        );

        let merged = merge_results(keyword, semantic, options.weights);
        let total = merged.len();
        let results: Vec<ScoredArticle> = merged
            .into_iter()
            .skip(options.skip)
            .take(options.limit)
            .collect();

        let on_page: HashSet<ArticleId> = results.iter().map(|r| r.article.id).collect();
        let trending = if trending.is_empty() || trending.iter().any(|a| on_page.contains(&a.id)) {
            None
        } else {
            Some(trending)
        };

        info!(query, total, returned = results.len(), "🔎 search complete");
        Ok(SearchResults {
            results,
            total,
            trending,
        })
    }

    async fn keyword_candidates(
        &self,
        query: &str,
        options: &SearchOptions,
        cap: usize,
    ) -> Result<Vec<Article>> {
        self.store
            .keyword_search(query, &options.filters, options.min_trust, cap)
            .await
    }

    async fn semantic_candidates(
        &self,
        query: &str,
        options: &SearchOptions,
        cap: usize,
    ) -> Result<Vec<(Article, f64)>> {
        let embedding = self.embeddings.generate_text_embedding(query).await;
        if embedding.iter().all(|x| *x == 0.0) {
            return Err(Error::Inference("query embedding unavailable".to_string()));
        }

        let candidates = self
            .store
            .query_articles(
                &ArticleQuery::active()
                    .with_filters(options.filters.clone())
                    .min_trust(options.min_trust)
                    .with_embedding(),
            )
            .await?;

        let mut scored: Vec<(Article, f64)> = candidates
            .into_iter()
            .filter_map(|article| {
                let stored = article.embedding.as_deref()?;
                let similarity = f64::from(cosine_similarity(&embedding, stored));
                Some((article, similarity))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(cap);
        Ok(scored)
    }

    /// Recent, reasonably trusted articles ordered by trust then engagement.
    pub async fn get_trending_articles(
        &self,
        limit: usize,
        filters: &SearchFilters,
        time_range_days: i64,
    ) -> Result<Vec<Article>> {
        let mut query = ArticleQuery::active()
            .with_filters(filters.clone())
            .min_trust(TRENDING_MIN_TRUST)
            .sorted_by(&[
                SortKey::Trust,
                SortKey::Views,
                SortKey::Shares,
                SortKey::PublishedAt,
            ])
            .limit(limit);
        // A window reaching past the representable range covers everything.
        if let Some(start) = days_before(Utc::now(), time_range_days) {
            query = query.published_after(start);
        }
        self.store.query_articles(&query).await
    }

    pub async fn get_high_trust_articles(
        &self,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Article>> {
        let query = ArticleQuery::active()
            .with_filters(filters.clone())
            .min_trust(HIGH_TRUST_MIN)
            .sorted_by(&[SortKey::Trust, SortKey::PublishedAt])
            .limit(limit);
        self.store.query_articles(&query).await
    }

    /// Active articles sharing a tag, the category, a company or an
    /// industry with `id`, newest first.
    pub async fn get_related_articles(&self, id: ArticleId, limit: usize) -> Result<Vec<Article>> {
        let article = self.get_article(id).await?;
        let query = ArticleQuery::active()
            .overlapping(Overlap::of(&article), article.id)
            .sorted_by(&[SortKey::PublishedAt])
            .limit(limit);
        self.store.query_articles(&query).await
    }

    pub async fn get_article(&self, id: ArticleId) -> Result<Article> {
        self.store
            .get_article(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("article {}", id)))
    }

    pub async fn update_engagement(&self, id: ArticleId, kind: EngagementKind) -> Result<()> {
        if self.store.increment_engagement(id, kind).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("article {}", id)))
        }
    }

    /// Tags, companies and categories containing `query`, interleaved
    /// round-robin so no single kind crowds out the others.
    pub async fn get_suggestions(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let terms = self.store.suggestion_terms().await?;
        let matching = |values: Vec<String>| -> Vec<String> {
            values
                .into_iter()
                .filter(|v| v.to_lowercase().contains(&needle))
                .collect()
        };
        let mut lists = [
            matching(terms.tags).into_iter(),
            matching(terms.companies).into_iter(),
            matching(terms.categories).into_iter(),
        ];

        let mut suggestions: Vec<String> = Vec::new();
        loop {
            let mut progressed = false;
            for list in lists.iter_mut() {
                if suggestions.len() >= limit {
                    return Ok(suggestions);
                }
                if let Some(value) = list.next() {
                    progressed = true;
                    if !suggestions.iter().any(|s| s.eq_ignore_ascii_case(&value)) {
                        suggestions.push(value);
                    }
                }
            }
            if !progressed {
                return Ok(suggestions);
            }
        }
    }

    /// Answer a question from the best matching articles. Falls back to a
    /// plain listing when the model cannot answer.
    pub async fn ask(&self, question: &str, limit: usize) -> Result<Answer> {
        let options = SearchOptions {
            limit,
            ..SearchOptions::default()
        };
        let sources: Vec<Article> = self
            .search(question, &options)
            .await?
            .results
            .into_iter()
            .map(|r| r.article)
            .collect();

        if sources.is_empty() {
            return Ok(Answer {
                answer: "No relevant articles were found for this question.".to_string(),
                articles_used: Vec::new(),
                sources,
            });
        }

        match self.intelligence.answer_query(question, &sources).await {
            Ok(answer) => Ok(Answer {
                answer: answer.answer,
                articles_used: answer.articles_used,
                sources,
            }),
            Err(e) => {
                warn!(question, error = %e, "question answering failed, returning sources only");
                Ok(Answer {
                    answer: "An answer could not be generated. These articles may help:"
                        .to_string(),
                    articles_used: sources.iter().map(|a| a.id).collect(),
                    sources,
                })
            }
        }
    }

    pub async fn category_counts(&self) -> Result<Vec<(Category, u64)>> {
        self.store.count_by_category().await
    }
}
