use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::types::{Article, ArticleId, Category, Sentiment};

/// Structured filters shared by keyword, semantic and listing queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub category: Option<Category>,
    pub source: Option<String>,
    pub company: Option<String>,
    pub industry: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub sentiment: Option<Sentiment>,
}

impl SearchFilters {
    pub fn matches(&self, article: &Article) -> bool {
        if let Some(category) = self.category {
            if article.category != category {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if !article.source.name.eq_ignore_ascii_case(source) {
                return false;
            }
        }
        if let Some(company) = &self.company {
            if !article.companies.iter().any(|c| c.eq_ignore_ascii_case(company)) {
                return false;
            }
        }
        if let Some(industry) = &self.industry {
            if !article.industries.iter().any(|i| i.eq_ignore_ascii_case(industry)) {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if article.published_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if article.published_at > to {
                return false;
            }
        }
        if let Some(sentiment) = self.sentiment {
            if article.intelligence.insights.sentiment != sentiment {
                return false;
            }
        }
        true
    }
}

/// Signals used to find related articles. An article overlaps when it shares
/// any one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlap {
    pub tags: Vec<String>,
    pub category: Option<Category>,
    pub companies: Vec<String>,
    pub industries: Vec<String>,
}

impl Overlap {
    pub fn of(article: &Article) -> Self {
        Self {
            tags: article.tags.clone(),
            category: Some(article.category),
            companies: article.companies.clone(),
            industries: article.industries.clone(),
        }
    }

    pub fn matches(&self, article: &Article) -> bool {
        self.category == Some(article.category)
            || article.tags.iter().any(|t| self.tags.contains(t))
            || article.companies.iter().any(|c| self.companies.contains(c))
            || article.industries.iter().any(|i| self.industries.contains(i))
    }
}

/// Descending sort keys, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Trust,
    Views,
    Shares,
    PublishedAt,
}

impl SortKey {
    fn compare(&self, a: &Article, b: &Article) -> Ordering {
        match self {
            SortKey::Trust => b.trust.overall().cmp(&a.trust.overall()),
            SortKey::Views => b.engagement.views.cmp(&a.engagement.views),
            SortKey::Shares => b.engagement.shares.cmp(&a.engagement.shares),
            SortKey::PublishedAt => b.published_at.cmp(&a.published_at),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub filters: SearchFilters,
    pub active_only: bool,
    pub min_trust: Option<u8>,
    pub published_after: Option<DateTime<Utc>>,
    pub require_embedding: bool,
    pub overlap: Option<Overlap>,
    pub exclude: Option<ArticleId>,
    pub sort: Vec<SortKey>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl ArticleQuery {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn min_trust(mut self, min_trust: u8) -> Self {
        self.min_trust = Some(min_trust);
        self
    }

    pub fn published_after(mut self, after: DateTime<Utc>) -> Self {
        self.published_after = Some(after);
        self
    }

    pub fn with_embedding(mut self) -> Self {
        self.require_embedding = true;
        self
    }

    pub fn overlapping(mut self, overlap: Overlap, exclude: ArticleId) -> Self {
        self.overlap = Some(overlap);
        self.exclude = Some(exclude);
        self
    }

    pub fn sorted_by(mut self, keys: &[SortKey]) -> Self {
        self.sort = keys.to_vec();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, article: &Article) -> bool {
        if self.active_only && !article.is_active {
            return false;
        }
        if let Some(min) = self.min_trust {
            if article.trust.overall() < min {
                return false;
            }
        }
        if let Some(after) = self.published_after {
            if article.published_at < after {
                return false;
            }
        }
        if self.require_embedding && !article.has_embedding() {
            return false;
        }
        if self.exclude == Some(article.id) {
            return false;
        }
        if let Some(overlap) = &self.overlap {
            if !overlap.matches(article) {
                return false;
            }
        }
        self.filters.matches(article)
    }

    /// Stable multi-key sort.
    pub fn sort(&self, articles: &mut [Article]) {
        if self.sort.is_empty() {
            return;
        }
        articles.sort_by(|a, b| {
            self.sort
                .iter()
                .map(|key| key.compare(a, b))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Filters, sorts and paginates an in-memory candidate set.
    pub fn apply<I>(&self, articles: I) -> Vec<Article>
    where
        I: IntoIterator<Item = Article>,
    {
        let mut matched: Vec<Article> = articles
            .into_iter()
            .filter(|a| self.matches(a))
            .collect();
        self.sort(&mut matched);
        let page = matched.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        }
    }
}

/// Start of a window reaching `days` back from `now`, or `None` when that
/// lies outside the representable date range.
pub fn days_before(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|window| now.checked_sub_signed(window))
}

fn terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Lexical relevance of an article for a free-text query.
///
/// Title hits weigh more than tag hits, which weigh more than body hits.
/// Zero means no term matched.
pub fn lexical_score(query: &str, article: &Article) -> f64 {
    let terms = terms(query);
    if terms.is_empty() {
        return 0.0;
    }
    let title = article.title.to_lowercase();
    let content = article.content.to_lowercase();

    let mut score = 0.0;
    for term in &terms {
        score += 3.0 * title.matches(term.as_str()).count() as f64;
        if article.tags.iter().any(|t| t.to_lowercase() == *term) {
            score += 2.0;
        }
        score += content.matches(term.as_str()).count().min(5) as f64;
    }
    if score > 0.0 && terms.len() > 1 && title.contains(&query.trim().to_lowercase()) {
        score += 5.0;
    }
    score
}
