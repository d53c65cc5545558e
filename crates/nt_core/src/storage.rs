use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::query::{ArticleQuery, SearchFilters};
use crate::types::{Article, ArticleId, Category, EngagementKind};
use crate::Result;

/// Distinct values offered as query suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionTerms {
    pub tags: Vec<String>,
    pub companies: Vec<String>,
    pub categories: Vec<String>,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a new article. Fails with [`Error::Duplicate`](crate::Error::Duplicate)
    /// when the canonical URL is already stored.
    async fn insert_article(&self, article: &Article) -> Result<()>;

    /// Replace a stored article, matched by id.
    async fn update_article(&self, article: &Article) -> Result<()>;

    /// Retire `id` in favour of `canonical`. Only the active flag and the
    /// duplicate link change; counters and every other field are left as
    /// stored. Fails with [`Error::NotFound`](crate::Error::NotFound) for an
    /// unknown id.
    async fn mark_duplicate(&self, id: ArticleId, canonical: ArticleId) -> Result<()>;

    async fn get_article(&self, id: ArticleId) -> Result<Option<Article>>;

    async fn exists_by_url(&self, url: &str) -> Result<bool>;

    /// Filter, sort and paginate the corpus.
    async fn query_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>>;

    /// Active articles matching `query` lexically, best match first.
    async fn keyword_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        min_trust: u8,
        limit: usize,
    ) -> Result<Vec<Article>>;

    /// Atomically bump one engagement counter. Returns false when the
    /// article does not exist.
    async fn increment_engagement(&self, id: ArticleId, kind: EngagementKind) -> Result<bool>;

    async fn count_by_category(&self) -> Result<Vec<(Category, u64)>>;

    async fn suggestion_terms(&self) -> Result<SuggestionTerms>;

    /// Hard-delete articles published more than `days_cutoff` days ago,
    /// keeping featured ones. Returns the number removed.
    async fn delete_old_articles(&self, days_cutoff: i64) -> Result<u64>;
}

impl SuggestionTerms {
    /// Distinct tags, companies and categories in first-seen order.
    pub fn collect<'a, I>(articles: I) -> Self
    where
        I: IntoIterator<Item = &'a Article>,
    {
        let mut terms = Self::default();
        for article in articles {
            for tag in &article.tags {
                if !terms.tags.contains(tag) {
                    terms.tags.push(tag.clone());
                }
            }
            for company in &article.companies {
                if !terms.companies.contains(company) {
                    terms.companies.push(company.clone());
                }
            }
            let category = article.category.as_str().to_string();
            if !terms.categories.contains(&category) {
                terms.categories.push(category);
            }
        }
        terms
    }
}
