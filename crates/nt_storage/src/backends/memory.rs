use async_trait::async_trait;
use chrono::Utc;
use nt_core::{
    canonical_url, days_before, lexical_score, Article, ArticleId, ArticleQuery, ArticleStore,
    Category, EngagementKind, Error, Result, SearchFilters, SuggestionTerms,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{StorageBackend, StorageConfig};

#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
    urls: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_article(&mut self, article: &Article) -> Result<()> {
        let url = canonical_url(&article.url);
        if !self.urls.insert(url.clone()) {
            return Err(Error::Duplicate(url));
        }
        self.articles.push(article.clone());
        Ok(())
    }

    pub fn update_article(&mut self, article: &Article) -> Result<()> {
        let existing = self
            .articles
            .iter_mut()
            .find(|a| a.id == article.id)
            .ok_or_else(|| Error::NotFound(format!("article {}", article.id)))?;
        let old_url = canonical_url(&existing.url);
        let new_url = canonical_url(&article.url);
        if old_url != new_url {
            if self.urls.contains(&new_url) {
                return Err(Error::Duplicate(new_url));
            }
            self.urls.remove(&old_url);
            self.urls.insert(new_url);
        }
        *existing = article.clone();
        Ok(())
    }

    pub fn mark_duplicate(&mut self, id: ArticleId, canonical: ArticleId) -> Result<()> {
        let article = self
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("article {}", id)))?;
        article.mark_duplicate_of(canonical);
        Ok(())
    }

    pub fn get(&self, id: ArticleId) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }

    pub fn keyword_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        min_trust: u8,
        limit: usize,
    ) -> Vec<Article> {
        let candidates = ArticleQuery::active().with_filters(filters.clone()).min_trust(min_trust);
        let mut scored: Vec<(f64, &Article)> = self
            .articles
            .iter()
            .filter(|a| candidates.matches(a))
            .map(|a| (lexical_score(query, a), a))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(limit).map(|(_, a)| a.clone()).collect()
    }

    pub fn increment(&mut self, id: ArticleId, kind: EngagementKind) -> bool {
        match self.articles.iter_mut().find(|a| a.id == id) {
            Some(article) => {
                article.engagement.increment(kind);
                true
            }
            None => false,
        }
    }

    pub fn count_by_category(&self) -> Vec<(Category, u64)> {
        let mut counts: BTreeMap<Category, u64> = BTreeMap::new();
        for article in &self.articles {
            *counts.entry(article.category).or_insert(0) += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }

    pub fn delete_old_articles(&mut self, days_cutoff: i64) -> u64 {
        let Some(cutoff) = days_before(Utc::now(), days_cutoff) else {
            return 0;
        };
        let before = self.articles.len();
        let urls = &mut self.urls;
        self.articles.retain(|a| {
            let keep = a.is_featured || a.published_at >= cutoff;
            if !keep {
                urls.remove(&canonical_url(&a.url));
            }
            keep
        });
        (before - self.articles.len()) as u64
    }
}

/// Process-local store. Everything is lost on exit.
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn connect(_config: &StorageConfig) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStore for InMemoryStorage {
    async fn insert_article(&self, article: &Article) -> Result<()> {
        self.store.write().await.insert_article(article)
    }

    async fn update_article(&self, article: &Article) -> Result<()> {
        self.store.write().await.update_article(article)
    }

    async fn mark_duplicate(&self, id: ArticleId, canonical: ArticleId) -> Result<()> {
        self.store.write().await.mark_duplicate(id, canonical)
    }

    async fn get_article(&self, id: ArticleId) -> Result<Option<Article>> {
        Ok(self.store.read().await.get(id).cloned())
    }

    async fn exists_by_url(&self, url: &str) -> Result<bool> {
        Ok(self.store.read().await.urls.contains(&canonical_url(url)))
    }

    async fn query_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(query.apply(store.articles.iter().cloned()))
    }

    async fn keyword_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        min_trust: u8,
        limit: usize,
    ) -> Result<Vec<Article>> {
        Ok(self.store.read().await.keyword_search(query, filters, min_trust, limit))
    }

    async fn increment_engagement(&self, id: ArticleId, kind: EngagementKind) -> Result<bool> {
        Ok(self.store.write().await.increment(id, kind))
    }

    async fn count_by_category(&self) -> Result<Vec<(Category, u64)>> {
        Ok(self.store.read().await.count_by_category())
    }

    async fn suggestion_terms(&self) -> Result<SuggestionTerms> {
        let store = self.store.read().await;
        Ok(SuggestionTerms::collect(store.articles.iter().filter(|a| a.is_active)))
    }

    async fn delete_old_articles(&self, days_cutoff: i64) -> Result<u64> {
        Ok(self.store.write().await.delete_old_articles(days_cutoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nt_core::{ArticleDraft, Enrichment, Source, SortKey};

    fn article(url: &str, title: &str, days_old: i64) -> Article {
        let draft = ArticleDraft {
            url: url.to_string(),
            title: title.to_string(),
            content: format!("{} and more", title),
            author: Some("Test Author".to_string()),
            published_at: Some(Utc::now() - Duration::days(days_old)),
            source: Source::rss("test", "http://test.com/feed"),
            source_categories: vec![],
        };
        draft.into_article(Enrichment::default(), Utc::now())
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = InMemoryStorage::new();
        let a = article("http://test.com/a", "Test Article", 0);
        storage.insert_article(&a).await.unwrap();

        assert!(storage.exists_by_url("HTTP://TEST.COM/A").await.unwrap());
        let fetched = storage.get_article(a.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Test Article");
    }

    #[tokio::test]
    async fn test_duplicate_url_is_rejected() {
        let storage = InMemoryStorage::new();
        storage.insert_article(&article("http://test.com/a", "One", 0)).await.unwrap();
        let err = storage
            .insert_article(&article("http://TEST.com/a", "Two", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_retention_keeps_featured() {
        let storage = InMemoryStorage::new();
        let old = article("http://test.com/old", "Old", 120);
        let mut featured = article("http://test.com/featured", "Featured", 120);
        featured.is_featured = true;
        let fresh = article("http://test.com/fresh", "Fresh", 1);
        for a in [&old, &featured, &fresh] {
            storage.insert_article(a).await.unwrap();
        }

        let removed = storage.delete_old_articles(90).await.unwrap();
        assert_eq!(removed, 1);
        assert!(storage.get_article(old.id).await.unwrap().is_none());
        assert!(storage.get_article(featured.id).await.unwrap().is_some());
        assert!(storage.get_article(fresh.id).await.unwrap().is_some());
        // the URL becomes free again
        assert!(!storage.exists_by_url("http://test.com/old").await.unwrap());

        assert_eq!(storage.delete_old_articles(i64::MAX).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_engagement_increments() {
        let storage = InMemoryStorage::new();
        let a = article("http://test.com/a", "A", 0);
        storage.insert_article(&a).await.unwrap();

        assert!(storage.increment_engagement(a.id, EngagementKind::View).await.unwrap());
        assert!(storage.increment_engagement(a.id, EngagementKind::View).await.unwrap());
        assert!(storage.increment_engagement(a.id, EngagementKind::Share).await.unwrap());
        assert!(!storage
            .increment_engagement(ArticleId::new(), EngagementKind::Save)
            .await
            .unwrap());

        let a = storage.get_article(a.id).await.unwrap().unwrap();
        assert_eq!(a.engagement.views, 2);
        assert_eq!(a.engagement.shares, 1);
        assert_eq!(a.engagement.saves, 0);
    }

    #[tokio::test]
    async fn test_mark_duplicate_keeps_engagement() {
        let storage = InMemoryStorage::new();
        let canonical = article("http://test.com/a", "A", 1);
        let copy = article("http://test.com/b", "A copy", 0);
        storage.insert_article(&canonical).await.unwrap();
        storage.insert_article(&copy).await.unwrap();

        storage.increment_engagement(copy.id, EngagementKind::Save).await.unwrap();
        storage.mark_duplicate(copy.id, canonical.id).await.unwrap();

        let copy = storage.get_article(copy.id).await.unwrap().unwrap();
        assert!(!copy.is_active);
        assert_eq!(copy.duplicate_of, Some(canonical.id));
        assert_eq!(copy.engagement.saves, 1);

        let missing = storage.mark_duplicate(ArticleId::new(), canonical.id).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_keyword_search_orders_by_relevance() {
        let storage = InMemoryStorage::new();
        let strong = article("http://test.com/1", "Tesla Tesla battery", 0);
        let weak = article("http://test.com/2", "Battery makers", 0);
        let mut hidden = article("http://test.com/3", "Tesla recall", 0);
        hidden.mark_duplicate_of(strong.id);
        for a in [&weak, &strong, &hidden] {
            storage.insert_article(a).await.unwrap();
        }

        let results = storage
            .keyword_search("tesla", &SearchFilters::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, strong.id);

        let results = storage
            .keyword_search("battery", &SearchFilters::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_query_articles_sorts_newest_first() {
        let storage = InMemoryStorage::new();
        let older = article("http://test.com/1", "Older", 3);
        let newer = article("http://test.com/2", "Newer", 1);
        storage.insert_article(&older).await.unwrap();
        storage.insert_article(&newer).await.unwrap();

        let out = storage
            .query_articles(&ArticleQuery::active().sorted_by(&[SortKey::PublishedAt]))
            .await
            .unwrap();
        assert_eq!(out[0].id, newer.id);
        assert_eq!(out[1].id, older.id);
    }
}
