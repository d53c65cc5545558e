use async_trait::async_trait;
use chrono::Utc;
use nt_core::{
    canonical_url, days_before, Article, ArticleId, ArticleQuery, ArticleStore, Category,
    EngagementKind, Error, Result, SearchFilters, SuggestionTerms,
};
use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqlitePool, QueryBuilder, Row, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::{StorageBackend, StorageConfig};

// The full article lives in `data` as JSON; the other columns exist for
// constraints, filtering and retention. `articles_fts` shares rowids with
// `articles` and is maintained by the triggers below.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        url TEXT NOT NULL UNIQUE,
        category TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        is_featured INTEGER NOT NULL,
        published_ts INTEGER NOT NULL,
        trust_overall INTEGER NOT NULL,
        data TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_active ON articles (is_active, trust_overall)",
    "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles (published_ts)",
    "CREATE INDEX IF NOT EXISTS idx_articles_category ON articles (category)",
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS articles_fts USING fts5(
        title, content, tags, tokenize = 'unicode61'
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS articles_fts_insert AFTER INSERT ON articles
    BEGIN
        INSERT INTO articles_fts (rowid, title, content, tags)
        VALUES (
            new.rowid,
            json_extract(new.data, '$.title'),
            json_extract(new.data, '$.content'),
            (SELECT group_concat(value, ' ') FROM json_each(new.data, '$.tags'))
        );
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS articles_fts_update AFTER UPDATE OF data ON articles
    WHEN json_extract(old.data, '$.title') IS NOT json_extract(new.data, '$.title')
        OR json_extract(old.data, '$.content') IS NOT json_extract(new.data, '$.content')
        OR json_extract(old.data, '$.tags') IS NOT json_extract(new.data, '$.tags')
    BEGIN
        DELETE FROM articles_fts WHERE rowid = old.rowid;
        INSERT INTO articles_fts (rowid, title, content, tags)
        VALUES (
            new.rowid,
            json_extract(new.data, '$.title'),
            json_extract(new.data, '$.content'),
            (SELECT group_concat(value, ' ') FROM json_each(new.data, '$.tags'))
        );
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS articles_fts_delete AFTER DELETE ON articles
    BEGIN
        DELETE FROM articles_fts WHERE rowid = old.rowid;
    END
    "#,
    // Index rows written before the full-text table existed.
    r#"
    INSERT INTO articles_fts (rowid, title, content, tags)
    SELECT a.rowid,
           json_extract(a.data, '$.title'),
           json_extract(a.data, '$.content'),
           (SELECT group_concat(value, ' ') FROM json_each(a.data, '$.tags'))
    FROM articles a
    WHERE a.rowid NOT IN (SELECT rowid FROM articles_fts)
    "#,
];

/// Title hits rank above tag hits, which rank above body hits.
const BM25_RANKING: &str = "bm25(articles_fts, 3.0, 1.0, 2.0)";

fn db_err(context: &str, e: sqlx::Error) -> Error {
    Error::Database(format!("{}: {}", context, e))
}

/// FTS5 expression matching any query term as a prefix. Terms are split on
/// non-alphanumerics and quoted, so user input never reaches FTS5 syntax.
fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"*", t.to_lowercase()))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" OR "))
}

/// Appends the structured filters as `AND` clauses over the `a` alias.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &SearchFilters) {
    if let Some(category) = filters.category {
        builder.push(" AND a.category = ").push_bind(category.as_str());
    }
    if let Some(source) = &filters.source {
        builder
            .push(" AND lower(json_extract(a.data, '$.source.name')) = lower(")
            .push_bind(source.clone())
            .push(")");
    }
    if let Some(company) = &filters.company {
        builder
            .push(" AND EXISTS (SELECT 1 FROM json_each(a.data, '$.companies')")
            .push(" WHERE lower(value) = lower(")
            .push_bind(company.clone())
            .push("))");
    }
    if let Some(industry) = &filters.industry {
        builder
            .push(" AND EXISTS (SELECT 1 FROM json_each(a.data, '$.industries')")
            .push(" WHERE lower(value) = lower(")
            .push_bind(industry.clone())
            .push("))");
    }
    if let Some(from) = filters.date_from {
        builder.push(" AND a.published_ts >= ").push_bind(from.timestamp());
    }
    if let Some(to) = filters.date_to {
        builder.push(" AND a.published_ts <= ").push_bind(to.timestamp());
    }
    if let Some(sentiment) = filters.sentiment {
        builder
            .push(" AND json_extract(a.data, '$.intelligence.sentiment') = ")
            .push_bind(sentiment.as_str());
    }
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    async fn connect(config: &StorageConfig) -> Result<Self> {
        Self::new_with_path(&config.db_path).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| db_err("invalid database path", e))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| db_err("failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| db_err(&format!("failed to run migration {}", i), e))?;
        }
        tracing::info!(path = %db_path.display(), "sqlite article store ready");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn fetch(
        &self,
        mut builder: QueryBuilder<'_, Sqlite>,
        context: &str,
    ) -> Result<Vec<Article>> {
        let rows = builder
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| db_err(context, e))?;

        rows.iter()
            .map(|row| {
                let data: String = row.get("data");
                serde_json::from_str(&data).map_err(Error::Serialization)
            })
            .collect()
    }
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn insert_article(&self, article: &Article) -> Result<()> {
        let url = canonical_url(&article.url);
        let data = serde_json::to_string(article)?;
        let result = sqlx::query(
            r#"
            INSERT INTO articles
            (id, url, category, is_active, is_featured, published_ts, trust_overall, data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article.id.to_string())
        .bind(&url)
        .bind(article.category.as_str())
        .bind(article.is_active)
        .bind(article.is_featured)
        .bind(article.published_at.timestamp())
        .bind(i64::from(article.trust.overall()))
        .bind(data)
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(Error::Duplicate(url)),
            Err(e) => Err(db_err("failed to store article", e)),
        }
    }

    async fn update_article(&self, article: &Article) -> Result<()> {
        let data = serde_json::to_string(article)?;
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET url = ?, category = ?, is_active = ?, is_featured = ?,
                published_ts = ?, trust_overall = ?, data = ?
            WHERE id = ?
            "#,
        )
        .bind(canonical_url(&article.url))
        .bind(article.category.as_str())
        .bind(article.is_active)
        .bind(article.is_featured)
        .bind(article.published_at.timestamp())
        .bind(i64::from(article.trust.overall()))
        .bind(data)
        .bind(article.id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(|e| db_err("failed to update article", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("article {}", article.id)));
        }
        Ok(())
    }

    async fn mark_duplicate(&self, id: ArticleId, canonical: ArticleId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET is_active = 0,
                data = json_set(data, '$.isActive', json('false'), '$.duplicateOf', ?)
            WHERE id = ?
            "#,
        )
        .bind(canonical.to_string())
        .bind(id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(|e| db_err("failed to mark duplicate", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("article {}", id)));
        }
        Ok(())
    }

    async fn get_article(&self, id: ArticleId) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT data FROM articles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_err("failed to get article", e))?;

        match row {
            Some(row) => {
                let data: String = row.get("data");
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn exists_by_url(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE url = ?")
            .bind(canonical_url(url))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_err("failed to look up url", e))?;
        Ok(row.is_some())
    }

    async fn query_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT a.data FROM articles a WHERE 1 = 1");
        if query.active_only {
            builder.push(" AND a.is_active = 1");
        }
        if let Some(min_trust) = query.min_trust {
            builder.push(" AND a.trust_overall >= ").push_bind(i64::from(min_trust));
        }
        if let Some(after) = query.published_after {
            builder.push(" AND a.published_ts >= ").push_bind(after.timestamp());
        }
        if let Some(exclude) = query.exclude {
            builder.push(" AND a.id <> ").push_bind(exclude.to_string());
        }
        if query.require_embedding {
            builder.push(" AND json_array_length(a.data, '$.embedding') > 0");
        }
        push_filters(&mut builder, &query.filters);
        builder.push(" ORDER BY a.rowid");

        // Overlap, sort and pagination run on the narrowed rows; timestamps
        // are re-checked at sub-second precision there too.
        let articles = self.fetch(builder, "failed to query articles").await?;
        Ok(query.apply(articles))
    }

    async fn keyword_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        min_trust: u8,
        limit: usize,
    ) -> Result<Vec<Article>> {
        let Some(expression) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT a.data FROM articles_fts JOIN articles a ON a.rowid = articles_fts.rowid \
             WHERE articles_fts MATCH ",
        );
        builder.push_bind(expression);
        builder.push(" AND a.is_active = 1 AND a.trust_overall >= ");
        builder.push_bind(i64::from(min_trust));
        push_filters(&mut builder, filters);
        builder.push(" ORDER BY ").push(BM25_RANKING).push(", a.rowid LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let articles = self.fetch(builder, "failed to run keyword search").await?;
        Ok(articles.into_iter().filter(|a| filters.matches(a)).collect())
    }

    async fn increment_engagement(&self, id: ArticleId, kind: EngagementKind) -> Result<bool> {
        // Single UPDATE statement, so the increment is atomic.
        let sql = match kind {
            EngagementKind::View => {
                "UPDATE articles SET data = json_set(data, '$.engagement.views', \
                 COALESCE(json_extract(data, '$.engagement.views'), 0) + 1) WHERE id = ?"
            }
            EngagementKind::Save => {
                "UPDATE articles SET data = json_set(data, '$.engagement.saves', \
                 COALESCE(json_extract(data, '$.engagement.saves'), 0) + 1) WHERE id = ?"
            }
            EngagementKind::Share => {
                "UPDATE articles SET data = json_set(data, '$.engagement.shares', \
                 COALESCE(json_extract(data, '$.engagement.shares'), 0) + 1) WHERE id = ?"
            }
        };
        let result = sqlx::query(sql)
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(|e| db_err("failed to update engagement", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_category(&self) -> Result<Vec<(Category, u64)>> {
        let rows = sqlx::query(
            "SELECT category, COUNT(*) AS n FROM articles GROUP BY category ORDER BY n DESC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_err("failed to count categories", e))?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let category: String = row.get("category");
            let n: i64 = row.get("n");
            counts.push((category.parse::<Category>()?, n.max(0) as u64));
        }
        Ok(counts)
    }

    async fn suggestion_terms(&self) -> Result<SuggestionTerms> {
        let builder = QueryBuilder::<Sqlite>::new(
            "SELECT a.data FROM articles a WHERE a.is_active = 1 ORDER BY a.rowid",
        );
        let articles = self.fetch(builder, "failed to load suggestion terms").await?;
        Ok(SuggestionTerms::collect(&articles))
    }

    async fn delete_old_articles(&self, days_cutoff: i64) -> Result<u64> {
        let Some(cutoff) = days_before(Utc::now(), days_cutoff) else {
            return Ok(0);
        };
        let result = sqlx::query("DELETE FROM articles WHERE published_ts < ? AND is_featured = 0")
            .bind(cutoff.timestamp())
            .execute(&*self.pool)
            .await
            .map_err(|e| db_err("failed to delete old articles", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nt_core::{ArticleDraft, Enrichment, Source};
    use tempfile::{tempdir, TempDir};

    fn article(url: &str, title: &str, days_old: i64) -> Article {
        let draft = ArticleDraft {
            url: url.to_string(),
            title: title.to_string(),
            content: "Test content".to_string(),
            author: None,
            published_at: Some(Utc::now() - Duration::days(days_old)),
            source: Source::rss("test", "http://example.com/feed"),
            source_categories: vec![],
        };
        draft.into_article(Enrichment::default(), Utc::now())
    }

    async fn open() -> (TempDir, SQLiteStorage) {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("t.db")).await.unwrap();
        (temp_dir, storage)
    }

    fn ids(articles: &[Article]) -> Vec<ArticleId> {
        articles.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_fts_match_expression_quotes_terms() {
        assert_eq!(
            fts_match_expression("GPT-5 \"launch\" OR"),
            Some("\"gpt\"* OR \"5\"* OR \"launch\"* OR \"or\"*".to_string())
        );
        assert_eq!(fts_match_expression("  -- "), None);
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        let (_dir, storage) = open().await;

        let a = article("http://example.com/a", "Test Article", 0);
        storage.insert_article(&a).await.unwrap();
        assert!(storage.exists_by_url("http://EXAMPLE.com/a").await.unwrap());

        let dup = article("http://example.com/A", "Same url", 0);
        assert!(matches!(storage.insert_article(&dup).await, Err(Error::Duplicate(_))));

        let mut stored = storage.get_article(a.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Test Article");

        stored.mark_duplicate_of(ArticleId::new());
        storage.update_article(&stored).await.unwrap();
        let active = storage.query_articles(&ArticleQuery::active()).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_engagement_and_retention() {
        let (_dir, storage) = open().await;

        let fresh = article("http://example.com/fresh", "Fresh", 0);
        let old = article("http://example.com/old", "Old", 100);
        let mut featured = article("http://example.com/featured", "Featured", 100);
        featured.is_featured = true;
        for a in [&fresh, &old, &featured] {
            storage.insert_article(a).await.unwrap();
        }

        assert!(storage.increment_engagement(fresh.id, EngagementKind::Save).await.unwrap());
        let fresh = storage.get_article(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.engagement.saves, 1);

        assert_eq!(storage.delete_old_articles(90).await.unwrap(), 1);
        assert!(storage.get_article(old.id).await.unwrap().is_none());
        assert!(storage.get_article(featured.id).await.unwrap().is_some());

        let counts = storage.count_by_category().await.unwrap();
        assert_eq!(counts, vec![(Category::Other, 2)]);

        assert_eq!(storage.delete_old_articles(i64::MAX).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_duplicate_keeps_engagement() {
        let (_dir, storage) = open().await;
        let canonical = article("http://example.com/1", "Original", 1);
        let copy = article("http://example.com/2", "Copy", 0);
        storage.insert_article(&canonical).await.unwrap();
        storage.insert_article(&copy).await.unwrap();

        storage.increment_engagement(copy.id, EngagementKind::View).await.unwrap();
        storage.increment_engagement(copy.id, EngagementKind::Share).await.unwrap();
        storage.mark_duplicate(copy.id, canonical.id).await.unwrap();

        let copy = storage.get_article(copy.id).await.unwrap().unwrap();
        assert!(!copy.is_active);
        assert_eq!(copy.duplicate_of, Some(canonical.id));
        assert_eq!(copy.engagement.views, 1);
        assert_eq!(copy.engagement.shares, 1);

        let active = storage.query_articles(&ArticleQuery::active()).await.unwrap();
        assert_eq!(ids(&active), vec![canonical.id]);

        let missing = storage.mark_duplicate(ArticleId::new(), canonical.id).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_keyword_search_uses_full_text_index() {
        let (_dir, storage) = open().await;

        let mut strong = article("http://example.com/1", "Tesla cuts prices", 0);
        strong.content = "Tesla lowered prices across its lineup.".to_string();
        let mut weak = article("http://example.com/2", "Carmakers react", 0);
        weak.content = "Rivals respond to Tesla's move.".to_string();
        let mut hidden = article("http://example.com/3", "Tesla recall", 0);
        hidden.mark_duplicate_of(strong.id);
        let mut low_trust = article("http://example.com/4", "Tesla rumor mill", 0);
        low_trust.trust = nt_core::TrustScore::uniform(20);
        let unrelated = article("http://example.com/5", "Weather report", 0);
        for a in [&weak, &strong, &hidden, &low_trust, &unrelated] {
            storage.insert_article(a).await.unwrap();
        }

        let results = storage
            .keyword_search("tesla", &SearchFilters::default(), 40, 10)
            .await
            .unwrap();
        assert_eq!(ids(&results), vec![strong.id, weak.id]);

        let results = storage
            .keyword_search("tesla", &SearchFilters::default(), 40, 1)
            .await
            .unwrap();
        assert_eq!(ids(&results), vec![strong.id]);

        let filters = SearchFilters {
            category: Some(Category::Energy),
            ..SearchFilters::default()
        };
        assert!(storage.keyword_search("tesla", &filters, 0, 10).await.unwrap().is_empty());
        assert!(storage
            .keyword_search(" ", &SearchFilters::default(), 0, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_full_text_index_follows_updates_and_deletes() {
        let (_dir, storage) = open().await;
        let mut a = article("http://example.com/1", "Solar farm opens", 0);
        storage.insert_article(&a).await.unwrap();
        let old = article("http://example.com/2", "Solar subsidy ends", 200);
        storage.insert_article(&old).await.unwrap();

        a.title = "Wind farm opens".to_string();
        a.tags = vec!["renewables".to_string()];
        storage.update_article(&a).await.unwrap();

        let solar = storage
            .keyword_search("solar", &SearchFilters::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(ids(&solar), vec![old.id]);
        let tagged = storage
            .keyword_search("renewables", &SearchFilters::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(ids(&tagged), vec![a.id]);

        // engagement writes leave the index alone
        storage.increment_engagement(a.id, EngagementKind::View).await.unwrap();
        let wind = storage
            .keyword_search("wind", &SearchFilters::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(ids(&wind), vec![a.id]);

        storage.delete_old_articles(90).await.unwrap();
        assert!(storage
            .keyword_search("solar", &SearchFilters::default(), 0, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_query_articles_pushes_filters_down() {
        let (_dir, storage) = open().await;
        let mut energy = article("http://example.com/1", "Grid upgrade", 0);
        energy.category = Category::Energy;
        energy.companies = vec!["Siemens".to_string()];
        energy.trust = nt_core::TrustScore::uniform(80);
        let mut other = article("http://example.com/2", "Chip shortage", 0);
        other.trust = nt_core::TrustScore::uniform(80);
        let mut weak = article("http://example.com/3", "Grid rumor", 0);
        weak.category = Category::Energy;
        weak.trust = nt_core::TrustScore::uniform(30);
        for a in [&energy, &other, &weak] {
            storage.insert_article(a).await.unwrap();
        }

        let filters = SearchFilters {
            category: Some(Category::Energy),
            company: Some("siemens".to_string()),
            ..SearchFilters::default()
        };
        let out = storage
            .query_articles(&ArticleQuery::active().with_filters(filters).min_trust(60))
            .await
            .unwrap();
        assert_eq!(ids(&out), vec![energy.id]);

        let out = storage
            .query_articles(&ArticleQuery::active().min_trust(60))
            .await
            .unwrap();
        assert_eq!(ids(&out), vec![energy.id, other.id]);
    }
}
