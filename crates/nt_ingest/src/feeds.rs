use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nt_core::{ArticleDraft, Error, Result, Source, SourceKind};
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

const MAX_ITEMS_PER_FEED: usize = 50;
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// A configured upstream feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// Attached to every item as source categories.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl FeedSource {
    pub fn new(name: &str, url: &str, categories: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind: SourceKind::Rss,
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn source(&self) -> Source {
        Source {
            name: self.name.clone(),
            kind: self.kind,
            feed_url: Some(self.url.clone()),
        }
    }
}

pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("TechCrunch", "https://techcrunch.com/feed/", &["Technology", "Startups"]),
        FeedSource::new("The Verge", "https://www.theverge.com/rss/index.xml", &["Technology"]),
        FeedSource::new(
            "Ars Technica",
            "https://feeds.arstechnica.com/arstechnica/index",
            &["Technology", "Science"],
        ),
        FeedSource::new(
            "BBC News",
            "https://feeds.bbci.co.uk/news/business/rss.xml",
            &["Business"],
        ),
        FeedSource::new(
            "CNBC",
            "https://www.cnbc.com/id/100003114/device/rss/rss.html",
            &["Finance", "Markets"],
        ),
        FeedSource::new("Hacker News", "https://hnrss.org/frontpage", &["Technology"]),
    ]
}

/// Reads a JSON array of [`FeedSource`] objects.
pub fn load_feeds(path: &Path) -> Result<Vec<FeedSource>> {
    let raw = std::fs::read_to_string(path)?;
    let feeds: Vec<FeedSource> = serde_json::from_str(&raw)?;
    for feed in &feeds {
        Url::parse(&feed.url).map_err(|e| Error::InvalidUrl(format!("{}: {}", feed.url, e)))?;
    }
    Ok(feeds)
}

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse one feed into drafts.
    async fn fetch(&self, feed: &FeedSource) -> Result<Vec<ArticleDraft>>;
}

/// Collapses an HTML fragment into plain text.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve_link(base: &str, href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(base).ok()?.join(href).ok().map(|u| u.to_string()),
    }
}

/// Maps parsed feed entries to drafts, dropping entries without a link or title.
pub fn entries_to_drafts(feed: &FeedSource, parsed: feed_rs::model::Feed) -> Vec<ArticleDraft> {
    parsed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let href = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
            let url = resolve_link(&feed.url, &href)?;
            let title = entry.title.map(|t| html_to_text(&t.content))?;
            if title.is_empty() {
                return None;
            }

            let body = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content))
                .unwrap_or_default();

            let mut categories = feed.categories.clone();
            for category in entry.categories {
                let term = category.label.unwrap_or(category.term);
                if !term.is_empty() && !categories.contains(&term) {
                    categories.push(term);
                }
            }

            Some(ArticleDraft {
                url,
                title,
                content: html_to_text(&body),
                author: entry.authors.first().map(|p| p.name.clone()).filter(|n| !n.is_empty()),
                published_at: entry.published.or(entry.updated),
                source: feed.source(),
                source_categories: categories,
            })
        })
        .take(MAX_ITEMS_PER_FEED)
        .collect()
}

/// Fetches RSS, Atom and JSON feeds over HTTP.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("nt-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, feed: &FeedSource) -> Result<Vec<ArticleDraft>> {
        let bytes = self
            .client
            .get(&feed.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let parsed = feed_rs::parser::parse(&bytes[..])
            .map_err(|e| Error::Feed(format!("{}: {}", feed.name, e)))?;

        let drafts = entries_to_drafts(feed, parsed);
        info!(
            feed = %feed.name,
            items = drafts.len(),
            fetched_at = %Utc::now(),
            "📡 feed parsed"
        );
        Ok(drafts)
    }
}
