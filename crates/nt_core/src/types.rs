use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Body text is truncated to this many characters before storage.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Weights applied to the six trust components, in field order:
/// source reputation, content quality, author expertise, recency,
/// consensus, citation references.
pub const TRUST_WEIGHTS: [f64; 6] = [0.30, 0.20, 0.15, 0.15, 0.10, 0.10];

/// Normalizes an article URL into the identity key used by the store.
pub fn canonical_url(url: &str) -> String {
    url.trim().to_lowercase()
}

pub fn cap_content(content: &str) -> String {
    match content.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((idx, _)) => content[..idx].to_string(),
        None => content.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub Uuid);

impl ArticleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ArticleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::NotFound(format!("invalid article id {}: {}", s, e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Technology,
    #[serde(rename = "ai")]
    ArtificialIntelligence,
    Business,
    Finance,
    Markets,
    Startups,
    Healthcare,
    Energy,
    Policy,
    Science,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Technology,
        Category::ArtificialIntelligence,
        Category::Business,
        Category::Finance,
        Category::Markets,
        Category::Startups,
        Category::Healthcare,
        Category::Energy,
        Category::Policy,
        Category::Science,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technology => "technology",
            Category::ArtificialIntelligence => "ai",
            Category::Business => "business",
            Category::Finance => "finance",
            Category::Markets => "markets",
            Category::Startups => "startups",
            Category::Healthcare => "healthcare",
            Category::Energy => "energy",
            Category::Policy => "policy",
            Category::Science => "science",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| Error::NotFound(format!("unknown category: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl FromStr for Sentiment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(Error::NotFound(format!("unknown sentiment: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Rss,
    Api,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(default)]
    pub kind: SourceKind,
    pub feed_url: Option<String>,
}

impl Source {
    pub fn rss(name: impl Into<String>, feed_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Rss,
            feed_url: Some(feed_url.into()),
        }
    }
}

/// Six credibility signals on a 0-100 scale and their weighted total.
///
/// Fields are read-only so `overall` always matches its components; stored
/// scores are rebuilt through [`TrustScore::new`] when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TrustComponents")]
pub struct TrustScore {
    source_reputation: u8,
    content_quality: u8,
    author_expertise: u8,
    recency: u8,
    consensus: u8,
    citation_references: u8,
    overall: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrustComponents {
    source_reputation: u8,
    content_quality: u8,
    author_expertise: u8,
    recency: u8,
    consensus: u8,
    citation_references: u8,
}

impl From<TrustComponents> for TrustScore {
    fn from(c: TrustComponents) -> Self {
        Self::new(
            c.source_reputation,
            c.content_quality,
            c.author_expertise,
            c.recency,
            c.consensus,
            c.citation_references,
        )
    }
}

impl TrustScore {
    /// Builds a score from its components; `overall` is always derived here.
    pub fn new(
        source_reputation: u8,
        content_quality: u8,
        author_expertise: u8,
        recency: u8,
        consensus: u8,
        citation_references: u8,
    ) -> Self {
        let components = [
            source_reputation,
            content_quality,
            author_expertise,
            recency,
            consensus,
            citation_references,
        ];
        let weighted: f64 = components
            .iter()
            .zip(TRUST_WEIGHTS.iter())
            .map(|(c, w)| f64::from((*c).min(100)) * w)
            .sum();
        Self {
            source_reputation: source_reputation.min(100),
            content_quality: content_quality.min(100),
            author_expertise: author_expertise.min(100),
            recency: recency.min(100),
            consensus: consensus.min(100),
            citation_references: citation_references.min(100),
            overall: weighted.round().clamp(0.0, 100.0) as u8,
        }
    }

    /// Every component set to `score`, so `overall == score`.
    pub fn uniform(score: u8) -> Self {
        Self::new(score, score, score, score, score, score)
    }

    pub fn source_reputation(&self) -> u8 {
        self.source_reputation
    }

    pub fn content_quality(&self) -> u8 {
        self.content_quality
    }

    pub fn author_expertise(&self) -> u8 {
        self.author_expertise
    }

    pub fn recency(&self) -> u8 {
        self.recency
    }

    pub fn consensus(&self) -> u8 {
        self.consensus
    }

    pub fn citation_references(&self) -> u8 {
        self.citation_references
    }

    pub fn overall(&self) -> u8 {
        self.overall
    }

    /// Overall score as a fraction in `[0, 1]`.
    pub fn normalized(&self) -> f64 {
        (f64::from(self.overall) / 100.0).clamp(0.0, 1.0)
    }
}

impl Default for TrustScore {
    fn default() -> Self {
        Self::new(50, 50, 50, 50, 50, 50)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CredibilityEvaluation {
    pub quality: u8,
    pub author_expertise: u8,
    pub citations: u8,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub sentiment: Sentiment,
}

impl Insights {
    pub const MAX_KEY_INSIGHTS: usize = 4;
    pub const MAX_RISK_FACTORS: usize = 3;
    pub const MAX_OPPORTUNITIES: usize = 3;

    /// Trims every list to its documented maximum.
    pub fn capped(mut self) -> Self {
        self.key_insights.truncate(Self::MAX_KEY_INSIGHTS);
        self.risk_factors.truncate(Self::MAX_RISK_FACTORS);
        self.opportunities.truncate(Self::MAX_OPPORTUNITIES);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArticleIntelligence {
    pub credibility: Option<CredibilityEvaluation>,
    #[serde(flatten)]
    pub insights: Insights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Engagement {
    pub views: u64,
    pub saves: u64,
    pub shares: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    View,
    Save,
    Share,
}

impl Engagement {
    pub fn increment(&mut self, kind: EngagementKind) {
        match kind {
            EngagementKind::View => self.views += 1,
            EngagementKind::Save => self.saves += 1,
            EngagementKind::Share => self.shares += 1,
        }
    }
}

impl FromStr for EngagementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" | "views" => Ok(EngagementKind::View),
            "save" | "saves" => Ok(EngagementKind::Save),
            "share" | "shares" => Ok(EngagementKind::Share),
            other => Err(Error::NotFound(format!("unknown engagement kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Classification {
    pub category: Category,
    pub tags: Vec<String>,
    pub companies: Vec<String>,
    pub industries: Vec<String>,
}

/// A feed item before classification, scoring and enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub url: String,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    /// Missing dates are replaced by the ingestion time.
    pub published_at: Option<DateTime<Utc>>,
    pub source: Source,
    pub source_categories: Vec<String>,
}

impl ArticleDraft {
    pub fn canonical_url(&self) -> String {
        canonical_url(&self.url)
    }

    pub fn into_article(self, enrichment: Enrichment, ingested_at: DateTime<Utc>) -> Article {
        Article {
            id: ArticleId::new(),
            url: canonical_url(&self.url),
            title: self.title.trim().to_string(),
            content: cap_content(&self.content),
            summary: enrichment.summary,
            source: self.source,
            author: self.author,
            published_at: self.published_at.unwrap_or(ingested_at),
            ingested_at,
            category: enrichment.classification.category,
            tags: enrichment.classification.tags,
            companies: enrichment.classification.companies,
            industries: enrichment.classification.industries,
            trust: enrichment.trust,
            intelligence: enrichment.intelligence,
            embedding: enrichment.embedding,
            engagement: Engagement::default(),
            is_active: true,
            is_featured: false,
            is_verified: false,
            duplicate_of: None,
        }
    }
}

/// Everything the pipeline computes for a draft before it is stored.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub classification: Classification,
    pub trust: TrustScore,
    pub summary: Option<String>,
    pub intelligence: ArticleIntelligence,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: ArticleId,
    pub url: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub source: Source,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub category: Category,
    pub tags: Vec<String>,
    pub companies: Vec<String>,
    pub industries: Vec<String>,
    pub trust: TrustScore,
    pub intelligence: ArticleIntelligence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub engagement: Engagement,
    pub is_active: bool,
    pub is_featured: bool,
    pub is_verified: bool,
    pub duplicate_of: Option<ArticleId>,
}

impl Article {
    /// Retires this article in favour of `canonical`.
    pub fn mark_duplicate_of(&mut self, canonical: ArticleId) {
        self.is_active = false;
        self.duplicate_of = Some(canonical);
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().map_or(false, |e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_weights_sum_to_one() {
        let sum: f64 = TRUST_WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_overall_is_rounded_weighted_sum() {
        let score = TrustScore::new(90, 80, 70, 100, 50, 40);
        // 27 + 16 + 10.5 + 15 + 5 + 4 = 77.5
        assert_eq!(score.overall, 78);

        let low = TrustScore::new(0, 0, 0, 0, 0, 0);
        assert_eq!(low.overall, 0);
        let high = TrustScore::new(100, 100, 100, 100, 100, 100);
        assert_eq!(high.overall, 100);
    }

    #[test]
    fn test_deserialized_overall_is_recomputed() {
        let json = r#"{"sourceReputation":90,"contentQuality":80,"authorExpertise":70,
            "recency":100,"consensus":50,"citationReferences":40,"overall":3}"#;
        let score: TrustScore = serde_json::from_str(json).unwrap();
        assert_eq!(score.overall(), 78);
        assert_eq!(score, TrustScore::new(90, 80, 70, 100, 50, 40));

        let encoded = serde_json::to_string(&TrustScore::uniform(64)).unwrap();
        let roundtrip: TrustScore = serde_json::from_str(&encoded).unwrap();
        assert_eq!(roundtrip.overall(), 64);
    }

    #[test]
    fn test_canonical_url_lowercases_and_trims() {
        assert_eq!(canonical_url("  HTTPS://Example.com/A "), "https://example.com/a");
    }

    #[test]
    fn test_cap_content_counts_chars() {
        let long = "é".repeat(MAX_CONTENT_CHARS + 5);
        assert_eq!(cap_content(&long).chars().count(), MAX_CONTENT_CHARS);
        assert_eq!(cap_content("short"), "short");
    }

    #[test]
    fn test_mark_duplicate_deactivates() {
        let draft = ArticleDraft {
            url: "http://a.com/1".to_string(),
            title: "Title".to_string(),
            content: "Body".to_string(),
            author: None,
            published_at: None,
            source: Source::rss("Reuters", "http://a.com/feed"),
            source_categories: vec![],
        };
        let now = Utc::now();
        let mut article = draft.into_article(Enrichment::default(), now);
        assert!(article.is_active);
        assert_eq!(article.published_at, now);

        let canonical = ArticleId::new();
        article.mark_duplicate_of(canonical);
        assert!(!article.is_active);
        assert_eq!(article.duplicate_of, Some(canonical));
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("sports".parse::<Category>().is_err());
    }
}
