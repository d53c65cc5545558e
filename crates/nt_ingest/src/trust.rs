use chrono::{DateTime, Utc};
use nt_core::{CredibilityEvaluation, TrustScore};

const DEFAULT_COMPONENT: u8 = 50;
/// Placeholder until cross-source corroboration exists.
const CONSENSUS_SCORE: u8 = 50;
const RECENCY_DECAY_PER_DAY: f64 = 3.0;

const SOURCE_REPUTATION: &[(&str, u8)] = &[
    ("Reuters", 95),
    ("Associated Press", 95),
    ("Bloomberg", 90),
    ("Financial Times", 90),
    ("The Wall Street Journal", 90),
    ("BBC News", 88),
    ("The Economist", 88),
    ("CNBC", 80),
    ("Ars Technica", 80),
    ("Wired", 78),
    ("TechCrunch", 75),
    ("The Verge", 75),
    ("VentureBeat", 70),
    ("Business Insider", 65),
    ("Hacker News", 60),
];

/// Linear decay of 3 points per day since publication, clamped to `[0, 100]`
/// so future-dated articles cap at 100.
pub fn recency_score(published_at: DateTime<Utc>, now: DateTime<Utc>) -> u8 {
    let days = (now - published_at).num_seconds() as f64 / 86_400.0;
    (100.0 - RECENCY_DECAY_PER_DAY * days).clamp(0.0, 100.0).round() as u8
}

#[derive(Debug, Clone)]
pub struct TrustScorer {
    reputation: Vec<(String, u8)>,
}

impl Default for TrustScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustScorer {
    pub fn new() -> Self {
        Self {
            reputation: SOURCE_REPUTATION
                .iter()
                .map(|(name, score)| (name.to_string(), *score))
                .collect(),
        }
    }

    /// Adds or overrides the reputation of one source.
    pub fn with_reputation(mut self, source: &str, score: u8) -> Self {
        self.reputation.retain(|(name, _)| !name.eq_ignore_ascii_case(source));
        self.reputation.push((source.to_string(), score.min(100)));
        self
    }

    pub fn source_reputation(&self, source: &str) -> u8 {
        self.reputation
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(source.trim()))
            .map(|(_, score)| *score)
            .unwrap_or(DEFAULT_COMPONENT)
    }

    pub fn score(
        &self,
        source: &str,
        credibility: Option<&CredibilityEvaluation>,
        published_at: DateTime<Utc>,
    ) -> TrustScore {
        self.score_at(source, credibility, published_at, Utc::now())
    }

    pub fn score_at(
        &self,
        source: &str,
        credibility: Option<&CredibilityEvaluation>,
        published_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> TrustScore {
        let (quality, expertise, citations) = credibility
            .map(|c| (c.quality, c.author_expertise, c.citations))
            .unwrap_or((DEFAULT_COMPONENT, DEFAULT_COMPONENT, DEFAULT_COMPONENT));

        TrustScore::new(
            self.source_reputation(source),
            quality,
            expertise,
            recency_score(published_at, now),
            CONSENSUS_SCORE,
            citations,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_recency_bounds() {
        let now = Utc::now();
        assert_eq!(recency_score(now, now), 100);
        assert_eq!(recency_score(now - Duration::days(34), now), 0);
        assert_eq!(recency_score(now - Duration::days(400), now), 0);
        assert_eq!(recency_score(now + Duration::days(5), now), 100);
        assert_eq!(recency_score(now - Duration::days(10), now), 70);
    }

    #[test]
    fn test_recency_is_monotone() {
        let now = Utc::now();
        let mut previous = 100;
        for hours in 0..(40 * 24) {
            let score = recency_score(now - Duration::hours(hours), now);
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn test_defaults_without_evaluation() {
        let scorer = TrustScorer::new();
        let now = Utc::now();
        let score = scorer.score_at("Unknown Blog", None, now, now);
        assert_eq!(score.source_reputation(), 50);
        assert_eq!(score.content_quality(), 50);
        assert_eq!(score.author_expertise(), 50);
        assert_eq!(score.citation_references(), 50);
        assert_eq!(score.consensus(), 50);
        assert_eq!(score.recency(), 100);
        // 15 + 10 + 7.5 + 15 + 5 + 5
        assert_eq!(score.overall(), 58);
    }

    #[test]
    fn test_uses_reputation_and_evaluation() {
        let scorer = TrustScorer::new();
        let now = Utc::now();
        let eval = CredibilityEvaluation {
            quality: 90,
            author_expertise: 80,
            citations: 70,
            warnings: vec![],
        };
        let score = scorer.score_at("reuters", Some(&eval), now - Duration::days(34), now);
        assert_eq!(score.source_reputation(), 95);
        assert_eq!(score.recency(), 0);
        // 28.5 + 18 + 12 + 0 + 5 + 7 = 70.5
        assert_eq!(score.overall(), 71);
        assert!(score.overall() <= 100);
    }

    #[test]
    fn test_with_reputation_overrides() {
        let scorer = TrustScorer::new().with_reputation("TechCrunch", 40);
        assert_eq!(scorer.source_reputation("techcrunch"), 40);
    }
}
