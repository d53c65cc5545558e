use std::fmt;

use async_trait::async_trait;
use nt_core::{
    Article, CredibilityEvaluation, Insights, QueryAnswer, Result, Sentiment, TextIntelligence,
    EMBEDDING_DIMENSION,
};

const POSITIVE_WORDS: &[&str] = &[
    "growth", "gain", "gains", "record", "beat", "beats", "surge", "launch", "launches", "profit",
    "expands", "wins", "breakthrough", "raises", "partnership",
];
const NEGATIVE_WORDS: &[&str] = &[
    "loss", "losses", "decline", "falls", "lawsuit", "layoffs", "recall", "breach", "fraud",
    "crash", "cuts", "investigation", "fine", "bankruptcy", "warning",
];
const CITATION_MARKERS: &[&str] = &["according to", "said", "reported", "study", "data", "%"];

/// Deterministic heuristics standing in for a hosted model.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

fn sentences(text: &str) -> Vec<String> {
    text.split(|c| c == '.' || c == '!' || c == '?')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{}.", s))
        .collect()
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

// FNV-1a, stable across runs and platforms.
fn bucket(word: &str) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % EMBEDDING_DIMENSION as u64) as usize
}

fn score_from(count: usize, base: usize, step: usize) -> u8 {
    (base + count * step).min(100) as u8
}

#[async_trait]
impl TextIntelligence for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn summarize(&self, _title: &str, content: &str) -> Result<String> {
        let summary = sentences(content).into_iter().take(3).collect::<Vec<_>>().join(" ");
        tracing::debug!("Generated summary from content: {}", summary);
        Ok(summary)
    }

    async fn evaluate_credibility(
        &self,
        title: &str,
        content: &str,
    ) -> Result<CredibilityEvaluation> {
        let lower = content.to_lowercase();
        let word_count = content.split_whitespace().count();
        let citations = CITATION_MARKERS.iter().map(|m| lower.matches(m).count()).sum::<usize>();

        let mut warnings = Vec::new();
        if word_count < 50 {
            warnings.push("very short article".to_string());
        }
        if title.chars().filter(|c| c.is_uppercase()).count() > title.chars().count() / 2 + 1 {
            warnings.push("sensational headline".to_string());
        }

        Ok(CredibilityEvaluation {
            quality: score_from(word_count / 50, 40, 10),
            author_expertise: 50,
            citations: score_from(citations, 30, 10),
            warnings,
        })
    }

    async fn generate_insights(&self, _title: &str, content: &str) -> Result<Insights> {
        let mut positive = 0usize;
        let mut negative = 0usize;
        for word in words(content) {
            if POSITIVE_WORDS.contains(&word.as_str()) {
                positive += 1;
            } else if NEGATIVE_WORDS.contains(&word.as_str()) {
                negative += 1;
            }
        }
        let sentiment = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        };

        let all = sentences(content);
        let pick = |markers: &[&str]| -> Vec<String> {
            all.iter()
                .filter(|s| {
                    let s = s.to_lowercase();
                    markers.iter().any(|m| s.contains(m))
                })
                .cloned()
                .collect()
        };

        Ok(Insights {
            key_insights: all.iter().take(Insights::MAX_KEY_INSIGHTS).cloned().collect(),
            risk_factors: pick(NEGATIVE_WORDS),
            opportunities: pick(POSITIVE_WORDS),
            sentiment,
        }
        .capped())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; EMBEDDING_DIMENSION];
        for word in words(text) {
            embedding[bucket(&word)] += 1.0;
        }
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        Ok(embedding)
    }

    async fn answer_query(&self, query: &str, articles: &[Article]) -> Result<QueryAnswer> {
        let used: Vec<&Article> = articles.iter().take(3).collect();
        if used.is_empty() {
            return Ok(QueryAnswer {
                answer: format!("No articles found for \"{}\".", query),
                articles_used: Vec::new(),
            });
        }
        let answer = used
            .iter()
            .map(|a| match &a.summary {
                Some(summary) if !summary.is_empty() => format!("{}: {}", a.title, summary),
                _ => a.title.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(QueryAnswer {
            answer,
            articles_used: used.iter().map(|a| a.id).collect(),
        })
    }
}
