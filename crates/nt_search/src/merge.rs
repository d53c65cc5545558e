use std::collections::HashMap;

use nt_core::{Article, ArticleId};
use serde::Serialize;

/// Weights applied to each ranking signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub keyword: f64,
    pub semantic: f64,
    pub trust: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            keyword: 0.35,
            semantic: 0.4,
            trust: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredArticle {
    pub article: Article,
    pub keyword_score: f64,
    pub semantic_score: f64,
    pub trust_score: f64,
    pub final_score: f64,
}

/// Combine keyword and semantic candidates into one ranking.
///
/// Keyword candidates are scored by rank (`1 - rank/N`), semantic ones by
/// their raw cosine similarity. Every candidate also gets its trust term.
/// Ties keep first-seen order, keyword candidates before semantic-only ones.
pub fn merge_results(
    keyword: Vec<Article>,
    semantic: Vec<(Article, f64)>,
    weights: ScoreWeights,
) -> Vec<ScoredArticle> {
    let mut merged: Vec<ScoredArticle> = Vec::with_capacity(keyword.len() + semantic.len());
    let mut index: HashMap<ArticleId, usize> = HashMap::new();

    let total = keyword.len() as f64;
    for (rank, article) in keyword.into_iter().enumerate() {
        let keyword_score = (1.0 - rank as f64 / total) * weights.keyword;
        if index.contains_key(&article.id) {
            continue;
        }
        index.insert(article.id, merged.len());
        merged.push(ScoredArticle {
            article,
            keyword_score,
            semantic_score: 0.0,
            trust_score: 0.0,
            final_score: 0.0,
        });
    }

    for (article, similarity) in semantic {
        let semantic_score = similarity * weights.semantic;
        match index.get(&article.id) {
            Some(&i) => merged[i].semantic_score = semantic_score,
            None => {
                index.insert(article.id, merged.len());
                merged.push(ScoredArticle {
                    article,
                    keyword_score: 0.0,
                    semantic_score,
                    trust_score: 0.0,
                    final_score: 0.0,
                });
            }
        }
    }

    for scored in &mut merged {
        scored.trust_score = scored.article.trust.normalized().clamp(0.0, 1.0) * weights.trust;
        scored.final_score = scored.keyword_score + scored.semantic_score + scored.trust_score;
    }

    merged.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    merged
}
