use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Article, ArticleId, CredibilityEvaluation, Insights};
use crate::vector::EMBEDDING_DIMENSION;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnswer {
    pub answer: String,
    pub articles_used: Vec<ArticleId>,
}

/// Hosted language-model operations used by ingestion and search.
///
/// Every call is fallible. Callers substitute documented defaults instead of
/// propagating failures.
#[async_trait]
pub trait TextIntelligence: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Summarize an article body
    async fn summarize(&self, title: &str, content: &str) -> Result<String>;

    async fn evaluate_credibility(
        &self,
        title: &str,
        content: &str,
    ) -> Result<CredibilityEvaluation>;

    async fn generate_insights(&self, title: &str, content: &str) -> Result<Insights>;

    /// Generate an embedding for a piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Answer a question from the given articles
    async fn answer_query(&self, query: &str, articles: &[Article]) -> Result<QueryAnswer>;

    /// Like [`embed`](Self::embed), but yields a zero vector of the corpus
    /// dimension when the service fails.
    async fn embed_or_zero(&self, text: &str) -> Vec<f32> {
        match self.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(
                    model = self.name(),
                    error = %e,
                    "embedding failed, using zero vector"
                );
                vec![0.0; EMBEDDING_DIMENSION]
            }
        }
    }
}
