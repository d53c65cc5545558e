use std::sync::Arc;

use nt_core::{TextIntelligence, EMBEDDING_DIMENSION};

/// Builds the text that represents an article in embedding space and turns
/// it into a vector, never failing.
pub struct EmbeddingGenerator {
    model: Arc<dyn TextIntelligence>,
}

impl EmbeddingGenerator {
    pub fn new(model: Arc<dyn TextIntelligence>) -> Self {
        Self { model }
    }

    pub fn article_text(title: &str, summary: Option<&str>, content: &str) -> String {
        let mut text = title.to_string();
        if let Some(summary) = summary.filter(|s| !s.is_empty()) {
            text.push_str("\n\n");
            text.push_str(summary);
        }
        text.push_str("\n\n");
        text.extend(content.chars().take(2_000));
        text
    }

    /// Returns `None` when the service only produced the zero-vector
    /// fallback, so the article is stored without an embedding.
    pub async fn generate_article_embedding(
        &self,
        title: &str,
        summary: Option<&str>,
        content: &str,
    ) -> Option<Vec<f32>> {
        let text = Self::article_text(title, summary, content);
        let embedding = self.model.embed_or_zero(&text).await;
        if embedding.iter().all(|x| *x == 0.0) {
            None
        } else {
            Some(embedding)
        }
    }

    pub async fn generate_text_embedding(&self, text: &str) -> Vec<f32> {
        self.model.embed_or_zero(text).await
    }

    pub fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}
