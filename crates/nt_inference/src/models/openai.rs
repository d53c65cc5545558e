use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use nt_core::{
    cap_content, Article, ArticleId, CredibilityEvaluation, Error, Insights, QueryAnswer, Result,
    TextIntelligence,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::InferenceConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
// Prompts only carry the head of long articles.
const PROMPT_CONTENT_CHARS: usize = 4_000;

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    input: String,
    model: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct AnswerPayload {
    answer: String,
    #[serde(default, rename = "articlesUsed")]
    articles_used: Vec<usize>,
}

/// Client for OpenAI-compatible chat completion and embedding endpoints.
pub struct OpenAiModel {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

impl OpenAiModel {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Inference("OpenAI API key is required".to_string()))?;
        let base_url = config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            client: Arc::new(Client::new()),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone().unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: config
                .embedding_model
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
        })
    }

    async fn chat(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Inference("empty chat completion".to_string()))
    }

    async fn chat_json<T: DeserializeOwned>(&self, prompt: String) -> Result<T> {
        let raw = self.chat(prompt).await?;
        Ok(serde_json::from_str(strip_code_fence(&raw))?)
    }
}

/// Models often wrap JSON answers in markdown fences.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

fn article_block(title: &str, content: &str) -> String {
    let excerpt: String = cap_content(content)
        .chars()
        .take(PROMPT_CONTENT_CHARS)
        .collect();
    format!("Title: {}\n\nContent: {}", title, excerpt)
}

impl fmt::Debug for OpenAiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .finish()
    }
}

#[async_trait]
impl TextIntelligence for OpenAiModel {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn summarize(&self, title: &str, content: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the following news article in 2-3 sentences.\n\n{}\n\nSummary:",
            article_block(title, content)
        );
        Ok(self.chat(prompt).await?.trim().to_string())
    }

    async fn evaluate_credibility(
        &self,
        title: &str,
        content: &str,
    ) -> Result<CredibilityEvaluation> {
        let prompt = format!(
            "Rate the credibility of this news article. Reply with JSON only: \
             {{\"quality\": 0-100, \"authorExpertise\": 0-100, \"citations\": 0-100, \
             \"warnings\": [string]}}.\n\n{}",
            article_block(title, content)
        );
        let mut evaluation: CredibilityEvaluation = self.chat_json(prompt).await?;
        evaluation.quality = evaluation.quality.min(100);
        evaluation.author_expertise = evaluation.author_expertise.min(100);
        evaluation.citations = evaluation.citations.min(100);
        Ok(evaluation)
    }

    async fn generate_insights(&self, title: &str, content: &str) -> Result<Insights> {
        let prompt = format!(
            "Extract business insights from this article. Reply with JSON only: \
             {{\"keyInsights\": [max 4 strings], \"riskFactors\": [max 3 strings], \
             \"opportunities\": [max 3 strings], \"sentiment\": \"positive\"|\"neutral\"|\"negative\"}}.\n\n{}",
            article_block(title, content)
        );
        let insights: Insights = self.chat_json(prompt).await?;
        Ok(insights.capped())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            input: text.chars().take(PROMPT_CONTENT_CHARS * 2).collect(),
            model: self.embedding_model.clone(),
            dimensions: nt_core::EMBEDDING_DIMENSION,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbeddingResponse>()
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Inference("empty embedding response".to_string()))
    }

    async fn answer_query(&self, query: &str, articles: &[Article]) -> Result<QueryAnswer> {
        let context = articles
            .iter()
            .enumerate()
            .map(|(i, a)| {
                format!(
                    "[{}] {} ({})\n{}",
                    i,
                    a.title,
                    a.source.name,
                    a.summary.as_deref().unwrap_or(&a.content).chars().take(800).collect::<String>()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Answer the question using only the articles below. Reply with JSON only: \
             {{\"answer\": string, \"articlesUsed\": [article numbers]}}.\n\n\
             Question: {}\n\nArticles:\n{}",
            query, context
        );
        let payload: AnswerPayload = self.chat_json(prompt).await?;
        let articles_used: Vec<ArticleId> = payload
            .articles_used
            .into_iter()
            .filter_map(|i| articles.get(i).map(|a| a.id))
            .collect();
        Ok(QueryAnswer {
            answer: payload.answer,
            articles_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_requires_api_key() {
        let result = OpenAiModel::new(&InferenceConfig::default());
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Inference error: OpenAI API key is required"
        );

        let config = InferenceConfig {
            api_key: Some("test-key".to_string()),
            ..InferenceConfig::default()
        };
        assert!(OpenAiModel::new(&config).is_ok());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parses_credibility_payload() {
        let parsed: CredibilityEvaluation = serde_json::from_str(strip_code_fence(
            "```\n{\"quality\": 80, \"authorExpertise\": 60, \"citations\": 40}\n```",
        ))
        .unwrap();
        assert_eq!(parsed.quality, 80);
        assert_eq!(parsed.author_expertise, 60);
        assert!(parsed.warnings.is_empty());
    }
}
