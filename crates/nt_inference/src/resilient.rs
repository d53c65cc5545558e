use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nt_core::{
    Article, CredibilityEvaluation, Error, Insights, QueryAnswer, Result, TextIntelligence,
};
use tracing::warn;

/// Adds a per-call timeout and bounded retries with exponential backoff to
/// any [`TextIntelligence`] implementation. The call contract is unchanged:
/// the last error is returned once retries are exhausted.
pub struct ResilientModel {
    inner: Arc<dyn TextIntelligence>,
    timeout: Duration,
    max_retries: u32,
    initial_backoff: Duration,
}

impl ResilientModel {
    pub fn new(
        inner: Arc<dyn TextIntelligence>,
        timeout: Duration,
        max_retries: u32,
        initial_backoff: Duration,
    ) -> Self {
        Self {
            inner,
            timeout,
            max_retries,
            initial_backoff,
        }
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            let error = match tokio::time::timeout(self.timeout, f()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout(self.timeout),
            };
            if attempt >= self.max_retries {
                return Err(error);
            }
            let backoff = self.initial_backoff * 2u32.saturating_pow(attempt);
            warn!(
                model = self.inner.name(),
                operation,
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "inference call failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

impl fmt::Debug for ResilientModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientModel")
            .field("inner", &self.inner)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[async_trait]
impl TextIntelligence for ResilientModel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn summarize(&self, title: &str, content: &str) -> Result<String> {
        self.call("summarize", || self.inner.summarize(title, content)).await
    }

    async fn evaluate_credibility(
        &self,
        title: &str,
        content: &str,
    ) -> Result<CredibilityEvaluation> {
        self.call("evaluate_credibility", || self.inner.evaluate_credibility(title, content))
            .await
    }

    async fn generate_insights(&self, title: &str, content: &str) -> Result<Insights> {
        self.call("generate_insights", || self.inner.generate_insights(title, content))
            .await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.call("embed", || self.inner.embed(text)).await
    }

    async fn answer_query(&self, query: &str, articles: &[Article]) -> Result<QueryAnswer> {
        self.call("answer_query", || self.inner.answer_query(query, articles)).await
    }
}
