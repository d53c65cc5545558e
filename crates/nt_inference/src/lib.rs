use std::time::Duration;

pub mod embeddings;
pub mod models;
pub mod resilient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ModelKind {
    /// Offline heuristics, no network access
    #[default]
    Dummy,
    /// Any OpenAI-compatible chat/embeddings endpoint
    Openai,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub model: ModelKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Dummy,
            api_key: None,
            base_url: None,
            chat_model: None,
            embedding_model: None,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

pub mod prelude {
    pub use super::embeddings::EmbeddingGenerator;
    pub use super::models::create_model;
    pub use super::resilient::ResilientModel;
    pub use super::{InferenceConfig, ModelKind};
    pub use nt_core::{Error, Result, TextIntelligence};
}

pub use models::create_model;
