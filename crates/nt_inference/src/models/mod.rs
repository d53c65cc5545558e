use std::sync::Arc;

use nt_core::{Result, TextIntelligence};
use tracing::info;

use crate::resilient::ResilientModel;
use crate::{InferenceConfig, ModelKind};

pub mod dummy;
pub mod openai;

pub use dummy::DummyModel;
pub use openai::OpenAiModel;

/// Build the configured model, wrapped with timeouts and retries.
pub async fn create_model(config: Option<InferenceConfig>) -> Result<Arc<dyn TextIntelligence>> {
    let config = config.unwrap_or_default();
    let inner: Arc<dyn TextIntelligence> = match config.model {
        ModelKind::Dummy => Arc::new(DummyModel::new()),
        ModelKind::Openai => Arc::new(OpenAiModel::new(&config)?),
    };
    info!(
        model = inner.name(),
        timeout_secs = config.timeout.as_secs(),
        retries = config.max_retries,
        "🧠 inference model ready"
    );
    Ok(Arc::new(ResilientModel::new(
        inner,
        config.timeout,
        config.max_retries,
        config.initial_backoff,
    )))
}
