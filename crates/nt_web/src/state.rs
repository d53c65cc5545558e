use std::sync::Arc;

use nt_ingest::Ingestor;
use nt_search::HybridSearchEngine;

pub struct AppState {
    pub search: Arc<HybridSearchEngine>,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    pub fn new(search: Arc<HybridSearchEngine>, ingestor: Arc<Ingestor>) -> Self {
        Self { search, ingestor }
    }
}
