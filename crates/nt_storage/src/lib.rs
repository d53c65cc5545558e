use async_trait::async_trait;
use nt_core::{ArticleStore, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn connect(config: &StorageConfig) -> Result<Self>
    where
        Self: Sized;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            db_path: PathBuf::from("articles.db"),
        }
    }
}

/// Open the configured article store.
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn ArticleStore>> {
    match config.kind {
        StorageKind::Memory => Ok(Arc::new(InMemoryStorage::connect(config).await?)),
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => Ok(Arc::new(SQLiteStorage::connect(config).await?)),
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => Err(nt_core::Error::Storage(
            "nt_storage was built without the `sqlite` feature".to_string(),
        )),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageConfig, StorageKind};
}
