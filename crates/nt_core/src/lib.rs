pub mod error;
pub mod models;
pub mod query;
pub mod storage;
pub mod types;
pub mod vector;

pub use error::{Error, Result};
pub use models::{QueryAnswer, TextIntelligence};
pub use query::{days_before, lexical_score, ArticleQuery, Overlap, SearchFilters, SortKey};
pub use storage::{ArticleStore, SuggestionTerms};
pub use types::*;
pub use vector::{cosine_similarity, EMBEDDING_DIMENSION};
