pub mod hybrid;
pub mod merge;

pub use hybrid::{
    Answer, HybridSearchEngine, SearchOptions, SearchResults, DEFAULT_TRENDING_DAYS,
    HIGH_TRUST_MIN, MAX_TRENDING_DAYS, TRENDING_MIN_TRUST,
};
pub use merge::{merge_results, ScoreWeights, ScoredArticle};

pub mod prelude {
    pub use super::{HybridSearchEngine, SearchOptions, SearchResults};
    pub use nt_core::{Error, Result, SearchFilters};
}
