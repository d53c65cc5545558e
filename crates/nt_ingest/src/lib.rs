pub mod classifier;
pub mod cli;
pub mod dedup;
pub mod feeds;
pub mod logging;
pub mod orchestrator;
pub mod schedule;
pub mod trust;

pub use classifier::ContentClassifier;
pub use cli::{handle_command, print_report, FeedArgs, FeedCommands};
pub use dedup::{mark_duplicates, title_similarity, DedupEngine, DedupReport, DuplicateMark};
pub use feeds::{default_feeds, html_to_text, load_feeds, FeedFetcher, FeedSource, HttpFeedFetcher};
pub use logging::{init_logging, Logger};
pub use orchestrator::{
    FeedReport, IngestConfig, IngestionReport, IngestionStatus, Ingestor, ItemOutcome, ItemReport,
    Trigger,
};
pub use schedule::{next_scheduled_run, Scheduler, SCHEDULE_HOURS_UTC};
pub use trust::TrustScorer;

pub mod prelude {
    pub use super::feeds::{FeedFetcher, FeedSource};
    pub use super::orchestrator::{Ingestor, Trigger};
    pub use nt_core::{Article, ArticleDraft, Error, Result};
}
