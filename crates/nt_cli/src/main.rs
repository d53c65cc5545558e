use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use nt_inference::{create_model, InferenceConfig, ModelKind};
use nt_ingest::{
    default_feeds, handle_command, init_logging, load_feeds, FeedArgs, FeedCommands,
    HttpFeedFetcher, IngestConfig, Ingestor, Scheduler,
};
use nt_search::{HybridSearchEngine, SearchOptions};
use nt_storage::{create_storage, StorageConfig, StorageKind};
use nt_web::AppState;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    'd' => total_seconds += num * 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                }
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // bare numbers are seconds
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds += num;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "News ingestion, trust scoring and hybrid search",
    long_about = None
)]
struct Cli {
    /// Article store backend
    #[arg(long, env = "NT_STORAGE", value_enum, default_value_t = StorageKind::Memory)]
    storage: StorageKind,
    /// SQLite database file, used with `--storage sqlite`
    #[arg(long, env = "NT_DB_PATH", default_value = "articles.db")]
    db_path: PathBuf,
    /// Text intelligence backend
    #[arg(long, env = "NT_MODEL", value_enum, default_value_t = ModelKind::Dummy)]
    model: ModelKind,
    #[arg(long, env = "NT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "NT_MODEL_URL")]
    model_url: Option<String>,
    /// Per-call timeout for the intelligence service (e.g. 30s, 1m)
    #[arg(long, default_value = "30s")]
    model_timeout: HumanDuration,
    /// JSON file with the feed list; the built-in list is used otherwise
    #[arg(long, env = "NT_FEEDS_FILE")]
    feeds_file: Option<PathBuf>,
    /// Delete non-featured articles published more than this many days ago
    #[arg(long, default_value_t = 90)]
    retention_days: i64,
    /// Delay before the first scheduled ingestion (e.g. 10s, 2m)
    #[arg(long, default_value = "10s")]
    startup_delay: HumanDuration,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API and run the ingestion scheduler
    Serve {
        #[arg(long, env = "NT_BIND", default_value = "0.0.0.0:3000")]
        bind: SocketAddr,
        /// Serve only; ingestion runs on manual trigger
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Run the ingestion pipeline once
    Ingest {
        #[arg(short, long)]
        verbose: bool,
    },
    /// Run the ingestion scheduler in the foreground
    Schedule,
    /// Hybrid search over stored articles
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        min_trust: u8,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Inspect configured feeds
    Feeds {
        #[command(subcommand)]
        command: Option<FeedCommands>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = init_logging();
    let cli = Cli::parse();

    let storage = create_storage(&StorageConfig {
        kind: cli.storage,
        db_path: cli.db_path.clone(),
    })
    .await?;
    logger.info(&format!("💾 Storage initialized (using {:?})", cli.storage));

    let inference = create_model(Some(InferenceConfig {
        model: cli.model,
        api_key: cli.api_key.clone(),
        base_url: cli.model_url.clone(),
        timeout: cli.model_timeout.0,
        ..InferenceConfig::default()
    }))
    .await?;
    logger.info(&format!("🧠 Inference model initialized (using {})", inference.name()));

    let feeds = match &cli.feeds_file {
        Some(path) => load_feeds(path)?,
        None => default_feeds(),
    };
    let feed_names: Vec<&str> = feeds.iter().map(|f| f.name.as_str()).collect();
    logger.info(&format!("📡 Feeds configured: {}", feed_names.join(", ")));

    let ingestor = Arc::new(Ingestor::new(
        storage.clone(),
        inference.clone(),
        Arc::new(HttpFeedFetcher::new()?),
        feeds,
        IngestConfig {
            retention_days: cli.retention_days,
            startup_delay: cli.startup_delay.0,
        },
    ));

    match cli.command {
        Commands::Serve { bind, no_scheduler } => {
            let _scheduler = (!no_scheduler).then(|| Scheduler::new(ingestor.clone()).spawn());
            let search = Arc::new(HybridSearchEngine::new(storage, inference));
            nt_web::serve(AppState::new(search, ingestor), bind).await?;
        }
        Commands::Ingest { verbose } => {
            let args = FeedArgs {
                command: FeedCommands::Ingest { verbose },
            };
            handle_command(args, &ingestor).await?;
        }
        Commands::Schedule => {
            info!("⏰ Running scheduler in the foreground");
            Scheduler::new(ingestor).spawn().await?;
        }
        Commands::Search {
            query,
            limit,
            min_trust,
            json,
        } => {
            let engine = HybridSearchEngine::new(storage, inference);
            let options = SearchOptions {
                limit,
                min_trust,
                ..SearchOptions::default()
            };
            let results = engine.search(&query, &options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("Found {} articles", results.total);
                for scored in &results.results {
                    println!(
                        "{:.3}  [{}] {} - {} (trust {})",
                        scored.final_score,
                        scored.article.category,
                        scored.article.title,
                        scored.article.source.name,
                        scored.article.trust.overall()
                    );
                }
                if let Some(trending) = &results.trending {
                    println!("Trending:");
                    for article in trending {
                        println!("  🔥 {} - {}", article.title, article.source.name);
                    }
                }
            }
        }
        Commands::Feeds { command } => {
            let args = FeedArgs {
                command: command.unwrap_or(FeedCommands::List),
            };
            handle_command(args, &ingestor).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_human_duration() {
        assert_eq!("10s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(10));
        assert_eq!("1h15m30s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(4530));
        assert_eq!("45".parse::<HumanDuration>().unwrap().0, Duration::from_secs(45));
        assert!("".parse::<HumanDuration>().is_err());
        assert!("5x".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "nt", "--storage", "sqlite", "search", "nvidia", "--limit", "3",
        ])
        .unwrap();
        assert_eq!(cli.storage, StorageKind::Sqlite);
        match cli.command {
            Commands::Search { query, limit, .. } => {
                assert_eq!(query, "nvidia");
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["nt", "feeds"]).unwrap();
        assert!(matches!(cli.command, Commands::Feeds { command: None }));
    }
}
