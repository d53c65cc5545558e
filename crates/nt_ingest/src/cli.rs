use clap::{Args, Subcommand};
use nt_core::Result;

use crate::orchestrator::{IngestionReport, Ingestor, ItemOutcome, Trigger};

#[derive(Args, Debug)]
pub struct FeedArgs {
    #[command(subcommand)]
    pub command: FeedCommands,
}

#[derive(Subcommand, Debug)]
pub enum FeedCommands {
    /// List configured feeds
    List,
    /// Run the ingestion pipeline once over every configured feed
    Ingest {
        /// Print every item outcome, not just the totals
        #[arg(short, long)]
        verbose: bool,
    },
}

pub async fn handle_command(args: FeedArgs, ingestor: &Ingestor) -> Result<()> {
    match args.command {
        FeedCommands::List => {
            println!("Configured feeds:");
            for feed in ingestor.feeds() {
                let categories = if feed.categories.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", feed.categories.join(", "))
                };
                println!("  {} - {}{}", feed.name, feed.url, categories);
            }
        }
        FeedCommands::Ingest { verbose } => match ingestor.run(Trigger::Manual).await {
            Some(report) => print_report(&report, verbose),
            None => println!("⏭️ An ingestion run is already in progress"),
        },
    }
    Ok(())
}

pub fn print_report(report: &IngestionReport, verbose: bool) {
    for feed in &report.feeds {
        if let Some(error) = &feed.error {
            println!("❌ {}: {}", feed.feed, error);
            continue;
        }
        println!("📡 {} ({} items)", feed.feed, feed.items.len());
        if !verbose {
            continue;
        }
        for item in &feed.items {
            match &item.outcome {
                ItemOutcome::Stored(id) => {
                    println!("  🆕 {} - {} ({})", item.title, item.url, id)
                }
                ItemOutcome::Existing => println!("  ⏭️ {} - {}", item.title, item.url),
                ItemOutcome::Failed(e) => println!("  ❌ {} - {}: {}", item.title, item.url, e),
            }
        }
    }
    println!(
        "✅ stored {}, existing {}, failed {}, duplicates marked {}, expired {}",
        report.stored(),
        report.existing(),
        report.failed(),
        report.dedup.marked,
        report.retention_deleted
    );
}
