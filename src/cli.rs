//! CLI surface and wiring of the real adapters into one pipeline cycle.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{DestinationConfig, PipelineConfig, SourceConfig};
use crate::contract::{Publisher, Source};
use crate::cycle::{run_cycle, CycleDeps, CycleOptions};
use crate::fetch::{FfmpegTransformer, YtDlpFetcher};
use crate::load_config::load_config;
use crate::publish::{InstagramPublisher, YouTubePublisher};
use crate::report::{CycleReport, CycleStatus, PublishOutcome};
use crate::sources::{BookmarkSource, DiscordSource, DmSource};
use crate::state::{FileStateStore, StateStore};

/// CLI for clip-relay: watch clip sources, repost one item per run.
#[derive(Parser)]
#[clap(
    name = "clip-relay",
    version,
    about = "Discover one clip from chat/bookmark/DM sources, download, reformat and publish it"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run exactly one pipeline cycle using the given config file
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main().
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { config } => {
            let config = load_config(config)?;
            let options = CycleOptions {
                daily_limit: config.daily_limit,
                dashboard_path: Some(config.dashboard_path.clone()),
            };
            let deps = build_deps(config).context("failed to assemble pipeline")?;
            let report = run_cycle(&deps, &options)
                .await
                .context("cycle aborted on state error")?;
            print_summary(&report);
            Ok(())
        }
    }
}

/// Instantiate the real adapters the config asks for.
fn build_deps(config: PipelineConfig) -> Result<CycleDeps> {
    let http = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .context("failed to build HTTP client")?;

    let state: Arc<dyn StateStore> = Arc::new(FileStateStore::new(
        config.state.processed_ids.clone(),
        config.state.counter_dir.clone(),
    ));

    let mut sources: Vec<Box<dyn Source>> = Vec::with_capacity(config.sources.len());
    for source in config.sources {
        sources.push(match source {
            SourceConfig::Discord(c) => {
                Box::new(DiscordSource::new(http.clone(), c, Arc::clone(&state)))
            }
            SourceConfig::Bookmarks(c) => {
                Box::new(BookmarkSource::new(http.clone(), c, Arc::clone(&state)))
            }
            SourceConfig::DirectMessages(c) => {
                Box::new(DmSource::new(http.clone(), c, Arc::clone(&state)))
            }
        });
    }

    let mut publishers: Vec<Box<dyn Publisher>> = Vec::with_capacity(config.destinations.len());
    for destination in config.destinations {
        publishers.push(match destination {
            DestinationConfig::YouTube(c) => Box::new(YouTubePublisher::new(http.clone(), c)),
            DestinationConfig::Instagram(c) => Box::new(InstagramPublisher::new(http.clone(), c)),
        });
    }

    Ok(CycleDeps {
        sources,
        fetcher: Box::new(YtDlpFetcher::new(config.work_dir, config.timeout)),
        transformer: Box::new(FfmpegTransformer::new(config.timeout)),
        publishers,
        state,
    })
}

fn print_summary(report: &CycleReport) {
    match report.status {
        CycleStatus::Idle => {
            println!("No new clips to process. Queue: 0 items remaining.");
        }
        CycleStatus::Success | CycleStatus::Error => {
            let label = if report.status == CycleStatus::Success {
                "COMPLETE"
            } else {
                "FAILED"
            };
            println!("Cycle {label}");
            println!(
                "  Source : {}",
                report.source.as_deref().unwrap_or("unknown")
            );
            println!(
                "  ID     : {}",
                report.candidate_id.as_deref().unwrap_or("n/a")
            );
            println!("  Author : {}", report.author.as_deref().unwrap_or("n/a"));
            for dest in &report.destinations {
                let value = match &dest.outcome {
                    PublishOutcome::Published(id) => format!("published {id}"),
                    PublishOutcome::Failed(reason) => format!("failed: {reason}"),
                    PublishOutcome::Skipped => "skipped (daily quota)".to_string(),
                };
                println!("  {:<9}: {value}", dest.destination);
            }
            println!(
                "  Queue  : {} item(s) remaining for future runs.",
                report.queue_remaining
            );
            if let Some(error) = &report.last_error {
                println!("  Error  : {error}");
            }
        }
    }
}
