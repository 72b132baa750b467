//! The single-cycle controller: select → fetch → transform → publish →
//! finalize → report.
//!
//! One invocation processes at most one candidate and exits; the external
//! scheduler (cron) provides spacing and retries. Step policies:
//!
//! - selection is short-circuit over sources in priority order;
//! - a fetch failure ends the cycle without recording the candidate, so the
//!   next run retries it;
//! - a transform failure downgrades to a warning and publishing proceeds
//!   with the original file;
//! - destinations publish independently and the outcome is the OR of all
//!   attempted publishes;
//! - the candidate id is recorded if and only if at least one destination
//!   succeeded;
//! - the local file is deleted on every path out of this module.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::contract::{Candidate, Fetcher, Publisher, Source, Transformer};
use crate::error::StateIoError;
use crate::fetch::cleanup_media;
use crate::publish::{clean_caption, make_title};
use crate::report::{
    self, CycleReport, CycleStatus, DestinationReport, PublishOutcome,
};
use crate::select::select_candidate;
use crate::state::{is_destination_allowed, StateStore};

/// Everything the controller talks to, injected as trait objects so tests
/// can drive a full cycle with mocks.
pub struct CycleDeps {
    /// Sources in priority order.
    pub sources: Vec<Box<dyn Source>>,
    pub fetcher: Box<dyn Fetcher>,
    pub transformer: Box<dyn Transformer>,
    pub publishers: Vec<Box<dyn Publisher>>,
    /// Shared with the source adapters, which consult it during discovery.
    pub state: Arc<dyn StateStore>,
}

pub struct CycleOptions {
    /// Daily ceiling applied to rate-limited destinations.
    pub daily_limit: u32,
    /// Where to regenerate the operator dashboard; `None` skips writing.
    pub dashboard_path: Option<PathBuf>,
}

/// Only state I/O can abort a cycle: continuing without a readable
/// ProcessedSet risks publishing a duplicate.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    State(#[from] StateIoError),
}

/// Run exactly one pipeline cycle.
pub async fn run_cycle(
    deps: &CycleDeps,
    options: &CycleOptions,
) -> Result<CycleReport, CycleError> {
    // Read-before-decide: if state is unreadable, abort before any side
    // effect can cause a duplicate post.
    let processed = deps.state.load_processed_ids()?;

    let Some((candidate, source_index)) = select_candidate(&deps.sources).await else {
        info!("no new content from any source, ending idle");
        return Ok(finish(options, CycleReport::idle()));
    };
    let source = &deps.sources[source_index];
    let source_name = source.name().to_string();

    // Defence in depth: adapters consult the ProcessedSet themselves, but a
    // buggy adapter must not cause a double post.
    if processed.contains(&candidate.id) {
        warn!(id = %candidate.id, source = %source_name, "adapter returned an already-processed candidate, ignoring");
        return Ok(finish(options, CycleReport::idle()));
    }

    info!(
        id = %candidate.id,
        source = %source_name,
        author = %candidate.author_label,
        "candidate accepted for processing"
    );

    // The candidate is handed off; let the source stop resurfacing it.
    // Best effort only: a failed acknowledgement is the adapter's dedup
    // problem, the ProcessedSet still guards against a double post.
    if let Err(e) = source.acknowledge(&candidate).await {
        warn!(id = %candidate.id, error = %e, "acknowledgement failed, relying on processed-id dedup");
    }

    // Fetch. Failure here deliberately leaves the id unrecorded so the next
    // cycle retries it.
    let local_file = match deps
        .fetcher
        .download(&candidate.source_uri, &candidate.id)
        .await
    {
        Ok(path) => path,
        Err(e) => {
            error!(id = %candidate.id, error = %e, "download failed, will retry next cycle");
            let report = candidate_report(
                &candidate,
                &source_name,
                CycleStatus::Error,
                candidate.queue_behind + 1,
                Vec::new(),
                Some(format!("download failed for {}: {e}", candidate.id)),
            );
            return Ok(finish(options, report));
        }
    };

    // Transform. Cosmetic: never blocks publishing.
    let local_file = match deps.transformer.reformat(&local_file).await {
        Ok(path) => path,
        Err(e) => {
            warn!(id = %candidate.id, error = %e, "reformat failed, publishing original file");
            local_file
        }
    };

    // Quota gate, consulted once per cycle before publishing.
    let today = Utc::now().date_naive();
    let mut gate_open = Vec::with_capacity(deps.publishers.len());
    for publisher in &deps.publishers {
        let allowed = if publisher.rate_limited() {
            match is_destination_allowed(
                deps.state.as_ref(),
                publisher.name(),
                today,
                options.daily_limit,
            ) {
                Ok(allowed) => allowed,
                Err(e) => {
                    cleanup_media(&local_file);
                    return Err(e.into());
                }
            }
        } else {
            true
        };
        gate_open.push(allowed);
    }

    let title = make_title(&candidate.caption_text, &candidate.author_label, 100);
    let caption = clean_caption(&candidate.caption_text, &candidate.author_label);

    // All enabled destinations are attempted; a join barrier collects every
    // result before the outcome is computed.
    let attempts = deps
        .publishers
        .iter()
        .enumerate()
        .zip(gate_open.iter())
        .filter(|(_, allowed)| **allowed)
        .map(|((index, publisher), _)| {
            let file = local_file.clone();
            let title = title.clone();
            let caption = caption.clone();
            async move {
                let result = publisher.publish(&file, &title, &caption).await;
                (index, result)
            }
        });
    let mut results: Vec<Option<_>> = deps.publishers.iter().map(|_| None).collect();
    for (index, result) in join_all(attempts).await {
        results[index] = Some(result);
    }

    let mut destinations = Vec::with_capacity(deps.publishers.len());
    let mut last_error = None;
    let mut any_published = false;
    let mut successful_rate_limited = Vec::new();

    for (publisher, result) in deps.publishers.iter().zip(results.into_iter()) {
        let name = publisher.name().to_string();
        let outcome = match result {
            None => PublishOutcome::Skipped,
            Some(Ok(publication_id)) => {
                info!(destination = %name, publication_id = %publication_id, "publish succeeded");
                any_published = true;
                if publisher.rate_limited() {
                    successful_rate_limited.push(name.clone());
                }
                PublishOutcome::Published(publication_id)
            }
            Some(Err(e)) => {
                error!(destination = %name, error = %e, "publish failed");
                last_error = Some(format!("{name}: {e}"));
                PublishOutcome::Failed(e.to_string())
            }
        };
        destinations.push(DestinationReport {
            destination: name,
            outcome,
        });
    }

    // Local storage must never accumulate across cycles.
    cleanup_media(&local_file);

    let attempted_any = gate_open.iter().any(|allowed| *allowed);
    let (status, queue_remaining) = if any_published {
        deps.state.record_processed(&candidate.id)?;
        for destination in &successful_rate_limited {
            deps.state.increment_daily_count(destination, today)?;
        }
        info!(id = %candidate.id, "candidate marked as processed");
        (CycleStatus::Success, candidate.queue_behind)
    } else {
        if attempted_any {
            warn!(id = %candidate.id, "every attempted publish failed, will retry next cycle");
        } else if deps.publishers.is_empty() {
            warn!(id = %candidate.id, "no destinations configured, will retry next cycle");
            last_error = Some("no destinations configured".to_string());
        } else {
            warn!(id = %candidate.id, "all destinations disabled by quota, will retry next cycle");
            last_error = Some("all destinations disabled by daily quota".to_string());
        }
        // Still pending: the item stays in the queue for the next run.
        (CycleStatus::Error, candidate.queue_behind + 1)
    };

    let report = candidate_report(
        &candidate,
        &source_name,
        status,
        queue_remaining,
        destinations,
        last_error,
    );
    Ok(finish(options, report))
}

fn candidate_report(
    candidate: &Candidate,
    source_name: &str,
    status: CycleStatus,
    queue_remaining: u32,
    destinations: Vec<DestinationReport>,
    last_error: Option<String>,
) -> CycleReport {
    CycleReport {
        status,
        queue_remaining,
        source: Some(source_name.to_string()),
        candidate_id: Some(candidate.id.clone()),
        author: Some(candidate.author_label.clone()),
        timestamp_utc: report::now_utc(),
        destinations,
        last_error,
    }
}

/// Regenerate the dashboard for this terminal state. Dashboard I/O is
/// best-effort; a reporting failure must not change the cycle outcome.
fn finish(options: &CycleOptions, report: CycleReport) -> CycleReport {
    if let Some(path) = &options.dashboard_path {
        if let Err(e) = report::write_dashboard(path, &report) {
            warn!(path = %path.display(), error = %e, "failed to write dashboard");
        }
    }
    report
}
