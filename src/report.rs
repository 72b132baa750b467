//! Operator-facing cycle report and the regenerated Markdown dashboard.
//!
//! The report is a pure projection of one cycle's outcome: rendering it
//! never touches the ProcessedSet or the daily counters.

use std::fmt::Write as _;
use std::path::Path;

use chrono::Utc;
use tracing::info;

/// Terminal status of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// No source yielded a candidate; zero side effects.
    Idle,
    /// At least one destination accepted the candidate.
    Success,
    /// The candidate was chosen but fetching or every publish failed.
    Error,
}

/// Result of one destination's publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Destination accepted the upload; holds the publication id.
    Published(String),
    /// Destination was attempted and failed.
    Failed(String),
    /// Destination was disabled up front by the quota gate.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct DestinationReport {
    pub destination: String,
    pub outcome: PublishOutcome,
}

/// Everything the operator needs to know about the last run.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub status: CycleStatus,
    /// Best-effort estimate of items still waiting across sources.
    pub queue_remaining: u32,
    /// Name of the source that produced the candidate, if any.
    pub source: Option<String>,
    pub candidate_id: Option<String>,
    pub author: Option<String>,
    /// UTC timestamp of this run.
    pub timestamp_utc: String,
    pub destinations: Vec<DestinationReport>,
    pub last_error: Option<String>,
}

impl CycleReport {
    pub fn idle() -> Self {
        Self {
            status: CycleStatus::Idle,
            queue_remaining: 0,
            source: None,
            candidate_id: None,
            author: None,
            timestamp_utc: now_utc(),
            destinations: Vec::new(),
            last_error: None,
        }
    }

    /// True if at least one destination published.
    pub fn any_published(&self) -> bool {
        self.destinations
            .iter()
            .any(|d| matches!(d.outcome, PublishOutcome::Published(_)))
    }
}

pub fn now_utc() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Render the report as the Markdown status dashboard that replaces the
/// previous run's dashboard wholesale.
pub fn render_dashboard(report: &CycleReport) -> String {
    let status_badge = match report.status {
        CycleStatus::Idle => "Idle",
        CycleStatus::Success => "Success",
        CycleStatus::Error => "Error",
    };

    let mut out = String::new();
    out.push_str("# clip-relay Pipeline Dashboard\n\n");
    out.push_str("| Metric | Value |\n|---|---|\n");
    let _ = writeln!(out, "| **Status** | {status_badge} |");
    let _ = writeln!(out, "| **Queue** | {} item(s) waiting |", report.queue_remaining);
    let _ = writeln!(out, "| **Last run** | `{}` |", report.timestamp_utc);
    out.push_str("\n## Last action\n\n");

    match &report.candidate_id {
        Some(id) => {
            out.push_str("| Field | Value |\n|---|---|\n");
            let _ = writeln!(
                out,
                "| **Source** | `{}` |",
                report.source.as_deref().unwrap_or("unknown")
            );
            let _ = writeln!(out, "| **ID** | `{id}` |");
            let _ = writeln!(
                out,
                "| **Author** | {} |",
                report.author.as_deref().unwrap_or("N/A")
            );
            for dest in &report.destinations {
                let value = match &dest.outcome {
                    PublishOutcome::Published(pub_id) => format!("published `{pub_id}`"),
                    PublishOutcome::Failed(reason) => format!("failed: {reason}"),
                    PublishOutcome::Skipped => "skipped (daily quota)".to_string(),
                };
                let _ = writeln!(out, "| **{}** | {value} |", dest.destination);
            }
        }
        None => out.push_str("_No item processed this run._\n"),
    }

    out.push_str("\n## Errors\n\n");
    match &report.last_error {
        Some(msg) => {
            let _ = writeln!(out, "```\n{msg}\n```");
        }
        None => out.push_str("_No recent errors._\n"),
    }

    let _ = writeln!(out, "\n<sub>Last updated: {}</sub>", report.timestamp_utc);
    out
}

/// Overwrite the dashboard file. Failure here must not fail the cycle; the
/// caller logs and continues.
pub fn write_dashboard(path: &Path, report: &CycleReport) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    std::fs::write(path, render_dashboard(report))?;
    info!(path = %path.display(), "dashboard regenerated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_dashboard_mentions_no_item() {
        let rendered = render_dashboard(&CycleReport::idle());
        assert!(rendered.contains("Idle"));
        assert!(rendered.contains("No item processed"));
        assert!(rendered.contains("0 item(s) waiting"));
    }

    #[test]
    fn mixed_outcome_dashboard_shows_each_destination() {
        let report = CycleReport {
            status: CycleStatus::Success,
            queue_remaining: 2,
            source: Some("discord".into()),
            candidate_id: Some("discord_42".into()),
            author: Some("@someone".into()),
            timestamp_utc: "2026-08-23 10:00:00 UTC".into(),
            destinations: vec![
                DestinationReport {
                    destination: "youtube".into(),
                    outcome: PublishOutcome::Published("yt_9".into()),
                },
                DestinationReport {
                    destination: "instagram".into(),
                    outcome: PublishOutcome::Failed("container timed out".into()),
                },
            ],
            last_error: Some("instagram: container timed out".into()),
        };
        let rendered = render_dashboard(&report);
        assert!(rendered.contains("published `yt_9`"));
        assert!(rendered.contains("failed: container timed out"));
        assert!(rendered.contains("`discord_42`"));
        assert!(report.any_published());
    }
}
