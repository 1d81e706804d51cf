//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use pfe_events::{Event, EventEnvelope, StopReason};
use pfe_telemetry::MetricsSnapshot;
use pfe_torrent_core::TransferActivity;
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

pub(crate) fn render_event(envelope: &EventEnvelope, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(envelope)?),
        OutputFormat::Table => {
            for line in event_lines(&envelope.event) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_summary(
    records: &[TransferActivity],
    metrics: &MetricsSnapshot,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let summary = json!({
                "transfers": records.iter().map(activity_json).collect::<Vec<_>>(),
                "metrics": metrics,
            });
            println!("{}", to_json(&summary)?);
        }
        OutputFormat::Table => {
            println!(
                "{:>4} {:<18} {:>5} {:>14} {:>7} NAME",
                "ID", "STATE", "PROG", "UPLOADED", "RATIO"
            );
            for record in records {
                println!("{}", summary_line(record));
            }
            println!(
                "ticks={} ratio_stops={} timeout_stops={} external_pauses={} pause_failures={}",
                metrics.ticks_total,
                metrics.ratio_stops_total,
                metrics.timeout_stops_total,
                metrics.external_pauses_total,
                metrics.pause_failures_total
            );
        }
    }
    Ok(())
}

pub(crate) fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

fn event_lines(event: &Event) -> Vec<String> {
    match event {
        Event::Progress { transfers } => transfers
            .iter()
            .map(|entry| {
                format!(
                    "progress {:>4} {:>3}% {}",
                    entry.transfer_id, entry.progress_percent, entry.name
                )
            })
            .collect(),
        Event::Stopped { transfers } => transfers
            .iter()
            .map(|entry| {
                format!(
                    "stopped  {:>4} {:<13} {} uploaded={}/{}",
                    entry.transfer_id,
                    reason_to_str(entry.reason),
                    entry.name,
                    entry.uploaded_bytes,
                    entry.size_bytes
                )
            })
            .collect(),
    }
}

const fn reason_to_str(reason: StopReason) -> &'static str {
    match reason {
        StopReason::RatioComplete => "ratio",
        StopReason::TimedOut => "timeout",
        StopReason::Paused => "paused",
    }
}

fn summary_line(record: &TransferActivity) -> String {
    let ratio = record
        .share_ratio()
        .map_or_else(|| "-".to_string(), |ratio| format!("{ratio:.2}"));
    format!(
        "{:>4} {:<18} {:>4}% {:>14} {:>7} {}",
        record.id.get(),
        record.state.as_str(),
        record.progress_percent,
        record.uploaded_bytes,
        ratio,
        record.label()
    )
}

fn activity_json(record: &TransferActivity) -> Value {
    json!({
        "id": record.id.get(),
        "hash": record.hash.map(|hash| hash.to_base32()),
        "name": record.label(),
        "state": record.state.as_str(),
        "progress_percent": record.progress_percent,
        "size_bytes": record.size_bytes,
        "uploaded_bytes": record.uploaded_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfe_events::{ProgressEntry, StoppedEntry};
    use pfe_torrent_core::{ActivityState, TransferId};
    use std::time::Instant;

    #[test]
    fn progress_events_render_one_line_per_transfer() {
        let lines = event_lines(&Event::Progress {
            transfers: vec![
                ProgressEntry {
                    transfer_id: 1,
                    name: "alpha".into(),
                    progress_percent: 7,
                    size_bytes: 10,
                },
                ProgressEntry {
                    transfer_id: 12,
                    name: "beta".into(),
                    progress_percent: 100,
                    size_bytes: 10,
                },
            ],
        });
        assert_eq!(
            lines,
            vec![
                "progress    1   7% alpha".to_string(),
                "progress   12 100% beta".to_string(),
            ]
        );
    }

    #[test]
    fn stopped_events_name_the_reason() {
        let lines = event_lines(&Event::Stopped {
            transfers: vec![StoppedEntry {
                transfer_id: 3,
                hash: None,
                name: "gamma".into(),
                reason: StopReason::TimedOut,
                uploaded_bytes: 0,
                size_bytes: 500,
            }],
        });
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("stopped     3 timeout"));
        assert!(lines[0].ends_with("gamma uploaded=0/500"));
    }

    #[test]
    fn activity_json_exposes_state_and_counters() {
        let mut record = TransferActivity::new(TransferId::new(9), None, Instant::now());
        record.name = Some("delta".into());
        record.size_bytes = 100;
        record.uploaded_bytes = 301;
        record.progress_percent = 100;
        record.state = ActivityState::RatioComplete;

        let value = activity_json(&record);
        assert_eq!(value["id"], 9);
        assert_eq!(value["state"], "ratio_complete");
        assert_eq!(value["hash"], Value::Null);
        assert!(summary_line(&record).contains("3.01"));
    }
}
