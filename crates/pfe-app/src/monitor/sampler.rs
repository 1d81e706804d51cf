//! Translation of engine status into activity record updates.

use std::time::Instant;

use pfe_torrent_core::{ActivityState, TransferActivity, TransferStatus};

/// Facts one sampling pass established for a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    /// Whole-percent progress advanced this tick.
    pub changed: bool,
    /// The transfer is in its seeding phase.
    pub finished: bool,
    /// Useful upload occurred this tick.
    pub uploaded: bool,
    /// The record entered `FinishedDownload` this tick.
    pub just_finished: bool,
}

/// Fold one status report into `activity`.
///
/// Progress and upload counters only move forward. The idle clock is
/// refreshed on progress, on upload, and on every tick of the download phase.
pub fn apply_status(
    activity: &mut TransferActivity,
    status: &TransferStatus,
    now: Instant,
) -> Sample {
    let mut sample = Sample {
        finished: status.finished,
        ..Sample::default()
    };

    let percent = status.progress_percent();
    if percent > activity.progress_percent {
        if !status.name.is_empty() {
            activity.name = Some(status.name.clone());
        }
        activity.progress_percent = percent;
        if status.total_size_bytes > 0 {
            activity.size_bytes = status.total_size_bytes;
        }
        activity.last_activity = now;
        sample.changed = true;
    }
    if activity.size_bytes == 0 && status.total_size_bytes > 0 {
        activity.size_bytes = status.total_size_bytes;
    }

    if status.finished {
        if status.uploaded_payload_bytes > activity.uploaded_bytes {
            activity.uploaded_bytes = status.uploaded_payload_bytes;
            activity.last_activity = now;
            sample.uploaded = true;
        }
        if activity.state == ActivityState::Active {
            activity.state = ActivityState::FinishedDownload;
            sample.just_finished = true;
        }
    } else {
        activity.last_activity = now;
    }

    sample
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfe_torrent_core::TransferId;
    use std::time::Duration;

    fn status(progress: f64, finished: bool, uploaded: u64) -> TransferStatus {
        TransferStatus {
            progress,
            paused: false,
            finished,
            uploaded_payload_bytes: uploaded,
            total_size_bytes: 1_000,
            name: "demo.iso".into(),
        }
    }

    #[test]
    fn progress_advance_updates_metadata() {
        let start = Instant::now();
        let mut activity = TransferActivity::new(TransferId::new(1), None, start);
        let later = start + Duration::from_secs(1);

        let sample = apply_status(&mut activity, &status(0.255, false, 0), later);
        assert!(sample.changed);
        assert!(!sample.finished);
        assert_eq!(activity.progress_percent, 25);
        assert_eq!(activity.size_bytes, 1_000);
        assert_eq!(activity.name.as_deref(), Some("demo.iso"));
        assert_eq!(activity.last_activity, later);
    }

    #[test]
    fn progress_and_upload_never_decrease() {
        let start = Instant::now();
        let mut activity = TransferActivity::new(TransferId::new(1), None, start);
        let _ = apply_status(&mut activity, &status(1.0, true, 500), start);
        let sample = apply_status(&mut activity, &status(0.6, true, 200), start);

        assert!(!sample.changed);
        assert!(!sample.uploaded);
        assert_eq!(activity.progress_percent, 100);
        assert_eq!(activity.uploaded_bytes, 500);
    }

    #[test]
    fn downloading_refreshes_idle_clock_every_tick() {
        let start = Instant::now();
        let mut activity = TransferActivity::new(TransferId::new(1), None, start);
        let _ = apply_status(&mut activity, &status(0.5, false, 0), start);

        let later = start + Duration::from_secs(600);
        let sample = apply_status(&mut activity, &status(0.5, false, 0), later);
        assert!(!sample.changed);
        assert_eq!(activity.last_activity, later);
    }

    #[test]
    fn seeding_without_upload_keeps_idle_clock() {
        let start = Instant::now();
        let mut activity = TransferActivity::new(TransferId::new(1), None, start);
        let first = apply_status(&mut activity, &status(1.0, true, 100), start);
        assert!(first.just_finished && first.uploaded);
        assert_eq!(activity.state, ActivityState::FinishedDownload);

        let later = start + Duration::from_secs(30);
        let idle = apply_status(&mut activity, &status(1.0, true, 100), later);
        assert!(!idle.uploaded);
        assert!(!idle.just_finished);
        assert_eq!(activity.last_activity, start);

        let busy_at = later + Duration::from_secs(1);
        let busy = apply_status(&mut activity, &status(1.0, true, 150), busy_at);
        assert!(busy.uploaded);
        assert_eq!(activity.uploaded_bytes, 150);
        assert_eq!(activity.last_activity, busy_at);
    }

    #[test]
    fn unknown_size_is_filled_once_resolved() {
        let start = Instant::now();
        let mut activity = TransferActivity::new(TransferId::new(1), None, start);
        let mut report = status(0.0, false, 0);
        report.total_size_bytes = 0;
        let _ = apply_status(&mut activity, &report, start);
        assert_eq!(activity.size_bytes, 0);

        report.total_size_bytes = 4_096;
        let _ = apply_status(&mut activity, &report, start);
        assert_eq!(activity.size_bytes, 4_096);
        assert!(activity.name.is_none());
    }
}
