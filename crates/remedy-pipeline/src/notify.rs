//! Notification event log.
//!
//! Records externally-visible healing notifications (the ones a chat-ops
//! webhook would fan out) to an append-only file, behind its own dedup
//! gate so a flapping workflow does not spam the channel. The gate here
//! keys on the notified user as well, so distinct recipients of the same
//! anomaly are not collapsed together.

use chrono::Utc;
use metrics::counter;
use remedy_core::ledger_timestamp;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::dedup::DedupGate;
use crate::error::Result;
use crate::ledger::LedgerFile;

/// Append-only notification log with duplicate suppression.
pub struct NotificationLog {
    file: LedgerFile,
    gate: DedupGate,
}

impl NotificationLog {
    /// Create a log at `path` with the given suppression window.
    pub fn new<P: AsRef<Path>>(path: P, window: Duration) -> Result<Self> {
        Ok(Self {
            file: LedgerFile::new(path)?,
            gate: DedupGate::new(window),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Record one notification, unless an identical one was recorded
    /// inside the suppression window.
    ///
    /// Returns `Ok(true)` if the line was written, `Ok(false)` if it was
    /// suppressed as a duplicate.
    pub fn record(&self, workflow: &str, anomaly: &str, user_id: &str) -> Result<bool> {
        let key = format!("{}:{}:{}", workflow, anomaly, user_id);
        if !self.gate.admit(&key) {
            counter!("notifications_deduped_total").increment(1);
            debug!(workflow, anomaly, user_id, "duplicate notification suppressed");
            return Ok(false);
        }

        let line = format!(
            "{} | {} | {} | {}",
            ledger_timestamp(Utc::now()),
            workflow,
            anomaly,
            user_id
        );
        self.file.append_line(&line)?;

        counter!("notifications_total").increment(1);
        info!(workflow, anomaly, user_id, "notification recorded");
        Ok(true)
    }

    /// The `n` most recent notification lines, newest first. A missing
    /// file reads as empty.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let lines = self.file.lines();
        lines.into_iter().rev().take(n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn log(tmp: &TempDir) -> NotificationLog {
        NotificationLog::new(
            tmp.path().join("flowxo_events.log"),
            Duration::from_secs(6),
        )
        .unwrap()
    }

    #[test]
    fn test_first_notification_recorded() {
        let tmp = TempDir::new().unwrap();
        let log = log(&tmp);
        assert!(log.record("wf", "queue_pressure", "client_001").unwrap());
        assert_eq!(log.recent(10).len(), 1);
    }

    #[test]
    fn test_duplicate_suppressed_and_not_written() {
        let tmp = TempDir::new().unwrap();
        let log = log(&tmp);
        assert!(log.record("wf", "queue_pressure", "client_001").unwrap());
        assert!(!log.record("wf", "queue_pressure", "client_001").unwrap());
        assert_eq!(log.recent(10).len(), 1);
    }

    #[test]
    fn test_distinct_users_not_collapsed() {
        let tmp = TempDir::new().unwrap();
        let log = log(&tmp);
        assert!(log.record("wf", "queue_pressure", "client_001").unwrap());
        assert!(log.record("wf", "queue_pressure", "client_002").unwrap());
        assert_eq!(log.recent(10).len(), 2);
    }

    #[test]
    fn test_line_fields() {
        let tmp = TempDir::new().unwrap();
        let log = log(&tmp);
        log.record("orders_eu", "api_latency", "client_007").unwrap();

        let lines = log.recent(1);
        let parts: Vec<&str> = lines[0].split('|').map(str::trim).collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[1], "orders_eu");
        assert_eq!(parts[2], "api_latency");
        assert_eq!(parts[3], "client_007");
    }

    #[test]
    fn test_recent_newest_first_and_bounded() {
        let tmp = TempDir::new().unwrap();
        let log = log(&tmp);
        for i in 0..5 {
            log.record("wf", &format!("anomaly_{}", i), "u").unwrap();
        }

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert!(recent[0].contains("anomaly_4"));
        assert!(recent[1].contains("anomaly_3"));
    }

    #[test]
    fn test_recent_on_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let log = log(&tmp);
        assert!(log.recent(10).is_empty());
    }
}
