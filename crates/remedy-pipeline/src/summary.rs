//! Read-only reporting over the on-disk logs.
//!
//! The aggregator holds no state beyond the file paths and recomputes
//! every answer from disk per call, so reports always reflect what is
//! durably written, including repairs and recreations that happened since
//! the last call. It shares no locks with the writers; a torn row caught
//! mid-append simply fails to parse and is skipped.
//!
//! Reporting never fails: unreadable or missing files produce zero-valued
//! summaries and empty reports.

use chrono::NaiveDate;
use remedy_core::{parse_ledger_line, parse_row, EventRow, LedgerLine};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Aggregate view over the healing event log.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SummaryStats {
    /// Mean healing latency, expressed in minutes of queue time.
    pub avg_queue_minutes: f64,
    /// Mean recovery percentage across all events.
    pub avg_recovery_pct: f64,
    /// Mean policy reward across all events.
    pub avg_reward: f64,
    /// Number of events that contributed to the averages.
    pub healings: u64,
    /// Total from the billing revenue ledger.
    pub total_revenue: f64,
}

/// Replay of the billing revenue ledger.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RevenueReport {
    pub total_revenue: f64,
    pub total_heals: u64,
    pub entries: Vec<LedgerLine>,
}

/// Recomputes reports from the event log and the billing revenue ledger.
pub struct SummaryAggregator {
    event_log_path: PathBuf,
    revenue_log_path: PathBuf,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1_000.0).round() / 1_000.0
}

impl SummaryAggregator {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(event_log: P, revenue_log: Q) -> Self {
        Self {
            event_log_path: event_log.as_ref().to_path_buf(),
            revenue_log_path: revenue_log.as_ref().to_path_buf(),
        }
    }

    /// Compute the summary over all parseable event rows.
    ///
    /// An empty, missing, or unreadable log yields the zero-valued
    /// default rather than an error.
    pub fn summarize(&self) -> SummaryStats {
        let rows = self.event_rows();
        if rows.is_empty() {
            return SummaryStats {
                total_revenue: round3(self.ledger_entries(None).iter().map(|e| e.amount).sum()),
                ..SummaryStats::default()
            };
        }

        let n = rows.len() as f64;
        let latency_sum: f64 = rows.iter().map(|r| r.event.latency_ms as f64).sum();
        let recovery_sum: f64 = rows.iter().map(|r| r.event.recovery_pct).sum();
        let reward_sum: f64 = rows.iter().map(|r| r.event.reward).sum();

        SummaryStats {
            avg_queue_minutes: round2(latency_sum / n / 60_000.0),
            avg_recovery_pct: round2(recovery_sum / n),
            avg_reward: round2(reward_sum / n),
            healings: rows.len() as u64,
            total_revenue: round3(self.ledger_entries(None).iter().map(|e| e.amount).sum()),
        }
    }

    /// Replay the full billing revenue ledger.
    pub fn revenue(&self) -> RevenueReport {
        Self::report_from(self.ledger_entries(None))
    }

    /// Replay only the ledger entries stamped on the given UTC day.
    pub fn revenue_for_day(&self, day: NaiveDate) -> RevenueReport {
        let prefix = day.format("%Y-%m-%d").to_string();
        Self::report_from(self.ledger_entries(Some(&prefix)))
    }

    /// Count events per anomaly kind, over all parseable rows.
    pub fn anomaly_mix(&self) -> BTreeMap<String, u64> {
        let mut mix = BTreeMap::new();
        for row in self.event_rows() {
            *mix.entry(row.event.anomaly).or_insert(0) += 1;
        }
        mix
    }

    /// The `n` most recent event log data rows, newest first.
    pub fn recent_logs(&self, n: usize) -> Vec<String> {
        let lines: Vec<String> = match fs::read_to_string(&self.event_log_path) {
            Ok(content) => content
                .lines()
                .skip(1)
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.to_string())
                .collect(),
            Err(_) => return Vec::new(),
        };
        lines.into_iter().rev().take(n).collect()
    }

    /// The raw event log file contents, if readable.
    pub fn raw_log(&self) -> Option<String> {
        fs::read_to_string(&self.event_log_path).ok()
    }

    fn report_from(entries: Vec<LedgerLine>) -> RevenueReport {
        RevenueReport {
            total_revenue: round3(entries.iter().map(|e| e.amount).sum()),
            total_heals: entries.len() as u64,
            entries,
        }
    }

    /// All parseable event rows (the header and torn rows drop out here).
    fn event_rows(&self) -> Vec<EventRow> {
        match fs::read_to_string(&self.event_log_path) {
            Ok(content) => content.lines().filter_map(parse_row).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Parseable ledger lines, optionally filtered by timestamp prefix.
    fn ledger_entries(&self, day_prefix: Option<&str>) -> Vec<LedgerLine> {
        let content = match fs::read_to_string(&self.revenue_log_path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        content
            .lines()
            .filter_map(parse_ledger_line)
            .filter(|e| match day_prefix {
                Some(prefix) => e.timestamp.starts_with(prefix),
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_core::{canonical_header, format_ledger_line};
    use std::fs;
    use tempfile::TempDir;

    fn write_event_log(path: &Path, rows: &[&str]) {
        let mut content = canonical_header();
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(path, content).unwrap();
    }

    fn aggregator(tmp: &TempDir) -> SummaryAggregator {
        SummaryAggregator::new(
            tmp.path().join("metrics_log.csv"),
            tmp.path().join("healing_revenue.log"),
        )
    }

    // =========================================================================
    // Summary
    // =========================================================================

    #[test]
    fn test_missing_files_yield_zero_summary() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(aggregator(&tmp).summarize(), SummaryStats::default());
    }

    #[test]
    fn test_header_only_log_yields_zero_summary() {
        let tmp = TempDir::new().unwrap();
        write_event_log(&tmp.path().join("metrics_log.csv"), &[]);
        assert_eq!(aggregator(&tmp).summarize(), SummaryStats::default());
    }

    #[test]
    fn test_summary_averages() {
        let tmp = TempDir::new().unwrap();
        write_event_log(
            &tmp.path().join("metrics_log.csv"),
            &[
                "2026-08-30T10:00:00Z,wf_a,queue_pressure,restart,success,60000,80.0,0.2",
                "2026-08-30T10:01:00Z,wf_b,api_latency,scale,partial,180000,60.0,0.4",
            ],
        );

        let stats = aggregator(&tmp).summarize();
        assert_eq!(stats.healings, 2);
        // (1 minute + 3 minutes) / 2
        assert_eq!(stats.avg_queue_minutes, 2.0);
        assert_eq!(stats.avg_recovery_pct, 70.0);
        assert_eq!(stats.avg_reward, 0.3);
    }

    #[test]
    fn test_summary_skips_torn_rows() {
        let tmp = TempDir::new().unwrap();
        write_event_log(
            &tmp.path().join("metrics_log.csv"),
            &[
                "2026-08-30T10:00:00Z,wf,anom,act,success,60000,80.0,0.2",
                "torn,row",
                "2026-08-30T10:01:00Z,wf,anom,act,success,60000,80.0,0.2",
            ],
        );

        let stats = aggregator(&tmp).summarize();
        assert_eq!(stats.healings, 2);
    }

    #[test]
    fn test_summary_includes_ledger_total() {
        let tmp = TempDir::new().unwrap();
        write_event_log(
            &tmp.path().join("metrics_log.csv"),
            &["2026-08-30T10:00:00Z,wf,anom,act,success,60000,80.0,0.2"],
        );
        let line = format_ledger_line("2026-08-30 10:00:01", "u", "anom", 0.05, "simulated", None);
        fs::write(tmp.path().join("healing_revenue.log"), format!("{}\n", line)).unwrap();

        assert_eq!(aggregator(&tmp).summarize().total_revenue, 0.05);
    }

    // =========================================================================
    // Revenue replay
    // =========================================================================

    fn write_ledger(path: &Path, lines: &[String]) {
        let mut content = String::new();
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_revenue_replay_totals() {
        let tmp = TempDir::new().unwrap();
        write_ledger(
            &tmp.path().join("healing_revenue.log"),
            &[
                format_ledger_line("2026-08-29 09:00:00", "u1", "h", 0.05, "simulated", None),
                format_ledger_line("2026-08-30 09:00:00", "u2", "h", 0.05, "success", Some("real")),
            ],
        );

        let report = aggregator(&tmp).revenue();
        assert_eq!(report.total_heals, 2);
        assert_eq!(report.total_revenue, 0.1);
        assert_eq!(report.entries.len(), 2);
    }

    #[test]
    fn test_revenue_for_day_filters_by_prefix() {
        let tmp = TempDir::new().unwrap();
        write_ledger(
            &tmp.path().join("healing_revenue.log"),
            &[
                format_ledger_line("2026-08-29 09:00:00", "u1", "h", 0.05, "simulated", None),
                format_ledger_line("2026-08-30 09:00:00", "u2", "h", 0.05, "simulated", None),
                format_ledger_line("2026-08-30 18:30:00", "u3", "h", 0.05, "simulated", None),
            ],
        );

        let day = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let report = aggregator(&tmp).revenue_for_day(day);
        assert_eq!(report.total_heals, 2);
        assert_eq!(report.total_revenue, 0.1);
    }

    #[test]
    fn test_revenue_missing_ledger_is_empty() {
        let tmp = TempDir::new().unwrap();
        let report = aggregator(&tmp).revenue();
        assert_eq!(report.total_heals, 0);
        assert_eq!(report.total_revenue, 0.0);
        assert!(report.entries.is_empty());
    }

    // =========================================================================
    // Log access
    // =========================================================================

    #[test]
    fn test_anomaly_mix_counts() {
        let tmp = TempDir::new().unwrap();
        write_event_log(
            &tmp.path().join("metrics_log.csv"),
            &[
                "2026-08-30T10:00:00Z,wf,queue_pressure,act,success,100,80.0,0.2",
                "2026-08-30T10:01:00Z,wf,queue_pressure,act,success,100,80.0,0.2",
                "2026-08-30T10:02:00Z,wf,api_latency,act,partial,100,50.0,0.1",
            ],
        );

        let mix = aggregator(&tmp).anomaly_mix();
        assert_eq!(mix.get("queue_pressure"), Some(&2));
        assert_eq!(mix.get("api_latency"), Some(&1));
    }

    #[test]
    fn test_recent_logs_newest_first_without_header() {
        let tmp = TempDir::new().unwrap();
        write_event_log(
            &tmp.path().join("metrics_log.csv"),
            &[
                "2026-08-30T10:00:00Z,first,anom,act,success,100,80.0,0.2",
                "2026-08-30T10:01:00Z,second,anom,act,success,100,80.0,0.2",
            ],
        );

        let recent = aggregator(&tmp).recent_logs(1);
        assert_eq!(recent.len(), 1);
        assert!(recent[0].contains("second"));
    }

    #[test]
    fn test_raw_log_round_trips() {
        let tmp = TempDir::new().unwrap();
        write_event_log(&tmp.path().join("metrics_log.csv"), &[]);

        let raw = aggregator(&tmp).raw_log().unwrap();
        assert!(raw.starts_with(&canonical_header()));

        let missing = SummaryAggregator::new(
            tmp.path().join("absent.csv"),
            tmp.path().join("absent.log"),
        );
        assert!(missing.raw_log().is_none());
    }
}
