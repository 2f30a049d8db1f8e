//! Revenue ledgers.
//!
//! Two append-only, pipe-delimited streams share the line codec from
//! `remedy_core::billing`:
//!
//! - the **pricing ledger** (`healing_pricing.log`), written here: one
//!   recovery-priced line per accepted healing event
//! - the **billing ledger** (`healing_revenue.log`), written by the
//!   billing gateway: one flat-priced line per billing attempt
//!
//! Neither ledger keeps running totals in memory. Totals are recomputed
//! by replaying lines, so the file is always the source of truth and a
//! crash can never leave a cached total out of sync.

use chrono::Utc;
use parking_lot::Mutex;
use remedy_core::{
    format_ledger_line, ledger_timestamp, parse_ledger_line, round4, BASE_HEAL_PRICE,
};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// A line-oriented append-only file with an internal write lock.
///
/// Shared by the pricing ledger, the billing gateway's ledger, and the
/// notification log, which are all "append one line, replay on read"
/// files.
pub(crate) struct LedgerFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LedgerFile {
    /// Create a handle for `path`, creating parent directories. The file
    /// itself is created on first append.
    pub(crate) fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line (newline added here) and flush.
    pub(crate) fn append_line(&self, line: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    /// All lines currently on disk. A missing file reads as empty.
    pub(crate) fn lines(&self) -> Vec<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// One pricing ledger entry, as written for an accepted healing event.
#[derive(Debug, Clone, Serialize)]
pub struct RevenueEntry {
    pub timestamp: String,
    pub workflow: String,
    pub anomaly: String,
    /// Recovery-scaled amount in USD, rounded to 4 decimals.
    pub amount: f64,
    /// `"success"` or `"partial"`.
    pub status: String,
}

/// Recovery-priced revenue ledger.
///
/// Prices each healing event at the base price scaled by the recovery
/// achieved: `round(base * (1 + recovery_pct / 100), 4)`. A full recovery
/// is worth twice the base price, a no-op recovery exactly the base price.
pub struct RevenueLedger {
    file: LedgerFile,
}

impl RevenueLedger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: LedgerFile::new(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Price one healing event and append its ledger line.
    ///
    /// Returns the entry that was written. Pricing happens before the
    /// write, so the returned amount always matches the line on disk.
    pub fn record(
        &self,
        workflow: &str,
        anomaly: &str,
        recovery_pct: f64,
        success: bool,
    ) -> Result<RevenueEntry> {
        let amount = round4(BASE_HEAL_PRICE * (1.0 + recovery_pct / 100.0));
        let status = if success { "success" } else { "partial" };
        let timestamp = ledger_timestamp(Utc::now());

        let line = format_ledger_line(&timestamp, workflow, anomaly, amount, status, None);
        self.file.append_line(&line)?;

        debug!(workflow, anomaly, amount, status, "pricing ledger entry");
        Ok(RevenueEntry {
            timestamp,
            workflow: workflow.to_string(),
            anomaly: anomaly.to_string(),
            amount,
            status: status.to_string(),
        })
    }

    /// Total revenue, recomputed by replaying every parseable line.
    ///
    /// Unparseable lines are skipped; a missing file totals 0.0.
    pub fn total(&self) -> f64 {
        self.file
            .lines()
            .iter()
            .filter_map(|l| parse_ledger_line(l))
            .map(|entry| entry.amount)
            .sum()
    }
}
