//! Durable, self-healing event log.
//!
//! An append-only, comma-delimited table with a fixed header
//! (see [`remedy_core::EVENT_LOG_HEADERS`]). Before every append the file
//! is checked against the canonical schema and repaired if it drifted:
//!
//! - missing or empty file → created with the canonical header
//! - first line is not the canonical header → the whole file is rewritten
//!   with the header prepended; every existing row is preserved
//! - unsalvageable content → the file is recreated header-only, and the
//!   loss is logged (documented recovery policy, not silent)
//!
//! The integrity check and the row write happen inside one critical
//! section per append, so concurrent appends cannot interleave rows or
//! race on a repair. Availability wins over single-event durability: a
//! failed write recreates the file and reports the loss to the caller
//! through [`AppendOutcome`] instead of propagating an error.

use chrono::Utc;
use metrics::counter;
use parking_lot::Mutex;
use remedy_core::{canonical_header, encode_row, HealingEvent, EVENT_LOG_HEADERS};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;

/// What `ensure_integrity` found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityOutcome {
    /// File present with the canonical header; nothing to do.
    Intact,
    /// File was missing or empty; created with the canonical header.
    Created,
    /// Header drift detected; file rewritten with the canonical header,
    /// all `rows` existing data rows preserved.
    HeaderRepaired {
        /// Data rows carried over into the rewritten file.
        rows: usize,
    },
    /// Content was unsalvageable; file recreated header-only. Existing
    /// rows were lost (logged).
    Recreated,
}

/// Result of an append, distinguishing a clean write from a recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The row was written. `integrity` reports any repair that ran first.
    Appended { integrity: IntegrityOutcome },
    /// The write itself failed; the file was recreated header-only and is
    /// writable again, but this event was lost for this attempt.
    RecoveredAfterWriteError,
}

/// Internal classification of the on-disk state.
enum SchemaState {
    MissingOrEmpty,
    Canonical,
    /// All lines are well-formed rows but the header is wrong or absent.
    Drift { lines: Vec<String> },
    Corrupt { reason: String },
}

/// Append-only healing event log with self-healing schema.
///
/// Thread-safe: one internal lock serializes "ensure integrity + write
/// row" per append. The lock is never held across anything slower than
/// local file I/O.
pub struct EventLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventLog {
    /// Create a handle for the log at `path`, creating parent directories.
    ///
    /// The file itself is created lazily by the first integrity check.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the backing file against the canonical schema and repair it
    /// if needed.
    ///
    /// Called automatically by [`append`](Self::append); public so callers
    /// can heal the file eagerly (e.g. at startup).
    pub fn ensure_integrity(&self) -> Result<IntegrityOutcome> {
        let _guard = self.lock.lock();
        self.ensure_integrity_locked()
    }

    /// Append one event under the canonical schema.
    ///
    /// Empty string fields are filled with their documented defaults and
    /// the row is stamped with the current UTC time, overwriting any
    /// caller-supplied timestamp. Runs the integrity check first, inside
    /// the same critical section as the write.
    ///
    /// Never fails for a recoverable reason: a mid-append I/O error
    /// recreates the file and returns
    /// [`AppendOutcome::RecoveredAfterWriteError`]. `Err` means even the
    /// recreation failed and the log is not writable.
    pub fn append(&self, event: &HealingEvent) -> Result<AppendOutcome> {
        let event = event.clone().normalized();
        let row = encode_row(Utc::now(), &event);

        let _guard = self.lock.lock();
        let integrity = self.ensure_integrity_locked()?;

        match self.write_row(&row) {
            Ok(()) => {
                debug!(
                    workflow = %event.workflow,
                    anomaly = %event.anomaly,
                    status = %event.status,
                    "healing event appended"
                );
                Ok(AppendOutcome::Appended { integrity })
            }
            Err(e) => {
                warn!(error = %e, "append failed, recreating event log");
                counter!("eventlog_recreations_total").increment(1);
                self.recreate_locked()?;
                Ok(AppendOutcome::RecoveredAfterWriteError)
            }
        }
    }

    fn ensure_integrity_locked(&self) -> Result<IntegrityOutcome> {
        match self.classify() {
            SchemaState::Canonical => Ok(IntegrityOutcome::Intact),
            SchemaState::MissingOrEmpty => {
                self.recreate_locked()?;
                info!(path = %self.path.display(), "created new event log");
                Ok(IntegrityOutcome::Created)
            }
            SchemaState::Drift { lines } => {
                let rows = lines.len();
                warn!(rows, "header mismatch detected, rebuilding event log");

                let mut content = canonical_header();
                content.push('\n');
                for line in &lines {
                    content.push_str(line);
                    content.push('\n');
                }
                fs::write(&self.path, content)?;

                counter!("eventlog_header_repairs_total").increment(1);
                info!(rows, "event log header repaired, all rows preserved");
                Ok(IntegrityOutcome::HeaderRepaired { rows })
            }
            SchemaState::Corrupt { reason } => {
                warn!(
                    reason = %reason,
                    "event log unsalvageable, recreating (existing rows lost)"
                );
                counter!("eventlog_recreations_total").increment(1);
                self.recreate_locked()?;
                Ok(IntegrityOutcome::Recreated)
            }
        }
    }

    /// Classify the on-disk state without modifying it.
    fn classify(&self) -> SchemaState {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(_) => return SchemaState::MissingOrEmpty,
        };
        if metadata.len() == 0 {
            return SchemaState::MissingOrEmpty;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                return SchemaState::Corrupt {
                    reason: format!("unreadable: {}", e),
                }
            }
        };

        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let first = match lines.next() {
            Some(l) => l,
            None => return SchemaState::MissingOrEmpty,
        };

        if first == canonical_header() {
            return SchemaState::Canonical;
        }

        // Drifted header. Salvage only if every line (including the bogus
        // first one, which may itself be a data row) has the canonical
        // field count; a mixed-width file cannot be mapped onto the schema.
        let all: Vec<String> = std::iter::once(first)
            .chain(lines)
            .map(|l| l.to_string())
            .collect();

        let expected = EVENT_LOG_HEADERS.len();
        if all.iter().all(|l| l.split(',').count() == expected) {
            SchemaState::Drift { lines: all }
        } else {
            SchemaState::Corrupt {
                reason: format!("inconsistent field counts (expected {})", expected),
            }
        }
    }

    /// Rewrite the file as header-only. Caller must hold the lock.
    fn recreate_locked(&self) -> Result<()> {
        let mut content = canonical_header();
        content.push('\n');
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn write_row(&self, row: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(row.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}
