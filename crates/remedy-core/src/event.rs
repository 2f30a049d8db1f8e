//! Healing event types and the canonical CSV row codec.
//!
//! The event log is a plain UTF-8, comma-delimited table with a fixed,
//! order-sensitive header. Rows are encoded and parsed here so that the
//! durable log and the summary aggregator agree on one schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical column set of the event log, in order.
///
/// The on-disk header must match this exactly; anything else is schema
/// drift and triggers a repair before the next append.
pub const EVENT_LOG_HEADERS: [&str; 8] = [
    "ts",
    "workflow",
    "anomaly",
    "action",
    "status",
    "latency_ms",
    "recovery_pct",
    "reward",
];

/// The canonical header line (`ts,workflow,anomaly,...`).
pub fn canonical_header() -> String {
    EVENT_LOG_HEADERS.join(",")
}

/// Outcome of a healing attempt as reported by the healing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealStatus {
    /// The remediation fully recovered the workflow.
    Success,
    /// The remediation helped but did not fully recover.
    Partial,
    /// The engine could not determine the outcome.
    #[default]
    Unknown,
}

impl HealStatus {
    /// Stable string form used in log rows and ledger lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a status string, mapping anything unrecognized to `Unknown`.
    ///
    /// Lenient on purpose: rows written by older revisions must still load.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim() {
            "success" => Self::Success,
            "partial" => Self::Partial,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for HealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single healing event, as produced by the healing engine per trigger.
///
/// Immutable once appended to the event log. Fields the caller leaves
/// empty are filled with documented defaults by [`HealingEvent::normalized`]
/// before the row is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingEvent {
    /// Workflow the anomaly was observed in.
    pub workflow: String,
    /// Kind of anomaly that triggered healing.
    pub anomaly: String,
    /// Remediation action that was taken.
    pub action: String,
    /// Outcome of the healing attempt.
    pub status: HealStatus,
    /// End-to-end healing latency in milliseconds.
    pub latency_ms: u64,
    /// Recovery percentage achieved (0–100).
    pub recovery_pct: f64,
    /// Reward value assigned by the healing policy.
    pub reward: f64,
}

impl Default for HealingEvent {
    fn default() -> Self {
        Self {
            workflow: "unknown".to_string(),
            anomaly: "unspecified".to_string(),
            action: "none".to_string(),
            status: HealStatus::Unknown,
            latency_ms: 0,
            recovery_pct: 0.0,
            reward: 0.0,
        }
    }
}

impl HealingEvent {
    /// Return a copy with empty string fields replaced by their defaults.
    ///
    /// Defaults: workflow="unknown", anomaly="unspecified", action="none".
    /// Numeric fields already default to zero at construction.
    pub fn normalized(mut self) -> Self {
        if self.workflow.trim().is_empty() {
            self.workflow = "unknown".to_string();
        }
        if self.anomaly.trim().is_empty() {
            self.anomaly = "unspecified".to_string();
        }
        if self.action.trim().is_empty() {
            self.action = "none".to_string();
        }
        self
    }
}

/// A parsed event log row: the stored timestamp string plus the event.
///
/// The timestamp is kept as the raw stored string so date-prefix queries
/// operate on exactly what was written.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub ts: String,
    pub event: HealingEvent,
}

/// Sanitize a free-form string field for a comma-delimited row.
///
/// Commas and line breaks would split the row on read, so they are
/// replaced with spaces. Fields here are workflow/anomaly identifiers,
/// not prose, so this never loses meaningful structure.
pub fn sanitize_field(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c == ',' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Encode one event as a log row under the canonical schema.
///
/// The timestamp is always the one passed in (the log stamps append time,
/// overwriting anything the caller produced earlier).
pub fn encode_row(ts: DateTime<Utc>, event: &HealingEvent) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        ts.to_rfc3339(),
        sanitize_field(&event.workflow),
        sanitize_field(&event.anomaly),
        sanitize_field(&event.action),
        event.status.as_str(),
        event.latency_ms,
        event.recovery_pct,
        event.reward,
    )
}

/// Parse a single data row under the canonical schema.
///
/// Returns `None` if the field count is wrong or any numeric field fails
/// to parse — callers drop such rows rather than guessing at values.
pub fn parse_row(line: &str) -> Option<EventRow> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != EVENT_LOG_HEADERS.len() {
        return None;
    }

    let latency_ms: u64 = fields[5].trim().parse().ok()?;
    let recovery_pct: f64 = fields[6].trim().parse().ok()?;
    let reward: f64 = fields[7].trim().parse().ok()?;

    Some(EventRow {
        ts: fields[0].trim().to_string(),
        event: HealingEvent {
            workflow: fields[1].trim().to_string(),
            anomaly: fields[2].trim().to_string(),
            action: fields[3].trim().to_string(),
            status: HealStatus::parse_lossy(fields[4]),
            latency_ms,
            recovery_pct,
            reward,
        },
    })
}
