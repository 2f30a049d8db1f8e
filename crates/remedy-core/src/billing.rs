//! Billing record types and the pipe-delimited ledger line codec.
//!
//! Both revenue streams (the recovery-priced pricing ledger and the flat
//! billing ledger) share this line format:
//!
//! ```text
//! {timestamp} | {subject} | {detail} | ${amount:.4} | {status}[ | {mode}]
//! ```
//!
//! Lines are parsed by splitting on `|` and trimming; amounts are parsed
//! by stripping the leading `$`. The optional trailing mode field is only
//! written for real billing attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::LEDGER_TS_FORMAT;

/// Outcome status of a billing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    /// The remote charge went through (HTTP 200/201).
    Success,
    /// No credential configured; the charge was simulated locally.
    Simulated,
    /// The remote API rejected the charge (non-2xx); logged as fallback.
    FallbackLogged,
    /// A transport error or timeout occurred before a response arrived.
    Exception,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Simulated => "simulated",
            Self::FallbackLogged => "fallback_logged",
            Self::Exception => "exception",
        }
    }

    /// True for every tier other than a confirmed remote success.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl std::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which billing path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BillingMode {
    /// Real remote charge, confirmed.
    Real,
    /// Local simulation (no credential configured).
    Local,
    /// Real charge attempted, rejected by the remote API.
    RealFailed,
    /// Real charge attempted, transport failure; fell back to local log.
    Fallback,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Local => "local",
            Self::RealFailed => "real-failed",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for BillingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One billing outcome, produced exactly once per accepted healing event.
///
/// Append-only: records are never mutated after the ledger line is written.
#[derive(Debug, Clone, Serialize)]
pub struct BillingRecord {
    /// Ledger timestamp string (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub timestamp: String,
    /// User the charge applies to.
    pub user: String,
    /// Heal type being billed (typically the anomaly kind).
    pub heal_type: String,
    /// Amount in USD, rounded to 4 decimals.
    pub amount: f64,
    pub status: BillingStatus,
    pub mode: BillingMode,
    /// HTTP status code from the remote API, when a response arrived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    /// Remote response payload on a confirmed charge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl BillingRecord {
    /// Render this record as its flat-ledger line.
    ///
    /// Simulated charges omit the mode suffix, matching the historical
    /// format; real-path outcomes carry it so the two are distinguishable
    /// on replay.
    pub fn ledger_line(&self) -> String {
        let mode = match self.status {
            BillingStatus::Simulated => None,
            _ => Some(self.mode),
        };
        format_ledger_line(
            &self.timestamp,
            &self.user,
            &self.heal_type,
            self.amount,
            self.status.as_str(),
            mode.map(|m| m.as_str()),
        )
    }
}

/// A parsed ledger line from either revenue stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerLine {
    pub timestamp: String,
    /// Second field: user for the billing ledger, workflow for pricing.
    pub subject: String,
    /// Third field: heal type for the billing ledger, anomaly for pricing.
    pub detail: String,
    pub amount: f64,
    pub status: String,
    pub mode: Option<String>,
}

/// Round to 4 decimal places (ledger amount precision).
pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Format a timestamp for ledger lines (`YYYY-MM-DD HH:MM:SS`, UTC).
pub fn ledger_timestamp(now: DateTime<Utc>) -> String {
    now.format(LEDGER_TS_FORMAT).to_string()
}

/// Build one pipe-delimited ledger line. No trailing newline.
pub fn format_ledger_line(
    timestamp: &str,
    subject: &str,
    detail: &str,
    amount: f64,
    status: &str,
    mode: Option<&str>,
) -> String {
    match mode {
        Some(mode) => format!(
            "{} | {} | {} | ${:.4} | {} | {}",
            timestamp, subject, detail, amount, status, mode
        ),
        None => format!(
            "{} | {} | {} | ${:.4} | {}",
            timestamp, subject, detail, amount, status
        ),
    }
}

/// Parse one ledger line. Returns `None` for lines with fewer than five
/// fields or an unparseable amount; replay skips them.
pub fn parse_ledger_line(line: &str) -> Option<LedgerLine> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    if parts.len() < 5 {
        return None;
    }

    let amount: f64 = parts[3].trim_start_matches('$').trim().parse().ok()?;

    Some(LedgerLine {
        timestamp: parts[0].to_string(),
        subject: parts[1].to_string(),
        detail: parts[2].to_string(),
        amount,
        status: parts[4].to_string(),
        mode: parts.get(5).map(|s| s.to_string()),
    })
}
