//! Core types, row codecs, and shared utilities for the remedy pipeline.
//!
//! This crate provides:
//! - Healing event types and the canonical CSV row codec
//! - Billing record types and the pipe-delimited ledger line codec
//! - Prometheus metrics helpers
//!
//! The pipeline itself (dedup gate, durable event log, revenue ledgers,
//! billing gateway, summary aggregation) lives in `remedy-pipeline`.

mod billing;
mod event;
pub mod metrics;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Base price per healing event in USD, before the recovery multiplier.
pub const BASE_HEAL_PRICE: f64 = 0.05;

/// Timestamp format used in ledger lines (`2026-08-30 14:03:07`).
///
/// Kept stable so windowed revenue queries can filter on a `YYYY-MM-DD`
/// date prefix of the stored string.
pub const LEDGER_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub use billing::{
    format_ledger_line, ledger_timestamp, parse_ledger_line, round4, BillingMode, BillingRecord,
    BillingStatus, LedgerLine,
};
pub use event::{
    canonical_header, encode_row, parse_row, sanitize_field, EventRow, HealStatus, HealingEvent,
    EVENT_LOG_HEADERS,
};
