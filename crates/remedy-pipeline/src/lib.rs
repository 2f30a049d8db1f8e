//! Remedy healing telemetry and monetization pipeline.
//!
//! This crate turns healing events emitted by a self-healing workflow
//! engine into durable telemetry, billed revenue, and reports.
//!
//! # Modules
//!
//! - [`dedup`] - Sliding-window duplicate suppression
//! - [`event_log`] - Durable, self-healing event log
//! - [`gateway`] - Tiered billing gateway (simulated / real / fallback)
//! - [`ledger`] - Recovery-priced revenue ledger
//! - [`notify`] - Deduplicated notification log
//! - [`summary`] - Read-only reporting over the on-disk logs
//! - [`pipeline`] - Orchestration of the above behind one service object
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  HealingEvent   │  (workflow, anomaly, action, status, metrics)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    DedupGate    │  In-memory sliding window - one event per identity
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ BillingGateway  │  Exactly one charge per accepted event, tiered
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    EventLog     │  Self-healing CSV, canonical schema enforced
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  RevenueLedger  │  Recovery-priced pipe-delimited ledger
//! └─────────────────┘
//! ```
//!
//! The pipeline is file-first: the on-disk logs are the source of truth,
//! and [`summary::SummaryAggregator`] recomputes every report from them.

pub mod dedup;
pub mod error;
pub mod event_log;
pub mod gateway;
pub mod ledger;
pub mod notify;
pub mod pipeline;
pub mod summary;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use dedup::DedupGate;
pub use event_log::{AppendOutcome, EventLog, IntegrityOutcome};
pub use gateway::{BillingConfig, BillingGateway, BILLING_TIMEOUT, DEFAULT_BILLING_ENDPOINT};
pub use ledger::{RevenueEntry, RevenueLedger};
pub use notify::NotificationLog;
pub use pipeline::{
    HealingOutcome, HealingPipeline, PipelineConfig, DEFAULT_DEDUP_WINDOW, EVENT_LOG_FILE,
    NOTIFICATION_LOG_FILE, PRICING_LOG_FILE, REVENUE_LOG_FILE,
};
pub use summary::{RevenueReport, SummaryAggregator, SummaryStats};
