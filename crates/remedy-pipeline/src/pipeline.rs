//! Healing pipeline orchestration.
//!
//! Wires the dedup gate, the durable event log, the billing gateway, the
//! pricing ledger, the notification log, and the summary aggregator into
//! one service object. All file paths derive from a single data directory;
//! nothing here touches global state, so multiple pipelines over separate
//! directories can coexist in one process (which is also how the tests
//! isolate themselves).
//!
//! Ordering per accepted event: dedup decision, billing charge (off-lock,
//! it may spend up to the billing timeout on the network), durable append,
//! pricing entry. Billing before the append means a crash between the two
//! can leave a charged-but-unlogged event; the reverse would risk a
//! logged-but-unbilled one, and revenue accounting is the stream that must
//! not undercount.

use metrics::counter;
use remedy_core::{BillingRecord, HealStatus, HealingEvent, BASE_HEAL_PRICE};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::dedup::DedupGate;
use crate::error::Result;
use crate::event_log::{AppendOutcome, EventLog};
use crate::gateway::{BillingConfig, BillingGateway};
use crate::ledger::{RevenueEntry, RevenueLedger};
use crate::notify::NotificationLog;
use crate::summary::{RevenueReport, SummaryAggregator, SummaryStats};

/// Event log file name inside the data directory.
pub const EVENT_LOG_FILE: &str = "metrics_log.csv";
/// Recovery-priced pricing ledger file name.
pub const PRICING_LOG_FILE: &str = "healing_pricing.log";
/// Flat billing revenue ledger file name.
pub const REVENUE_LOG_FILE: &str = "healing_revenue.log";
/// Notification log file name.
pub const NOTIFICATION_LOG_FILE: &str = "flowxo_events.log";

/// Default suppression window for both dedup gates.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(6);

/// Pipeline configuration. Everything lives under `data_dir`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    /// Suppression window for healing events.
    pub healing_window: Duration,
    /// Suppression window for notifications.
    pub notification_window: Duration,
    pub billing: BillingConfig,
}

impl PipelineConfig {
    /// Defaults rooted at `data_dir`, billing in simulation mode.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            healing_window: DEFAULT_DEDUP_WINDOW,
            notification_window: DEFAULT_DEDUP_WINDOW,
            billing: BillingConfig::default(),
        }
    }
}

/// What happened to one submitted healing event.
#[derive(Debug)]
pub enum HealingOutcome {
    /// Suppressed as a duplicate; nothing was written or billed.
    Deduplicated,
    /// Accepted: billed, appended, and priced.
    Recorded {
        append: AppendOutcome,
        billing: BillingRecord,
        /// `None` if the pricing ledger write failed (logged, not fatal).
        revenue: Option<RevenueEntry>,
    },
}

/// The healing telemetry and monetization pipeline.
pub struct HealingPipeline {
    healing_gate: DedupGate,
    event_log: EventLog,
    pricing: RevenueLedger,
    gateway: BillingGateway,
    notifications: NotificationLog,
    aggregator: SummaryAggregator,
}

impl HealingPipeline {
    /// Build a pipeline over `config.data_dir`, creating the directory and
    /// healing the event log eagerly so startup surfaces integrity repairs.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let event_log_path = config.data_dir.join(EVENT_LOG_FILE);
        let revenue_log_path = config.data_dir.join(REVENUE_LOG_FILE);

        let event_log = EventLog::new(&event_log_path)?;
        event_log.ensure_integrity()?;

        Ok(Self {
            healing_gate: DedupGate::new(config.healing_window),
            event_log,
            pricing: RevenueLedger::new(config.data_dir.join(PRICING_LOG_FILE))?,
            gateway: BillingGateway::new(config.billing, &revenue_log_path)?,
            notifications: NotificationLog::new(
                config.data_dir.join(NOTIFICATION_LOG_FILE),
                config.notification_window,
            )?,
            aggregator: SummaryAggregator::new(event_log_path, revenue_log_path),
        })
    }

    /// Submit one healing event on behalf of `user_id`.
    ///
    /// Duplicates (same workflow, anomaly, and status inside the window)
    /// are dropped before any billing or I/O. An accepted event is billed
    /// exactly once, appended to the event log, and priced into the
    /// pricing ledger. A pricing write failure degrades the outcome, it
    /// does not fail the call.
    pub async fn record_healing(
        &self,
        user_id: &str,
        event: &HealingEvent,
    ) -> Result<HealingOutcome> {
        counter!("healing_events_total").increment(1);
        let event = event.clone().normalized();

        let key = format!("{}:{}:{}", event.workflow, event.anomaly, event.status);
        if !self.healing_gate.admit(&key) {
            counter!("healing_events_deduped_total").increment(1);
            info!(key, "duplicate healing event suppressed");
            return Ok(HealingOutcome::Deduplicated);
        }

        // Billing happens outside any file lock; it can block on the
        // network for up to the configured timeout.
        let billing = self
            .gateway
            .charge(user_id, &event.anomaly, BASE_HEAL_PRICE)
            .await;

        let append = self.event_log.append(&event)?;
        counter!("healing_events_recorded_total").increment(1);

        let revenue = match self.pricing.record(
            &event.workflow,
            &event.anomaly,
            event.recovery_pct,
            event.status == HealStatus::Success,
        ) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "pricing ledger write failed");
                None
            }
        };

        info!(
            workflow = %event.workflow,
            anomaly = %event.anomaly,
            status = %event.status,
            billing_status = %billing.status,
            "healing event recorded"
        );

        Ok(HealingOutcome::Recorded {
            append,
            billing,
            revenue,
        })
    }

    /// Record a notification; returns whether it was written (vs deduped).
    pub fn record_notification(
        &self,
        workflow: &str,
        anomaly: &str,
        user_id: &str,
    ) -> Result<bool> {
        self.notifications.record(workflow, anomaly, user_id)
    }

    // =========================================================================
    // Reporting (delegated to the read-only aggregator)
    // =========================================================================

    pub fn summary(&self) -> SummaryStats {
        self.aggregator.summarize()
    }

    pub fn revenue(&self) -> RevenueReport {
        self.aggregator.revenue()
    }

    pub fn revenue_for_day(&self, day: chrono::NaiveDate) -> RevenueReport {
        self.aggregator.revenue_for_day(day)
    }

    pub fn anomaly_mix(&self) -> std::collections::BTreeMap<String, u64> {
        self.aggregator.anomaly_mix()
    }

    pub fn recent_logs(&self, n: usize) -> Vec<String> {
        self.aggregator.recent_logs(n)
    }

    pub fn raw_log(&self) -> Option<String> {
        self.aggregator.raw_log()
    }

    pub fn recent_notifications(&self, n: usize) -> Vec<String> {
        self.notifications.recent(n)
    }
}
