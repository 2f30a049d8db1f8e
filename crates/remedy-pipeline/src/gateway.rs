//! Billing gateway with tiered degradation.
//!
//! Every accepted healing event produces exactly one [`BillingRecord`] and
//! exactly one line in the flat billing ledger, whatever happens on the
//! network:
//!
//! | tier | condition                       | status            | mode        |
//! |------|---------------------------------|-------------------|-------------|
//! | 1    | no API key configured           | `simulated`       | local       |
//! | 2    | remote accepted (200/201)       | `success`         | real        |
//! | 2b   | remote rejected (other code)    | `fallback_logged` | real-failed |
//! | 3    | transport error / timeout       | `exception`       | fallback    |
//!
//! [`BillingGateway::charge`] never returns an error and never panics; a
//! billing problem degrades the record, it does not take the healing
//! pipeline down with it.

use chrono::Utc;
use remedy_core::metrics::record_billing_tier;
use remedy_core::{ledger_timestamp, BillingMode, BillingRecord, BillingStatus};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ledger::LedgerFile;

/// Default remote charge endpoint.
pub const DEFAULT_BILLING_ENDPOINT: &str = "https://api.paywalls.ai/v1/user/charge";

/// Hard ceiling on a remote billing attempt.
pub const BILLING_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote billing configuration.
///
/// With `api_key: None` the gateway runs entirely in the local simulation
/// tier and never touches the network.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_BILLING_ENDPOINT.to_string(),
            timeout: BILLING_TIMEOUT,
        }
    }
}

impl BillingConfig {
    /// Load configuration from the environment.
    ///
    /// Reads `PAYWALLS_API_KEY` (falling back to `PAYWALLS_KEY`) and an
    /// optional `PAYWALLS_URL` endpoint override. Absent or empty keys
    /// leave the gateway in simulation mode.
    pub fn from_env() -> Self {
        let api_key = std::env::var("PAYWALLS_API_KEY")
            .or_else(|_| std::env::var("PAYWALLS_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());

        let endpoint = std::env::var("PAYWALLS_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BILLING_ENDPOINT.to_string());

        Self {
            api_key,
            endpoint,
            timeout: BILLING_TIMEOUT,
        }
    }
}

/// Charges users for healing events, degrading through the tiers above.
pub struct BillingGateway {
    config: BillingConfig,
    client: reqwest::Client,
    ledger: LedgerFile,
}

impl BillingGateway {
    /// Create a gateway writing its ledger at `ledger_path`.
    pub fn new<P: AsRef<Path>>(config: BillingConfig, ledger_path: P) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(crate::error::Error::RemoteBilling)?;

        Ok(Self {
            config,
            client,
            ledger: LedgerFile::new(ledger_path)?,
        })
    }

    /// Whether a real remote attempt will be made.
    pub fn is_live(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Charge `user` the given cost for one heal.
    ///
    /// Infallible by contract: always returns a record and always writes
    /// exactly one ledger line (a failed ledger write is logged, never
    /// raised — billing must not block healing).
    pub async fn charge(&self, user: &str, heal_type: &str, cost: f64) -> BillingRecord {
        let timestamp = ledger_timestamp(Utc::now());

        let record = match &self.config.api_key {
            None => {
                debug!(user, heal_type, cost, "no billing credential, simulating charge");
                BillingRecord {
                    timestamp,
                    user: user.to_string(),
                    heal_type: heal_type.to_string(),
                    amount: cost,
                    status: BillingStatus::Simulated,
                    mode: BillingMode::Local,
                    http_code: None,
                    response: None,
                }
            }
            Some(key) => match self.attempt_remote(key, user, heal_type, cost).await {
                Ok((code, body)) if code == 200 || code == 201 => {
                    info!(user, heal_type, cost, code, "remote charge confirmed");
                    BillingRecord {
                        timestamp,
                        user: user.to_string(),
                        heal_type: heal_type.to_string(),
                        amount: cost,
                        status: BillingStatus::Success,
                        mode: BillingMode::Real,
                        http_code: Some(code),
                        response: body,
                    }
                }
                Ok((code, _)) => {
                    warn!(user, heal_type, code, "remote charge rejected, logging fallback");
                    BillingRecord {
                        timestamp,
                        user: user.to_string(),
                        heal_type: heal_type.to_string(),
                        amount: cost,
                        status: BillingStatus::FallbackLogged,
                        mode: BillingMode::RealFailed,
                        http_code: Some(code),
                        response: None,
                    }
                }
                Err(e) => {
                    warn!(user, heal_type, error = %e, "remote charge failed, falling back");
                    BillingRecord {
                        timestamp,
                        user: user.to_string(),
                        heal_type: heal_type.to_string(),
                        amount: cost,
                        status: BillingStatus::Exception,
                        mode: BillingMode::Fallback,
                        http_code: None,
                        response: None,
                    }
                }
            },
        };

        record_billing_tier(record.status.as_str());
        self.write_ledger(&record);
        record
    }

    /// POST the charge to the remote API. Transport failures surface as
    /// `Err`; any HTTP response, success or not, is `Ok`.
    async fn attempt_remote(
        &self,
        api_key: &str,
        user: &str,
        heal_type: &str,
        cost: f64,
    ) -> Result<(u16, Option<Value>)> {
        let payload = json!({
            "user": user,
            "amount": format!("{:.2}", cost),
            "currency": "USD",
            "metadata": {
                "heal_type": heal_type,
                "timestamp": Utc::now().to_rfc3339(),
            },
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let code = response.status().as_u16();
        let body = response.json::<Value>().await.ok();
        Ok((code, body))
    }

    /// Append the record's ledger line. Logged on failure, never raised.
    fn write_ledger(&self, record: &BillingRecord) {
        if let Err(e) = self.ledger.append_line(&record.ledger_line()) {
            warn!(error = %e, "billing ledger write failed");
        }
    }
}
