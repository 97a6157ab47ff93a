use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PaymentError;
use super::ledger::SettledRideSource;

#[derive(Debug, Serialize)]
struct PostPaymentRequest {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct PaymentRecord {
    #[allow(dead_code)]
    amount: i64,
    #[allow(dead_code)]
    status: String,
}

/// Retry tunables for the settlement client.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first submission; budget+1 submissions total.
    pub max_retries: u32,
    /// Fixed base delay before each resubmission.
    pub backoff: Duration,
    /// Upper bound of the uniform jitter added to the base delay, ms.
    pub jitter_ms: u64,
    /// Per-request timeout; doubles as the cancellation bound.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_millis(100),
            jitter_ms: 200,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Client side of the external payment gateway.
///
/// The gateway may time out, answer with unexpected statuses, or apply
/// a payment without the response ever arriving. A failed submission is
/// therefore reconciled against the caller's ride ledger before being
/// retried: if the gateway already holds as many records as the ledger
/// lists rides, the lost submission is treated as applied upstream.
///
/// Reconciliation compares counts and order only, never identifiers.
/// It cannot detect reordering or duplication; drift is assumed to be
/// one missing record at the tail.
pub struct PaymentGatewayClient {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl PaymentGatewayClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            policy,
        }
    }

    /// Submit one settlement, retrying with randomized backoff up to the
    /// retry budget. Terminal failure wraps the last underlying cause.
    ///
    /// Issues one POST per attempt and one reconciliation GET per failed
    /// attempt; writes nothing persistent. Cancellation is the caller
    /// dropping this future: no retry fires afterward.
    pub async fn request_post_payment<S: SettledRideSource + ?Sized>(
        &self,
        gateway_url: &str,
        token: &str,
        amount: i64,
        ledger: &S,
    ) -> Result<(), PaymentError> {
        let mut attempt: u32 = 0;

        loop {
            let submit_err = match self.submit(gateway_url, token, amount).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            warn!(attempt, error = %submit_err, "payment submission failed, reconciling");

            match self.verify_payments(gateway_url, token, ledger).await {
                Ok(()) => {
                    // Counts agree: the lost submission was applied upstream.
                    info!(attempt, "settlement reconciled as already applied");
                    return Ok(());
                }
                Err(verify_err) => {
                    if attempt >= self.policy.max_retries {
                        return Err(PaymentError::RetryBudgetExhausted(Box::new(verify_err)));
                    }
                    attempt += 1;
                    tokio::time::sleep(self.backoff_with_jitter()).await;
                }
            }
        }
    }

    async fn submit(
        &self,
        gateway_url: &str,
        token: &str,
        amount: i64,
    ) -> Result<(), PaymentError> {
        let response = self
            .http
            .post(format!("{}/payments", gateway_url))
            .bearer_auth(token)
            .timeout(self.policy.request_timeout)
            .json(&PostPaymentRequest { amount })
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::NO_CONTENT {
            return Err(PaymentError::UnexpectedStatus(response.status()));
        }
        Ok(())
    }

    /// Reconciliation pass: the gateway's full record listing against
    /// the caller's ride ledger, compared by length alone.
    async fn verify_payments<S: SettledRideSource + ?Sized>(
        &self,
        gateway_url: &str,
        token: &str,
        ledger: &S,
    ) -> Result<(), PaymentError> {
        let response = self
            .http
            .get(format!("{}/payments", gateway_url))
            .bearer_auth(token)
            .timeout(self.policy.request_timeout)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(PaymentError::UnexpectedStatus(response.status()));
        }

        let payments: Vec<PaymentRecord> = response.json().await?;
        let rides = ledger
            .completed_rides()
            .await
            .map_err(PaymentError::Ledger)?;

        if rides.len() != payments.len() {
            return Err(PaymentError::ReconciliationMismatch {
                local: rides.len(),
                remote: payments.len(),
            });
        }

        Ok(())
    }

    fn backoff_with_jitter(&self) -> Duration {
        let jitter = rand::rng().random_range(0..=self.policy.jitter_ms);
        self.policy.backoff + Duration::from_millis(jitter)
    }
}
