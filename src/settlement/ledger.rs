use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::matching::DispatchRepository;

/// The caller-side ordered listing of settled-or-settling rides.
///
/// Reconciliation is count-based against this listing, so it is the
/// isolation point for swapping in an idempotency-key scheme later
/// without touching the retry/backoff logic.
#[async_trait]
pub trait SettledRideSource: Send + Sync {
    /// Ride ids in creation order, matching the gateway's record order.
    async fn completed_rides(&self) -> anyhow::Result<Vec<Uuid>>;
}

/// Production ledger: one rider's completed rides, oldest first.
pub struct CompletedRideLedger {
    repository: Arc<DispatchRepository>,
    user_id: Uuid,
}

impl CompletedRideLedger {
    pub fn new(repository: Arc<DispatchRepository>, user_id: Uuid) -> Self {
        Self { repository, user_id }
    }
}

#[async_trait]
impl SettledRideSource for CompletedRideLedger {
    async fn completed_rides(&self) -> anyhow::Result<Vec<Uuid>> {
        let rides = self
            .repository
            .completed_rides_for_user(self.user_id)
            .await
            .map_err(anyhow::Error::new)?;
        Ok(rides.into_iter().map(|r| r.id).collect())
    }
}
