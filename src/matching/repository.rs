use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppResult;
use super::engine::{ChairLocator, DispatchStore};
use super::geo::BoundingBox;
use super::models::{AssignOutcome, ChairCandidate, Ride};

/// Dispatch repository - all persistent reads/writes for matching and
/// the settlement-side ride ledger.
pub struct DispatchRepository {
    pub pool: PgPool,
}

impl DispatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ride_by_id(&self, ride_id: Uuid) -> AppResult<Option<Ride>> {
        let ride = sqlx::query_as::<_, Ride>(
            r#"
            SELECT id, user_id, pickup_latitude, pickup_longitude,
                   destination_latitude, destination_longitude,
                   chair_id, created_at, updated_at
            FROM rides
            WHERE id = $1
            "#,
        )
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ride)
    }

    /// Latest entry in the append-only status log for a ride.
    pub async fn latest_ride_status(&self, ride_id: Uuid) -> AppResult<Option<String>> {
        let status = sqlx::query_scalar::<_, String>(
            r#"
            SELECT status
            FROM ride_statuses
            WHERE ride_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(status)
    }

    /// Rides the rider considers settled-or-settling, in creation order.
    /// Order matters: reconciliation compares this listing positionally
    /// against the gateway's records.
    pub async fn completed_rides_for_user(&self, user_id: Uuid) -> AppResult<Vec<Ride>> {
        let rides = sqlx::query_as::<_, Ride>(
            r#"
            SELECT r.id, r.user_id, r.pickup_latitude, r.pickup_longitude,
                   r.destination_latitude, r.destination_longitude,
                   r.chair_id, r.created_at, r.updated_at
            FROM rides r
            WHERE r.user_id = $1
              AND (
                  SELECT rs.status
                  FROM ride_statuses rs
                  WHERE rs.ride_id = r.id
                  ORDER BY rs.created_at DESC
                  LIMIT 1
              ) = 'COMPLETED'
            ORDER BY r.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rides)
    }

    /// Bearer credential the rider registered with the payment gateway.
    pub async fn payment_token(&self, user_id: Uuid) -> AppResult<Option<String>> {
        let token = sqlx::query_scalar::<_, String>(
            "SELECT token FROM payment_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }
}

#[async_trait]
impl DispatchStore for DispatchRepository {
    /// The oldest ride with no chair assigned, read without any lock.
    /// The assignment transaction re-checks eligibility under a row lock.
    async fn oldest_unmatched_ride(&self) -> AppResult<Option<Ride>> {
        let ride = sqlx::query_as::<_, Ride>(
            r#"
            SELECT id, user_id, pickup_latitude, pickup_longitude,
                   destination_latitude, destination_longitude,
                   chair_id, created_at, updated_at
            FROM rides
            WHERE chair_id IS NULL
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(ride)
    }

    /// Assign `chair_id` to `ride_id` atomically.
    ///
    /// The search already happened without locks, so this transaction
    /// re-validates both sides: the ride row is re-taken with
    /// FOR UPDATE SKIP LOCKED (a concurrent invocation that holds it is
    /// skipped, not blocked) and the chair flip is conditional on the
    /// chair still being eligible. Either check failing rolls the whole
    /// transaction back and leaves the ride matchable for the next poll.
    async fn assign(&self, ride_id: Uuid, chair_id: Uuid) -> AppResult<AssignOutcome> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM rides
            WHERE id = $1 AND chair_id IS NULL
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(ride_id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            return Ok(AssignOutcome::RideUnavailable);
        }

        let chair_flipped = sqlx::query(
            r#"
            UPDATE chairs
            SET is_in_use = TRUE, updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE AND is_in_use = FALSE
            "#,
        )
        .bind(chair_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if chair_flipped == 0 {
            return Ok(AssignOutcome::ChairUnavailable);
        }

        sqlx::query(
            r#"
            UPDATE rides
            SET chair_id = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(chair_id)
        .bind(ride_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(AssignOutcome::Assigned)
    }
}

#[async_trait]
impl ChairLocator for DispatchRepository {
    /// Eligible chairs whose most recent location sample falls inside
    /// the box. Plain pool read, no transaction held.
    async fn candidates_in_box(&self, bbox: BoundingBox) -> AppResult<Vec<ChairCandidate>> {
        let candidates = sqlx::query_as::<_, ChairCandidate>(
            r#"
            SELECT c.id, cl.latitude, cl.longitude
            FROM chairs c
            INNER JOIN (
                SELECT DISTINCT ON (chair_id) chair_id, latitude, longitude
                FROM chair_locations
                ORDER BY chair_id, created_at DESC
            ) cl ON cl.chair_id = c.id
            WHERE c.is_active = TRUE
              AND c.is_in_use = FALSE
              AND cl.latitude BETWEEN $1 AND $2
              AND cl.longitude BETWEEN $3 AND $4
            "#,
        )
        .bind(bbox.min_latitude)
        .bind(bbox.max_latitude)
        .bind(bbox.min_longitude)
        .bind(bbox.max_longitude)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }
}
