use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::geo::Coordinate;

/// A transportation request awaiting or holding a chair assignment.
///
/// `chair_id` is set at most once (by the matching engine) and never
/// cleared; status transitions live in the append-only `ride_statuses`
/// log, not on this row.
#[derive(Debug, Clone, FromRow)]
pub struct Ride {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub chair_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn pickup(&self) -> Coordinate {
        Coordinate::new(self.pickup_latitude, self.pickup_longitude)
    }

    pub fn destination(&self) -> Coordinate {
        Coordinate::new(self.destination_latitude, self.destination_longitude)
    }
}

/// An eligible chair inside the current search ring, with its most
/// recent known location.
#[derive(Debug, Clone, FromRow)]
pub struct ChairCandidate {
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

impl ChairCandidate {
    pub fn location(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// How the short assignment transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    /// Ride and chair were committed as a pair.
    Assigned,
    /// The ride was locked or matched by a concurrent invocation.
    RideUnavailable,
    /// The chair was deactivated or taken between search and commit.
    ChairUnavailable,
}

/// Outcome of one matching invocation. The poller-facing endpoint
/// collapses everything but storage errors to an empty 204.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A chair was assigned to the oldest unmatched ride.
    Matched,
    /// No unmatched ride exists right now.
    NoRideAvailable,
    /// A ride exists but no eligible chair was found within the search
    /// ceiling, or the candidate was taken by a concurrent invocation.
    NoChairAvailable,
}
