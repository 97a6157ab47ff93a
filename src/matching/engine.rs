use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppResult;
use super::geo::{haversine_km, BoundingBox, Coordinate};
use super::models::{AssignOutcome, ChairCandidate, MatchOutcome, Ride};

/// Candidate lookup seam for the expanding-radius search.
///
/// Production queries the chair/location tables; tests plug in an
/// in-memory implementation.
#[async_trait]
pub trait ChairLocator: Send + Sync {
    async fn candidates_in_box(&self, bbox: BoundingBox) -> AppResult<Vec<ChairCandidate>>;
}

/// Ride selection and assignment seam for the matching engine.
///
/// Production is the dispatch repository over Postgres; tests drive the
/// outcome mapping with an in-memory store.
#[async_trait]
pub trait DispatchStore: ChairLocator {
    /// The oldest ride with no chair assigned, read without any lock.
    async fn oldest_unmatched_ride(&self) -> AppResult<Option<Ride>>;

    /// Commit the ride/chair pair, re-validating both sides under a
    /// row lock.
    async fn assign(&self, ride_id: Uuid, chair_id: Uuid) -> AppResult<AssignOutcome>;
}

/// Tunables for the expanding-radius search.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Ring growth per step, in distance units. Must be positive;
    /// `Config::from_env` rejects anything else at startup.
    pub step_distance: f64,
    /// Search ceiling, in distance units.
    pub max_distance: f64,
    /// Pause between rings. A backpressure valve on the store during
    /// repeated widening, not a correctness mechanism; tests run with
    /// zero.
    pub expansion_pause: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            step_distance: 25.0,
            max_distance: 150.0,
            expansion_pause: Duration::from_millis(100),
        }
    }
}

/// Expanding-radius search: widen a square bounding box around the
/// pickup point in `step_distance` increments and stop at the first
/// non-empty ring, ranked by exact haversine distance.
///
/// Deliberately not globally nearest: a closer chair just outside the
/// first non-empty box is never considered. Runs over plain reads and
/// never inside a transaction, so the pause between rings holds no lock.
pub async fn find_nearest_chair<L: ChairLocator + ?Sized>(
    locator: &L,
    pickup: Coordinate,
    config: &MatchingConfig,
) -> AppResult<Option<ChairCandidate>> {
    // A non-positive step would never advance the radius; treat it as
    // an empty search rather than spinning forever.
    if config.step_distance <= 0.0 {
        warn!(
            step_distance = config.step_distance,
            "non-positive search step, skipping expansion"
        );
        return Ok(None);
    }

    let mut radius = config.step_distance;

    while radius <= config.max_distance {
        let bbox = BoundingBox::around(pickup, radius);
        let candidates = locator.candidates_in_box(bbox).await?;

        let nearest = candidates.into_iter().min_by(|a, b| {
            let da = haversine_km(pickup, a.location());
            let db = haversine_km(pickup, b.location());
            da.total_cmp(&db)
        });

        if let Some(chair) = nearest {
            debug!(
                chair_id = %chair.id,
                radius,
                distance_km = haversine_km(pickup, chair.location()),
                "chair found in search ring"
            );
            return Ok(Some(chair));
        }

        radius += config.step_distance;
        if radius <= config.max_distance {
            debug!("expanding search range to {:.2}", radius);
            tokio::time::sleep(config.expansion_pause).await;
        }
    }

    Ok(None)
}

/// Dispatch matching engine.
///
/// Stateless between invocations; the external poller owns the cadence.
/// Each invocation performs at most one match attempt.
pub struct MatchingEngine<S: DispatchStore> {
    store: Arc<S>,
    config: MatchingConfig,
}

impl<S: DispatchStore> MatchingEngine<S> {
    pub fn new(store: Arc<S>, config: MatchingConfig) -> Self {
        Self { store, config }
    }

    /// One match attempt: pick the oldest unmatched ride, search for the
    /// nearest eligible chair, then commit the pair in a short
    /// transaction that re-validates both sides under a row lock.
    ///
    /// A race lost after the unlocked search surfaces as the
    /// corresponding no-op outcome; the next poll simply tries again.
    pub async fn attempt_match(&self) -> AppResult<MatchOutcome> {
        let Some(ride) = self.store.oldest_unmatched_ride().await? else {
            return Ok(MatchOutcome::NoRideAvailable);
        };

        let Some(chair) =
            find_nearest_chair(self.store.as_ref(), ride.pickup(), &self.config).await?
        else {
            info!(ride_id = %ride.id, "no eligible chair within search ceiling");
            return Ok(MatchOutcome::NoChairAvailable);
        };

        match self.store.assign(ride.id, chair.id).await? {
            AssignOutcome::Assigned => {
                info!(ride_id = %ride.id, chair_id = %chair.id, "ride matched");
                Ok(MatchOutcome::Matched)
            }
            AssignOutcome::RideUnavailable => {
                debug!(ride_id = %ride.id, "ride taken by a concurrent invocation");
                Ok(MatchOutcome::NoRideAvailable)
            }
            AssignOutcome::ChairUnavailable => {
                debug!(chair_id = %chair.id, "chair taken by a concurrent invocation");
                Ok(MatchOutcome::NoChairAvailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    struct StaticLocator {
        chairs: Vec<ChairCandidate>,
        queried_boxes: Mutex<Vec<BoundingBox>>,
    }

    impl StaticLocator {
        fn new(chairs: Vec<ChairCandidate>) -> Self {
            Self {
                chairs,
                queried_boxes: Mutex::new(Vec::new()),
            }
        }

        fn rings_queried(&self) -> usize {
            self.queried_boxes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChairLocator for StaticLocator {
        async fn candidates_in_box(&self, bbox: BoundingBox) -> AppResult<Vec<ChairCandidate>> {
            self.queried_boxes.lock().unwrap().push(bbox);
            Ok(self
                .chairs
                .iter()
                .filter(|c| bbox.contains(c.location()))
                .cloned()
                .collect())
        }
    }

    /// In-memory dispatch store with a scripted assignment outcome.
    struct FakeStore {
        ride: Option<Ride>,
        locator: StaticLocator,
        assign_result: AssignOutcome,
        assignments: Mutex<Vec<(Uuid, Uuid)>>,
    }

    impl FakeStore {
        fn new(ride: Option<Ride>, chairs: Vec<ChairCandidate>, assign_result: AssignOutcome) -> Self {
            Self {
                ride,
                locator: StaticLocator::new(chairs),
                assign_result,
                assignments: Mutex::new(Vec::new()),
            }
        }

        fn assignments(&self) -> Vec<(Uuid, Uuid)> {
            self.assignments.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChairLocator for FakeStore {
        async fn candidates_in_box(&self, bbox: BoundingBox) -> AppResult<Vec<ChairCandidate>> {
            self.locator.candidates_in_box(bbox).await
        }
    }

    #[async_trait]
    impl DispatchStore for FakeStore {
        async fn oldest_unmatched_ride(&self) -> AppResult<Option<Ride>> {
            Ok(self.ride.clone())
        }

        async fn assign(&self, ride_id: Uuid, chair_id: Uuid) -> AppResult<AssignOutcome> {
            self.assignments.lock().unwrap().push((ride_id, chair_id));
            Ok(self.assign_result)
        }
    }

    fn chair_at(latitude: f64, longitude: f64) -> ChairCandidate {
        ChairCandidate {
            id: Uuid::new_v4(),
            latitude,
            longitude,
        }
    }

    fn ride_at(latitude: f64, longitude: f64) -> Ride {
        let now = Utc::now();
        Ride {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            pickup_latitude: latitude,
            pickup_longitude: longitude,
            destination_latitude: latitude,
            destination_longitude: longitude,
            chair_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_config() -> MatchingConfig {
        MatchingConfig {
            step_distance: 25.0,
            max_distance: 150.0,
            expansion_pause: Duration::ZERO,
        }
    }

    fn engine(store: FakeStore) -> (MatchingEngine<FakeStore>, Arc<FakeStore>) {
        let store = Arc::new(store);
        (MatchingEngine::new(store.clone(), test_config()), store)
    }

    #[tokio::test]
    async fn picks_minimum_distance_chair_in_first_ring() {
        let pickup = Coordinate::new(35.681, 139.767);
        let near = chair_at(35.690, 139.700);
        let far = chair_at(35.681, 139.900);
        let near_id = near.id;

        let locator = StaticLocator::new(vec![far, near]);
        let found = find_nearest_chair(&locator, pickup, &test_config())
            .await
            .unwrap()
            .expect("chair expected in first ring");

        assert_eq!(found.id, near_id);
        assert_eq!(locator.rings_queried(), 1);
    }

    #[tokio::test]
    async fn stops_at_first_non_empty_ring() {
        let pickup = Coordinate::new(0.0, 0.0);
        // Inside the first 25-unit box.
        let in_ring = chair_at(20.0, 0.0);
        // Outside it; never considered once the first ring is non-empty.
        let outside = chair_at(0.0, 40.0);

        let locator = StaticLocator::new(vec![outside, in_ring.clone()]);
        let found = find_nearest_chair(&locator, pickup, &test_config())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, in_ring.id);
        assert_eq!(locator.rings_queried(), 1);
    }

    #[tokio::test]
    async fn expands_until_a_chair_appears() {
        let pickup = Coordinate::new(0.0, 0.0);
        // Outside the first two boxes (25, 50), inside the third (75).
        let distant = chair_at(60.0, 0.0);
        let distant_id = distant.id;

        let locator = StaticLocator::new(vec![distant]);
        let found = find_nearest_chair(&locator, pickup, &test_config())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, distant_id);
        assert_eq!(locator.rings_queried(), 3);
    }

    #[tokio::test]
    async fn gives_up_past_the_ceiling() {
        let pickup = Coordinate::new(0.0, 0.0);
        // Beyond the 150-unit ceiling in latitude terms.
        let unreachable = chair_at(-170.0, 0.0);

        let locator = StaticLocator::new(vec![unreachable]);
        let found = find_nearest_chair(&locator, pickup, &test_config())
            .await
            .unwrap();

        assert!(found.is_none());
        // 150 / 25 rings, each queried exactly once.
        assert_eq!(locator.rings_queried(), 6);
    }

    #[tokio::test]
    async fn empty_world_yields_no_chair() {
        let locator = StaticLocator::new(Vec::new());
        let found = find_nearest_chair(&locator, Coordinate::new(0.0, 0.0), &test_config())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn non_positive_step_terminates_without_querying() {
        let locator = StaticLocator::new(vec![chair_at(0.0, 0.0)]);
        let config = MatchingConfig {
            step_distance: 0.0,
            max_distance: 150.0,
            expansion_pause: Duration::ZERO,
        };

        let found = find_nearest_chair(&locator, Coordinate::new(0.0, 0.0), &config)
            .await
            .unwrap();

        assert!(found.is_none());
        assert_eq!(locator.rings_queried(), 0);
    }

    #[tokio::test]
    async fn no_unmatched_ride_is_a_no_op() {
        let (engine, store) = engine(FakeStore::new(None, vec![chair_at(0.0, 0.0)], AssignOutcome::Assigned));

        let outcome = engine.attempt_match().await.unwrap();

        assert_eq!(outcome, MatchOutcome::NoRideAvailable);
        assert!(store.assignments().is_empty());
    }

    #[tokio::test]
    async fn empty_ceiling_reports_no_chair_and_writes_nothing() {
        let (engine, store) = engine(FakeStore::new(
            Some(ride_at(0.0, 0.0)),
            Vec::new(),
            AssignOutcome::Assigned,
        ));

        let outcome = engine.attempt_match().await.unwrap();

        assert_eq!(outcome, MatchOutcome::NoChairAvailable);
        assert!(store.assignments().is_empty());
    }

    #[tokio::test]
    async fn committed_pair_reports_matched() {
        let ride = ride_at(35.681, 139.767);
        let chair = chair_at(35.690, 139.700);
        let (ride_id, chair_id) = (ride.id, chair.id);

        let (engine, store) = engine(FakeStore::new(Some(ride), vec![chair], AssignOutcome::Assigned));

        let outcome = engine.attempt_match().await.unwrap();

        assert_eq!(outcome, MatchOutcome::Matched);
        assert_eq!(store.assignments(), vec![(ride_id, chair_id)]);
    }

    #[tokio::test]
    async fn ride_lost_to_concurrent_invocation_downgrades_to_no_ride() {
        let (engine, store) = engine(FakeStore::new(
            Some(ride_at(0.0, 0.0)),
            vec![chair_at(0.1, 0.1)],
            AssignOutcome::RideUnavailable,
        ));

        let outcome = engine.attempt_match().await.unwrap();

        assert_eq!(outcome, MatchOutcome::NoRideAvailable);
        // Exactly one attempt; the next poll owns the retry.
        assert_eq!(store.assignments().len(), 1);
    }

    #[tokio::test]
    async fn chair_lost_to_concurrent_invocation_downgrades_to_no_chair() {
        let (engine, _store) = engine(FakeStore::new(
            Some(ride_at(0.0, 0.0)),
            vec![chair_at(0.1, 0.1)],
            AssignOutcome::ChairUnavailable,
        ));

        let outcome = engine.attempt_match().await.unwrap();

        assert_eq!(outcome, MatchOutcome::NoChairAvailable);
    }
}
