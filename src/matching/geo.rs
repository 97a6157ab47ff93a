/// Mean Earth radius in kilometers, shared by distance and fare math.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Base fare charged for every ride, in currency units.
pub const INITIAL_FARE: i64 = 500;

/// Fare charged per whole kilometer of pickup-to-destination distance.
pub const FARE_PER_KM: i64 = 100;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A square latitude/longitude filter used to pre-select candidates
/// before exact ranking.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Square box of `half_width` around `center`, in both axes.
    pub fn around(center: Coordinate, half_width: f64) -> Self {
        Self {
            min_latitude: center.latitude - half_width,
            max_latitude: center.latitude + half_width,
            min_longitude: center.longitude - half_width,
            max_longitude: center.longitude + half_width,
        }
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        point.latitude >= self.min_latitude
            && point.latitude <= self.max_latitude
            && point.longitude >= self.min_longitude
            && point.longitude <= self.max_longitude
    }
}

/// Great-circle distance between two points in kilometers (haversine).
///
/// The bounding-box filter is only a cheap pre-selection; final candidate
/// ranking always uses this exact distance.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlng = (dlng * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Fare for a ride: base fare plus a per-kilometer charge on the
/// pickup-to-destination great-circle distance, truncated to whole km.
pub fn calculate_fare(pickup: Coordinate, destination: Coordinate) -> i64 {
    INITIAL_FARE + FARE_PER_KM * haversine_km(pickup, destination) as i64
}
