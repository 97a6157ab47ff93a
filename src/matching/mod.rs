// Dispatch matching: pairs the oldest unmatched ride with the nearest
// eligible chair via an expanding bounding-box search.
pub mod engine;
pub mod geo;
pub mod models;
pub mod repository;

pub use engine::{ChairLocator, DispatchStore, MatchingConfig, MatchingEngine};
pub use models::MatchOutcome;
pub use repository::DispatchRepository;
