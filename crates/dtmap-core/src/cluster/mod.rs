pub mod engine;
pub mod map;

pub use engine::{BatchOutcome, ClusterSource, ClusteringEngine};
pub use map::ClusterMap;
