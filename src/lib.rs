//! Stop Place Registry - In-Memory Transit Stop Index
//!
//! This library provides an in-memory registry of transit stop places (stations,
//! terminals) and their quays (boarding points), with exact-match indexes and a
//! spatial index over quay centroids for polygon-containment queries.
//!
//! # Architecture
//!
//! - **[`StopPlace`] / [`Quay`]**: Entity model, pure data
//! - **[`StopPlaceIndex`]**: Exact-match indexes with parent/child cascade removal
//! - **[`SpatialIndex`]**: R-tree over quay centroids with atomic whole-index swap
//! - **[`StopPlaceFilter`]**: Filter descriptors composed by the filter engine
//! - **[`StopPlaceRegistry`]**: High-level facade owning the components above
//!
//! # Concurrency
//!
//! The registry is a shared, long-lived service. Exact indexes take per-entry
//! atomic updates; the spatial index is rebuilt off to the side and published
//! with a single reference swap, so concurrent readers see either the fully-old
//! or fully-new index, never a partial one.

mod filter;
mod index;
mod model;
mod registry;
mod spatial;

// Public API exports
pub use filter::StopPlaceFilter;
pub use index::StopPlaceIndex;
pub use model::{BoundingBox, Quay, StopPlace, TransportMode};
pub use registry::{
    DataLoadError, StopPlaceDataLoader, StopPlaceDataset, StopPlaceRegistry,
};
pub use spatial::SpatialIndex;

/// Error types for the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
