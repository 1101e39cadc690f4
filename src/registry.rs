//! Registry facade over the exact indexes, the spatial index and the
//! filter engine
//!
//! The registry is an explicit service object with injected collaborators
//! rather than ambient global state, so tests can construct isolated
//! instances. All operations are in-memory and synchronous; batch mutations
//! trigger exactly one spatial rebuild per call.

use crate::{
    Quay, RegistryError, Result, SpatialIndex, StopPlace, StopPlaceFilter, StopPlaceIndex, filter,
};
use chrono::{DateTime, Utc};
use geo::Polygon;
use std::sync::{Arc, RwLock};

/// Error type produced by a data loader; implementation-defined
pub type DataLoadError = Box<dyn std::error::Error + Send + Sync>;

/// The initial bulk stop place set and its upstream publication timestamp
pub struct StopPlaceDataset {
    pub stop_places: Vec<StopPlace>,
    pub publication_time: DateTime<Utc>,
}

/// External collaborator supplying the initial stop place dataset
///
/// A failing load is not fatal to startup: the registry logs and starts
/// empty instead of propagating the error.
pub trait StopPlaceDataLoader: Send + Sync {
    fn load_stop_places(&self) -> std::result::Result<StopPlaceDataset, DataLoadError>;
}

/// Public query and mutation surface of the stop place registry
pub struct StopPlaceRegistry {
    index: StopPlaceIndex,
    spatial: SpatialIndex,
    loader: Option<Arc<dyn StopPlaceDataLoader>>,
    publication_time: RwLock<Option<DateTime<Utc>>>,
}

impl StopPlaceRegistry {
    /// Create an empty registry without a data loader
    pub fn new() -> Self {
        Self {
            index: StopPlaceIndex::new(),
            spatial: SpatialIndex::new(),
            loader: None,
            publication_time: RwLock::new(None),
        }
    }

    /// Create an empty registry that bootstraps from `loader` on [`init`](Self::init)
    pub fn with_loader(loader: Arc<dyn StopPlaceDataLoader>) -> Self {
        Self {
            loader: Some(loader),
            ..Self::new()
        }
    }

    /// Bootstrap from the configured data loader, if any
    ///
    /// On success the exact indexes are bulk-loaded, the spatial index is
    /// rebuilt once from the full set and the publication timestamp is
    /// recorded. On failure the registry logs and stays empty.
    pub fn init(&self) {
        let Some(loader) = &self.loader else {
            tracing::debug!("no stop place data loader configured, starting empty");
            return;
        };

        match loader.load_stop_places() {
            Ok(dataset) => {
                let loaded = dataset.stop_places.len();
                self.index.load_bulk_data(dataset.stop_places);
                self.spatial.rebuild(&self.index.all_stop_places());
                self.set_publication_time(dataset.publication_time);
                tracing::debug!(loaded, "initialised stop place registry from data loader");
            }
            Err(error) => {
                tracing::error!(%error, "stop place data load failed, starting empty");
            }
        }
    }

    /// Insert or replace a batch of stop places
    ///
    /// Entries without an id are skipped with a warning. The spatial index
    /// is rebuilt exactly once after the entire batch, regardless of batch
    /// size.
    pub fn create_or_update_stop_places(&self, stop_places: Vec<StopPlace>) -> Result<()> {
        if stop_places.is_empty() {
            return Ok(());
        }

        let mut touched = false;
        for stop_place in stop_places {
            if stop_place.id.trim().is_empty() {
                tracing::warn!("skipping stop place without an id");
                continue;
            }
            let id = stop_place.id.clone();
            if self.index.stop_place_by_id(&id).is_some() {
                self.index.update_stop_place(&id, stop_place)?;
            } else {
                self.index.add_stop_place(stop_place)?;
            }
            touched = true;
        }

        if touched {
            self.spatial.rebuild(&self.index.all_stop_places());
        }
        Ok(())
    }

    /// Remove a stop place and every stop place whose parent chain reaches it
    ///
    /// Returns the ids actually removed. Fails with `InvalidArgument` on an
    /// empty id; removing an unknown id is not an error and removes nothing.
    pub fn delete_stop_place_and_related(&self, id: &str) -> Result<Vec<String>> {
        if id.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "stop place id must not be empty".to_string(),
            ));
        }

        let removed = self.index.remove_stop_place_and_related(id);
        if !removed.is_empty() {
            self.spatial.rebuild(&self.index.all_stop_places());
        }
        Ok(removed)
    }

    /// Look up the stop place owning the given quay id
    #[inline]
    pub fn stop_place_by_quay_ref(&self, quay_id: &str) -> Option<Arc<StopPlace>> {
        self.index.stop_place_by_quay_ref(quay_id)
    }

    /// Look up a stop place by its id
    #[inline]
    pub fn stop_place_by_id(&self, id: &str) -> Option<Arc<StopPlace>> {
        self.index.stop_place_by_id(id)
    }

    /// Look up a quay by its id
    #[inline]
    pub fn quay_by_id(&self, quay_id: &str) -> Option<Quay> {
        self.index.quay_by_id(quay_id)
    }

    /// Stop places matching the given filter list
    ///
    /// A `BoundingBox` descriptor narrows the candidate set through the
    /// spatial index before the filter engine runs; the remaining
    /// descriptors are applied by the engine with its precedence rules.
    pub fn stop_places(&self, filters: &[StopPlaceFilter]) -> Result<Vec<Arc<StopPlace>>> {
        let bounding_box = filters.iter().find_map(|f| match f {
            StopPlaceFilter::BoundingBox(bounding_box) => Some(bounding_box),
            _ => None,
        });
        let candidates = self
            .spatial
            .pre_filter_by_bounding_box(self.index.all_stop_places(), bounding_box)?;
        filter::apply_filters(&self.index, candidates, filters)
    }

    /// Distinct stop places owning a quay centroid inside `polygon`
    #[inline]
    pub fn stop_places_within_polygon(&self, polygon: &Polygon<f64>) -> Vec<Arc<StopPlace>> {
        self.spatial.stop_places_within_polygon(polygon)
    }

    /// All stop places as a point-in-time snapshot
    #[inline]
    pub fn all_stop_places(&self) -> Vec<Arc<StopPlace>> {
        self.index.all_stop_places()
    }

    /// Number of registered stop places
    #[inline]
    pub fn stop_place_count(&self) -> usize {
        self.index.len()
    }

    /// When the underlying dataset was produced upstream
    pub fn publication_time(&self) -> Option<DateTime<Utc>> {
        *self
            .publication_time
            .read()
            .expect("publication time lock poisoned")
    }

    /// Record when the underlying dataset was produced upstream
    pub fn set_publication_time(&self, publication_time: DateTime<Utc>) {
        *self
            .publication_time
            .write()
            .expect("publication time lock poisoned") = Some(publication_time);
    }

    /// Spatial index component, exposed for diagnostics
    #[inline]
    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.spatial
    }
}

impl Default for StopPlaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
