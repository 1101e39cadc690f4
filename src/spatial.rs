//! Spatial index over quay centroids
//!
//! An R-tree (STR bulk-loaded) where each indexed point is a quay centroid
//! tagged with its owning stop place. Queries run a bounding-box scan over
//! the tree and refine candidates with an exact point-in-polygon test
//! (boundary-inclusive, via `geo::Intersects`).
//!
//! # Atomic rebuild
//!
//! The tree is rebuilt off to the side and published with a single reference
//! swap under a brief write lock. Concurrent queries clone the current
//! reference and traverse their own snapshot, so they see either the
//! fully-old or fully-new index, never a partially populated one.

use crate::{BoundingBox, RegistryError, Result, StopPlace};
use geo::{BoundingRect, Intersects, LineString, Point, Polygon};
use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A quay centroid tagged with its owning stop place
type QuayPoint = GeomWithData<[f64; 2], Arc<StopPlace>>;

/// Polygon-containment queries over quay centroids
pub struct SpatialIndex {
    /// Current tree; replaced wholesale on rebuild, never mutated in place
    tree: RwLock<Arc<RTree<QuayPoint>>>,
    /// Completed builds, for diagnostics and batch-discipline checks
    rebuild_count: AtomicU64,
}

impl SpatialIndex {
    /// Create an index with no indexed points
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Arc::new(RTree::new())),
            rebuild_count: AtomicU64::new(0),
        }
    }

    /// Rebuild the index from the given stop places and swap it in atomically
    ///
    /// Each quay centroid becomes one indexed point. Stop places with no
    /// quays, or whose quays all lack a centroid, are excluded from the
    /// spatial index; they remain reachable through the exact indexes.
    pub fn rebuild(&self, stop_places: &[Arc<StopPlace>]) {
        let points: Vec<QuayPoint> = stop_places
            .par_iter()
            .flat_map_iter(|stop_place| {
                stop_place.quays.iter().filter_map(move |quay| {
                    quay.centroid.map(|centroid| {
                        GeomWithData::new(
                            [centroid.x(), centroid.y()],
                            Arc::clone(stop_place),
                        )
                    })
                })
            })
            .collect();

        let indexed = points.len();
        let new_tree = Arc::new(RTree::bulk_load(points));

        // Swap atomically; readers hold their own snapshot
        *self.tree.write().expect("spatial index lock poisoned") = new_tree;
        self.rebuild_count.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            stop_places = stop_places.len(),
            indexed,
            "rebuilt spatial index"
        );
    }

    /// Distinct stop places owning at least one quay centroid inside `polygon`
    ///
    /// Containment is boundary-inclusive. An empty polygon or a not-yet-built
    /// index yields an empty result, never an error.
    pub fn stop_places_within_polygon(&self, polygon: &Polygon<f64>) -> Vec<Arc<StopPlace>> {
        let tree = Arc::clone(&self.tree.read().expect("spatial index lock poisoned"));

        let Some(rect) = polygon.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );

        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for candidate in tree.locate_in_envelope(&envelope) {
            let [lng, lat] = *candidate.geom();
            if !polygon.intersects(&Point::new(lng, lat)) {
                continue;
            }
            let stop_place = &candidate.data;
            if seen.insert(stop_place.id.clone()) {
                matches.push(Arc::clone(stop_place));
            }
        }
        matches
    }

    /// Build a closed rectangular ring from the four corners of `bounding_box`
    ///
    /// The ring runs SW → SE → NE → NW and closes back on SW, in
    /// (longitude, latitude) coordinate order. Fails with `InvalidArgument`
    /// when any corner coordinate is not a finite number.
    pub fn polygon_from_bounding_box(&self, bounding_box: &BoundingBox) -> Result<Polygon<f64>> {
        if !bounding_box.is_finite() {
            return Err(RegistryError::InvalidArgument(
                "bounding box coordinates must be finite".to_string(),
            ));
        }

        let ring = LineString::from(vec![
            (bounding_box.south_west_lng, bounding_box.south_west_lat),
            (bounding_box.north_east_lng, bounding_box.south_west_lat),
            (bounding_box.north_east_lng, bounding_box.north_east_lat),
            (bounding_box.south_west_lng, bounding_box.north_east_lat),
            (bounding_box.south_west_lng, bounding_box.south_west_lat),
        ]);
        Ok(Polygon::new(ring, vec![]))
    }

    /// Narrow `candidates` to those with a quay centroid inside `bounding_box`
    ///
    /// A missing box passes the candidates through unchanged. Used as a
    /// performance pre-filter before the filter engine runs, since the
    /// containment test reuses the spatial index instead of a linear scan.
    pub fn pre_filter_by_bounding_box(
        &self,
        candidates: Vec<Arc<StopPlace>>,
        bounding_box: Option<&BoundingBox>,
    ) -> Result<Vec<Arc<StopPlace>>> {
        let Some(bounding_box) = bounding_box else {
            return Ok(candidates);
        };

        let polygon = self.polygon_from_bounding_box(bounding_box)?;
        let within: HashSet<String> = self
            .stop_places_within_polygon(&polygon)
            .into_iter()
            .map(|stop_place| stop_place.id.clone())
            .collect();

        Ok(candidates
            .into_iter()
            .filter(|stop_place| within.contains(&stop_place.id))
            .collect())
    }

    /// Number of quay centroids currently indexed
    pub fn indexed_points(&self) -> usize {
        self.tree.read().expect("spatial index lock poisoned").size()
    }

    /// Number of completed index builds
    #[inline]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count.load(Ordering::Relaxed)
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}
