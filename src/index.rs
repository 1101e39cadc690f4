//! Exact-match indexes over the stop place set
//!
//! Three indexes are maintained together: stop place id → stop place,
//! quay id → owning stop place, and quay id → quay. Entries are updated
//! per-entry (safe because entries are independent); whole-set operations
//! (`load_bulk_data`, `clear`) repopulate in one pass.

use crate::{Quay, RegistryError, Result, StopPlace};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Exact-match lookups and structural mutation of the stop place set
///
/// Stop places are stored behind `Arc` and replaced wholesale on update;
/// there is no field-level patching. Lookups return shared or cloned values,
/// never references into internal state.
pub struct StopPlaceIndex {
    /// Stop place id → stop place
    stop_places: DashMap<String, Arc<StopPlace>>,
    /// Quay id → owning stop place
    stop_place_by_quay: DashMap<String, Arc<StopPlace>>,
    /// Quay id → quay
    quays: DashMap<String, Quay>,
}

impl StopPlaceIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            stop_places: DashMap::new(),
            stop_place_by_quay: DashMap::new(),
            quays: DashMap::new(),
        }
    }

    /// Insert or overwrite a stop place under its id
    ///
    /// Every owned quay is (re)inserted into the quay indexes, overwriting
    /// any prior owner of that quay id. Fails with `InvalidArgument` if the
    /// stop place id is empty; a rejected insert leaves the indexes untouched.
    pub fn add_stop_place(&self, stop_place: StopPlace) -> Result<()> {
        if stop_place.id.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "stop place id must not be empty".to_string(),
            ));
        }

        let shared = Arc::new(stop_place);
        self.stop_places
            .insert(shared.id.clone(), Arc::clone(&shared));
        for quay in &shared.quays {
            self.stop_place_by_quay
                .insert(quay.id.clone(), Arc::clone(&shared));
            self.quays.insert(quay.id.clone(), quay.clone());
        }
        Ok(())
    }

    /// Replace the stop place stored under `id`
    ///
    /// Semantically identical to [`add_stop_place`](Self::add_stop_place)
    /// (full replace); the distinct name lets callers express intent.
    pub fn update_stop_place(&self, id: &str, stop_place: StopPlace) -> Result<()> {
        if id.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "stop place id must not be empty".to_string(),
            ));
        }
        self.add_stop_place(stop_place)
    }

    /// Look up a stop place by its id
    #[inline]
    pub fn stop_place_by_id(&self, id: &str) -> Option<Arc<StopPlace>> {
        self.stop_places.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up the stop place owning the given quay id
    #[inline]
    pub fn stop_place_by_quay_ref(&self, quay_id: &str) -> Option<Arc<StopPlace>> {
        self.stop_place_by_quay
            .get(quay_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a quay by its id
    #[inline]
    pub fn quay_by_id(&self, quay_id: &str) -> Option<Quay> {
        self.quays.get(quay_id).map(|entry| entry.value().clone())
    }

    /// Remove a stop place together with every stop place whose parent
    /// chain transitively reaches it
    ///
    /// Returns the ids actually removed, in visit order; an unknown id
    /// yields an empty list. Parent references in upstream data are not
    /// fully trusted: the walk tracks visited ids so a cyclic chain
    /// terminates instead of recursing unboundedly.
    pub fn remove_stop_place_and_related(&self, id: &str) -> Vec<String> {
        if !self.stop_places.contains_key(id) {
            return Vec::new();
        }

        // Invert parent_ref into a child adjacency map in one scan.
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for entry in self.stop_places.iter() {
            if let Some(parent) = &entry.value().parent_ref {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(entry.key().clone());
            }
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([id.to_string()]);
        let mut removed = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some((_, stop_place)) = self.stop_places.remove(&current) {
                for quay in &stop_place.quays {
                    self.stop_place_by_quay.remove(&quay.id);
                    self.quays.remove(&quay.id);
                }
                removed.push(current.clone());
            }
            if let Some(child_ids) = children.get(&current) {
                queue.extend(child_ids.iter().cloned());
            }
        }

        removed
    }

    /// Clear all three indexes and repopulate from `stop_places` in one pass
    ///
    /// Entries without an id are dropped with a warning rather than aborting
    /// the whole load.
    pub fn load_bulk_data(&self, stop_places: Vec<StopPlace>) {
        self.clear();

        let mut skipped = 0usize;
        for stop_place in stop_places {
            if stop_place.id.trim().is_empty() {
                skipped += 1;
                continue;
            }
            let shared = Arc::new(stop_place);
            self.stop_places
                .insert(shared.id.clone(), Arc::clone(&shared));
            for quay in &shared.quays {
                self.stop_place_by_quay
                    .insert(quay.id.clone(), Arc::clone(&shared));
                self.quays.insert(quay.id.clone(), quay.clone());
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "dropped stop places without an id during bulk load");
        }
        tracing::debug!(
            stop_places = self.stop_places.len(),
            quays = self.quays.len(),
            "bulk loaded stop place indexes"
        );
    }

    /// Empty all indexes
    pub fn clear(&self) {
        self.stop_places.clear();
        self.stop_place_by_quay.clear();
        self.quays.clear();
    }

    /// All stop places as a point-in-time snapshot
    ///
    /// The returned vector is owned by the caller; the shared `Arc` values
    /// are immutable, so internal state cannot be mutated through it.
    pub fn all_stop_places(&self) -> Vec<Arc<StopPlace>> {
        self.stop_places
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Cloned copy of the quay id → quay index
    pub fn quay_index(&self) -> HashMap<String, Quay> {
        self.quays
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of indexed stop places
    #[inline]
    pub fn len(&self) -> usize {
        self.stop_places.len()
    }

    /// True if no stop places are indexed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stop_places.is_empty()
    }
}

impl Default for StopPlaceIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Quay;

    fn create_test_stop(id: &str, quay_ids: &[&str]) -> StopPlace {
        let mut stop = StopPlace::new(id);
        for quay_id in quay_ids {
            stop = stop.with_quay(Quay::new(*quay_id));
        }
        stop
    }

    #[test]
    fn test_add_and_lookup() {
        let index = StopPlaceIndex::new();
        index
            .add_stop_place(create_test_stop("FIN:StopPlace:1", &["FIN:Quay:1"]))
            .unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.stop_place_by_id("FIN:StopPlace:1").is_some());
        assert_eq!(
            index.stop_place_by_quay_ref("FIN:Quay:1").unwrap().id,
            "FIN:StopPlace:1"
        );
        assert_eq!(index.quay_by_id("FIN:Quay:1").unwrap().id, "FIN:Quay:1");
    }

    #[test]
    fn test_lookup_missing_returns_none() {
        let index = StopPlaceIndex::new();
        assert!(index.stop_place_by_id("missing").is_none());
        assert!(index.stop_place_by_quay_ref("missing").is_none());
        assert!(index.quay_by_id("missing").is_none());
    }

    #[test]
    fn test_add_empty_id_rejected() {
        let index = StopPlaceIndex::new();

        let result = index.add_stop_place(create_test_stop("", &["FIN:Quay:1"]));
        assert!(matches!(result, Err(RegistryError::InvalidArgument(_))));

        // A rejected insert must not partially mutate the indexes
        assert!(index.is_empty());
        assert!(index.quay_by_id("FIN:Quay:1").is_none());
    }

    #[test]
    fn test_update_is_full_replace() {
        let index = StopPlaceIndex::new();
        index
            .add_stop_place(
                create_test_stop("FIN:StopPlace:1", &["FIN:Quay:1"]).with_name("Old"),
            )
            .unwrap();

        index
            .update_stop_place(
                "FIN:StopPlace:1",
                create_test_stop("FIN:StopPlace:1", &["FIN:Quay:1"]).with_name("New"),
            )
            .unwrap();

        assert_eq!(index.len(), 1);
        let stop = index.stop_place_by_id("FIN:StopPlace:1").unwrap();
        assert_eq!(stop.name.as_deref(), Some("New"));
        // Quay index follows the replacement
        assert_eq!(
            index.stop_place_by_quay_ref("FIN:Quay:1").unwrap().name.as_deref(),
            Some("New")
        );
    }

    #[test]
    fn test_idempotent_replace() {
        let index = StopPlaceIndex::new();
        let stop = create_test_stop("FIN:StopPlace:1", &["FIN:Quay:1", "FIN:Quay:2"]);

        index
            .update_stop_place("FIN:StopPlace:1", stop.clone())
            .unwrap();
        index.update_stop_place("FIN:StopPlace:1", stop).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.quay_index().len(), 2);
    }

    #[test]
    fn test_quay_reassignment_overwrites_prior_owner() {
        let index = StopPlaceIndex::new();
        index
            .add_stop_place(create_test_stop("FIN:StopPlace:1", &["FIN:Quay:X"]))
            .unwrap();
        index
            .add_stop_place(create_test_stop("FIN:StopPlace:2", &["FIN:Quay:X"]))
            .unwrap();

        assert_eq!(
            index.stop_place_by_quay_ref("FIN:Quay:X").unwrap().id,
            "FIN:StopPlace:2"
        );
    }

    #[test]
    fn test_cascade_removal_closure() {
        let index = StopPlaceIndex::new();
        index
            .add_stop_place(create_test_stop("P", &["P:Quay:1"]))
            .unwrap();
        index
            .add_stop_place(create_test_stop("C1", &["C1:Quay:1"]).with_parent_ref("P"))
            .unwrap();
        index
            .add_stop_place(create_test_stop("C2", &[]).with_parent_ref("P"))
            .unwrap();
        // Grandchild via C1
        index
            .add_stop_place(create_test_stop("G1", &[]).with_parent_ref("C1"))
            .unwrap();
        // Unrelated stop survives
        index.add_stop_place(create_test_stop("Other", &[])).unwrap();

        let mut removed = index.remove_stop_place_and_related("P");
        removed.sort();
        assert_eq!(removed, vec!["C1", "C2", "G1", "P"]);

        assert_eq!(index.len(), 1);
        assert!(index.stop_place_by_id("Other").is_some());
        assert!(index.stop_place_by_quay_ref("C1:Quay:1").is_none());
        assert!(index.quay_by_id("P:Quay:1").is_none());
    }

    #[test]
    fn test_cascade_removal_unknown_id_is_empty() {
        let index = StopPlaceIndex::new();
        index.add_stop_place(create_test_stop("A", &[])).unwrap();

        assert!(index.remove_stop_place_and_related("missing").is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_cascade_removal_terminates_on_cycle() {
        let index = StopPlaceIndex::new();
        // A → B → A parent cycle (a data-quality bug, not an error)
        index
            .add_stop_place(create_test_stop("A", &[]).with_parent_ref("B"))
            .unwrap();
        index
            .add_stop_place(create_test_stop("B", &[]).with_parent_ref("A"))
            .unwrap();

        let mut removed = index.remove_stop_place_and_related("A");
        removed.sort();
        assert_eq!(removed, vec!["A", "B"]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_bulk_load_replaces_previous() {
        let index = StopPlaceIndex::new();
        index
            .add_stop_place(create_test_stop("Old", &["Old:Quay:1"]))
            .unwrap();

        index.load_bulk_data(vec![
            create_test_stop("New1", &["New1:Quay:1"]),
            create_test_stop("New2", &[]),
            // Dropped, not an error
            create_test_stop("", &[]),
        ]);

        assert_eq!(index.len(), 2);
        assert!(index.stop_place_by_id("Old").is_none());
        assert!(index.quay_by_id("Old:Quay:1").is_none());
        assert!(index.stop_place_by_id("New1").is_some());
    }

    #[test]
    fn test_clear() {
        let index = StopPlaceIndex::new();
        index
            .add_stop_place(create_test_stop("A", &["A:Quay:1"]))
            .unwrap();

        index.clear();

        assert!(index.is_empty());
        assert!(index.quay_index().is_empty());
        assert!(index.stop_place_by_quay_ref("A:Quay:1").is_none());
    }

    #[test]
    fn test_returned_collections_are_defensive() {
        let index = StopPlaceIndex::new();
        index
            .add_stop_place(create_test_stop("A", &["A:Quay:1"]))
            .unwrap();

        let mut quay_index = index.quay_index();
        quay_index.clear();
        let mut all = index.all_stop_places();
        all.clear();

        // Mutating the returned copies must not affect the index
        assert_eq!(index.len(), 1);
        assert_eq!(index.quay_index().len(), 1);
    }

    #[test]
    fn test_concurrent_reads_and_writes() {
        use std::thread;

        let index = Arc::new(StopPlaceIndex::new());

        let writer_index = Arc::clone(&index);
        let writer = thread::spawn(move || {
            for i in 0..200 {
                writer_index
                    .add_stop_place(create_test_stop(&format!("SP:{i}"), &[]))
                    .unwrap();
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let idx = Arc::clone(&index);
                thread::spawn(move || {
                    let mut found = 0usize;
                    for i in 0..200 {
                        if idx.stop_place_by_id(&format!("SP:{i}")).is_some() {
                            found += 1;
                        }
                    }
                    found
                })
            })
            .collect();

        writer.join().expect("writer thread panicked");
        for reader in readers {
            reader.join().expect("reader thread panicked");
        }

        assert_eq!(index.len(), 200);
    }
}
