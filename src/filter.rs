//! Filter descriptors and the filter engine
//!
//! A query carries an ordered list of [`StopPlaceFilter`] descriptors. The
//! engine applies them with a fixed precedence:
//!
//! 1. `QuayIds` is exclusive: when present, every other descriptor is
//!    ignored and the result is the owning stop places of the given quay
//!    ids, in the order given, de-duplicated.
//! 2. Otherwise the compositional descriptors (`TransportMode`,
//!    `SearchText`) are ANDed over the candidate set. `BoundingBox` is a
//!    documented no-op inside the engine; the caller narrows candidates
//!    through the spatial index before invoking it.
//! 3. `Limit` is terminal: applied after all compositional filtering, it
//!    samples a uniform random subset when the result is larger than the
//!    limit, so repeated queries over a large result set sample different
//!    subsets.

use crate::{RegistryError, Result, StopPlace, StopPlaceIndex};
use crate::model::{BoundingBox, TransportMode};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;

/// One filter criterion of a stop place query
///
/// The set is closed: the engine matches exhaustively over these variants,
/// so adding a variant forces the engine to be updated at compile time.
#[derive(Clone, Debug, PartialEq)]
pub enum StopPlaceFilter {
    /// Exclusive: resolve these quay ids to their owning stop places and
    /// ignore every other descriptor
    QuayIds(Vec<String>),
    /// Compositional: stop place transport mode equals the given mode
    TransportMode(TransportMode),
    /// Compositional: case-insensitive substring match against the stop
    /// place id, its name, or any owned quay id
    SearchText(String),
    /// Candidate narrowing only; a no-op inside the engine itself
    BoundingBox(BoundingBox),
    /// Terminal: randomly sample at most this many results
    Limit(usize),
}

impl StopPlaceFilter {
    /// Short descriptor name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            StopPlaceFilter::QuayIds(_) => "QuayIds",
            StopPlaceFilter::TransportMode(_) => "TransportMode",
            StopPlaceFilter::SearchText(_) => "SearchText",
            StopPlaceFilter::BoundingBox(_) => "BoundingBox",
            StopPlaceFilter::Limit(_) => "Limit",
        }
    }

    /// True for descriptors that bypass composition entirely when present
    pub fn is_exclusive(&self) -> bool {
        matches!(self, StopPlaceFilter::QuayIds(_))
    }
}

/// Apply an ordered list of filters to a candidate set
///
/// The candidate set is expected to be bounding-box pre-filtered already
/// when a `BoundingBox` descriptor is present. Filter errors abort the whole
/// evaluation; there is no partial result.
pub fn apply_filters(
    index: &StopPlaceIndex,
    candidates: Vec<Arc<StopPlace>>,
    filters: &[StopPlaceFilter],
) -> Result<Vec<Arc<StopPlace>>> {
    // Exclusive pass first: QuayIds supersedes everything else.
    if let Some(StopPlaceFilter::QuayIds(quay_ids)) =
        filters.iter().find(|filter| filter.is_exclusive())
    {
        return Ok(resolve_quay_ids(index, quay_ids));
    }

    let mut result = Vec::with_capacity(candidates.len());
    for stop_place in candidates {
        if satisfies_compositional(&stop_place, filters)? {
            result.push(stop_place);
        }
    }

    // Limit is terminal: applied only after all compositional filters.
    if let Some(limit) = filters.iter().find_map(|filter| match filter {
        StopPlaceFilter::Limit(n) => Some(*n),
        _ => None,
    }) && result.len() > limit
    {
        result.shuffle(&mut rand::rng());
        result.truncate(limit);
    }

    Ok(result)
}

/// Owning stop places of the given quay ids, in the order the ids were
/// given, skipping unknown ids, de-duplicated on first sight
fn resolve_quay_ids(index: &StopPlaceIndex, quay_ids: &[String]) -> Vec<Arc<StopPlace>> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for quay_id in quay_ids {
        if let Some(stop_place) = index.stop_place_by_quay_ref(quay_id)
            && seen.insert(stop_place.id.clone())
        {
            found.push(stop_place);
        }
    }
    found
}

/// True when the stop place satisfies every compositional descriptor
///
/// Descriptors that do not belong in the compositional pass surface as
/// `UnsupportedFilter` rather than being silently ignored; with the current
/// closed descriptor set the precedence handling above keeps that arm
/// unreachable.
fn satisfies_compositional(stop_place: &StopPlace, filters: &[StopPlaceFilter]) -> Result<bool> {
    for filter in filters {
        let matched = match filter {
            StopPlaceFilter::TransportMode(mode) => stop_place.transport_mode == Some(*mode),
            StopPlaceFilter::SearchText(text) => matches_search_text(stop_place, text),
            // Candidates are already narrowed through the spatial index
            StopPlaceFilter::BoundingBox(_) => true,
            // Terminal, applied after composition
            StopPlaceFilter::Limit(_) => true,
            other => {
                return Err(RegistryError::UnsupportedFilter(other.kind().to_string()));
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Case-insensitive substring match against the stop place id, its name,
/// or any owned quay id
fn matches_search_text(stop_place: &StopPlace, text: &str) -> bool {
    let needle = text.to_lowercase();
    if stop_place.id.to_lowercase().contains(&needle) {
        return true;
    }
    if let Some(name) = &stop_place.name
        && name.to_lowercase().contains(&needle)
    {
        return true;
    }
    stop_place
        .quays
        .iter()
        .any(|quay| quay.id.to_lowercase().contains(&needle))
}
