//! Entity model for stop places and quays
//!
//! Pure data types shared by the indexes, the spatial service and the filter
//! engine. Coordinates are WGS84; `geo::Point` carries (x = longitude,
//! y = latitude) following the geo crate convention.

use geo::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Enumerated transport mode of a stop place
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransportMode {
    Air,
    Bus,
    Cableway,
    Coach,
    Funicular,
    Metro,
    Rail,
    Tram,
    TrolleyBus,
    Water,
}

/// A specific boarding point (platform/bay) owned by exactly one stop place
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quay {
    /// Unique quay id
    pub id: String,
    /// Optional representative point, (longitude, latitude)
    pub centroid: Option<Point<f64>>,
}

impl Quay {
    /// Create a quay with no centroid
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            centroid: None,
        }
    }

    /// Set the centroid from (longitude, latitude) in degrees
    pub fn with_centroid(mut self, lng: f64, lat: f64) -> Self {
        self.centroid = Some(Point::new(lng, lat));
        self
    }
}

/// A named transit location grouping one or more quays
///
/// A stop place may reference a parent stop place (multimodal hub grouping).
/// The reference is not required to resolve to a currently-indexed stop place;
/// dangling references are tolerated.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StopPlace {
    /// Unique stop place id, required
    pub id: String,
    /// Optional display name
    pub name: Option<String>,
    /// Optional transport mode
    pub transport_mode: Option<TransportMode>,
    /// Optional representative point, independent of quay centroids
    pub centroid: Option<Point<f64>>,
    /// Owned quays, in order
    pub quays: Vec<Quay>,
    /// Optional id of the parent stop place
    pub parent_ref: Option<String>,
}

impl StopPlace {
    /// Create a stop place with the given id and no optional fields
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            transport_mode: None,
            centroid: None,
            quays: Vec::new(),
            parent_ref: None,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the transport mode
    pub fn with_transport_mode(mut self, mode: TransportMode) -> Self {
        self.transport_mode = Some(mode);
        self
    }

    /// Set the centroid from (longitude, latitude) in degrees
    pub fn with_centroid(mut self, lng: f64, lat: f64) -> Self {
        self.centroid = Some(Point::new(lng, lat));
        self
    }

    /// Append an owned quay
    pub fn with_quay(mut self, quay: Quay) -> Self {
        self.quays.push(quay);
        self
    }

    /// Set the parent stop place reference
    pub fn with_parent_ref(mut self, parent_ref: impl Into<String>) -> Self {
        self.parent_ref = Some(parent_ref.into());
        self
    }
}

/// Axis-aligned geographic bounding box given by its NE and SW corners
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    pub north_east_lat: f64,
    pub north_east_lng: f64,
    pub south_west_lat: f64,
    pub south_west_lng: f64,
}

impl BoundingBox {
    pub fn new(
        north_east_lat: f64,
        north_east_lng: f64,
        south_west_lat: f64,
        south_west_lng: f64,
    ) -> Self {
        Self {
            north_east_lat,
            north_east_lng,
            south_west_lat,
            south_west_lng,
        }
    }

    /// True if all four coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.north_east_lat.is_finite()
            && self.north_east_lng.is_finite()
            && self.south_west_lat.is_finite()
            && self.south_west_lng.is_finite()
    }
}
