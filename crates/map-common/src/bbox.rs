//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// A lat/lon bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// The whole globe in the -180..180 convention.
    pub fn global() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    /// Check ordering and that the box stays on the globe.
    pub fn validate(&self) -> MapResult<()> {
        if !(self.min_lon < self.max_lon && self.min_lat < self.max_lat) {
            return Err(MapError::InvalidGrid(format!(
                "bbox corners out of order: {:?}",
                self
            )));
        }
        if self.min_lon < -180.0 || self.max_lon > 180.0 || self.min_lat < -90.0 || self.max_lat > 90.0 {
            return Err(MapError::InvalidGrid(format!(
                "bbox exceeds -180..180 / -90..90: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Check if a point lies inside (edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::global()
    }
}
