//! Surface observation geometry.
//!
//! All stations share one altitude; horizontal symmetry lets the ray-time
//! solver work with lateral offsets instead of full 3-D station positions.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeislocError};

/// Number of columns in the flat `[S, 2]` coordinate layout.
pub const COORD_COLUMNS: usize = 2;

/// A single surface station position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Easting.
    pub x: f32,
    /// Northing.
    pub y: f32,
}

impl Station {
    /// Horizontal distance from this station to a point.
    #[inline]
    pub fn lateral_offset_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// The station network: positions plus the shared receiver altitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceArray {
    stations: Vec<Station>,
    /// Common receiver altitude for every station.
    pub altitude: f32,
}

impl SurfaceArray {
    /// Build an array, rejecting an empty network.
    pub fn new(stations: Vec<Station>, altitude: f32) -> Result<Self> {
        if stations.is_empty() {
            return Err(SeislocError::InvalidConfig(
                "observation system has no stations".into(),
            ));
        }
        Ok(Self { stations, altitude })
    }

    /// Build from the flat `[S, 2]` device layout.
    pub fn from_flat(coords: &[f32], altitude: f32) -> Result<Self> {
        if coords.is_empty() || coords.len() % COORD_COLUMNS != 0 {
            return Err(SeislocError::ShapeMismatch(format!(
                "coordinate buffer of {} floats is not an [S, {COORD_COLUMNS}] table",
                coords.len()
            )));
        }
        Self::new(
            coords
                .chunks_exact(COORD_COLUMNS)
                .map(|c| Station { x: c[0], y: c[1] })
                .collect(),
            altitude,
        )
    }

    /// Flatten into the `[S, 2]` device layout.
    pub fn to_flat(&self) -> Vec<f32> {
        self.stations.iter().flat_map(|s| [s.x, s.y]).collect()
    }

    /// Number of stations.
    #[inline]
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// All stations in storage order.
    #[inline]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Station at the given index.
    #[inline]
    pub fn station(&self, index: usize) -> &Station {
        &self.stations[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lateral_offset() {
        let s = Station { x: 3.0, y: 4.0 };
        assert_eq!(s.lateral_offset_to(0.0, 0.0), 5.0);
        assert_eq!(s.lateral_offset_to(3.0, 4.0), 0.0);
    }

    #[test]
    fn flat_roundtrip() {
        let array = SurfaceArray::new(
            vec![Station { x: 1.0, y: 2.0 }, Station { x: -3.0, y: 0.5 }],
            950.0,
        )
        .unwrap();
        let flat = array.to_flat();
        assert_eq!(flat, vec![1.0, 2.0, -3.0, 0.5]);
        assert_eq!(SurfaceArray::from_flat(&flat, 950.0).unwrap(), array);
    }

    #[test]
    fn rejects_empty_network() {
        assert!(SurfaceArray::new(Vec::new(), 0.0).is_err());
    }
}
