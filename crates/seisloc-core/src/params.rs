//! Job parameters for the delay estimator and the localization engine.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeislocError};

/// Accumulation precision for the correlation sums.
///
/// `Single` matches the compute device bit-for-bit; `Double` trades that for
/// headroom on long windows, where f32 sums of squares lose digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// f32 accumulation (device-faithful default).
    #[default]
    Single,
    /// f64 accumulation.
    Double,
}

/// Configuration of the delay estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayParams {
    /// Samples per correlation window.
    pub window_size: usize,
    /// Number of candidate lags searched, starting at zero.
    pub scanner_size: usize,
    /// Lower bound for an accepted Pearson correlation.
    pub min_correlation: f32,
    /// Station all differential delays are measured against.
    pub base_station: usize,
    /// Accumulation precision for the correlation sums.
    #[serde(default)]
    pub precision: Precision,
}

impl DelayParams {
    /// Check the parameters against a station count.
    pub fn validate(&self, stations: usize) -> Result<()> {
        if self.window_size < 2 {
            return Err(SeislocError::InvalidConfig(format!(
                "window_size {} is below the minimum of 2",
                self.window_size
            )));
        }
        if self.scanner_size < 1 {
            return Err(SeislocError::InvalidConfig(
                "scanner_size must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_correlation) {
            return Err(SeislocError::InvalidConfig(format!(
                "min_correlation {} is outside [0, 1]",
                self.min_correlation
            )));
        }
        if self.base_station >= stations {
            return Err(SeislocError::InvalidConfig(format!(
                "base_station {} is outside the {stations}-station network",
                self.base_station
            )));
        }
        Ok(())
    }

    /// Number of leading rows the estimator writes for a `samples`-long
    /// block. The tail rows stay pre-zeroed.
    pub fn processed_rows(&self, samples: usize) -> usize {
        samples.saturating_sub(self.window_size + self.scanner_size)
    }
}

/// Candidate-location search grid: spacing and node counts per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchGrid {
    /// Node spacing along x.
    pub dx: f32,
    /// Node spacing along y.
    pub dy: f32,
    /// Node spacing along z.
    pub dz: f32,
    /// Node count along x.
    pub nx: usize,
    /// Node count along y.
    pub ny: usize,
    /// Node count along z.
    pub nz: usize,
}

impl SearchGrid {
    /// Check spacing and dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 || self.nz == 0 {
            return Err(SeislocError::InvalidConfig(
                "search grid has a zero-node axis".into(),
            ));
        }
        if self.dx <= 0.0 || self.dy <= 0.0 || self.dz <= 0.0 {
            return Err(SeislocError::InvalidConfig(
                "search grid has a non-positive spacing".into(),
            ));
        }
        Ok(())
    }

    /// Total number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Decode a linear node index into `(ix, iy, iz)`.
    #[inline]
    pub fn decode(&self, node: usize) -> (usize, usize, usize) {
        let plane = self.nx * self.ny;
        ((node % plane) % self.nx, (node % plane) / self.nx, node / plane)
    }

    /// Grid origin for a grid centered on `center`.
    pub fn centered_origin(&self, center: [f32; 3]) -> [f32; 3] {
        [
            center[0] - self.nx as f32 * self.dx / 2.0,
            center[1] - self.ny as f32 * self.dy / 2.0,
            center[2] - self.nz as f32 * self.dz / 2.0,
        ]
    }

    /// Absolute position of a node given the grid origin.
    pub fn node_position(&self, origin: [f32; 3], node: usize) -> [f32; 3] {
        let (ix, iy, iz) = self.decode(node);
        [
            ix as f32 * self.dx + origin[0],
            iy as f32 * self.dy + origin[1],
            iz as f32 * self.dz + origin[2],
        ]
    }
}

/// Configuration of the localization engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateParams {
    /// Lateral-position tolerance of the ray-time bisection.
    pub accuracy: f32,
    /// Sampling frequency converting seconds to sample counts.
    pub frequency: i32,
    /// Station all differential times are measured against.
    pub base_station: usize,
    /// Per-event candidate grid.
    pub grid: SearchGrid,
}

impl LocateParams {
    /// Check the parameters against a station count.
    pub fn validate(&self, stations: usize) -> Result<()> {
        if self.accuracy <= 0.0 {
            return Err(SeislocError::InvalidConfig(format!(
                "accuracy {} must be positive",
                self.accuracy
            )));
        }
        if self.frequency < 1 {
            return Err(SeislocError::InvalidConfig(format!(
                "frequency {} must be at least 1",
                self.frequency
            )));
        }
        if self.base_station >= stations {
            return Err(SeislocError::InvalidConfig(format!(
                "base_station {} is outside the {stations}-station network",
                self.base_station
            )));
        }
        self.grid.validate()
    }
}
