//! Differential-delay matrix produced by the delay estimator.
//!
//! Device layout `[T, S+1]` of `i32`: column 0 is the per-row validity flag,
//! column `s+1` the best lag of station `s` against the base station (or the
//! absence sentinel). The base station's own column is reserved and stays
//! zero. The same layout is read back by the localization engine, which
//! treats column 0 as the per-event validity gate.

use crate::error::{Result, SeislocError};
use crate::sentinel;

/// Sentinel-encoded delay matrix in the `[T, S+1]` device layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayMatrix {
    stations: usize,
    data: Vec<i32>,
}

impl DelayMatrix {
    /// Allocate a pre-zeroed matrix for `rows` time indices.
    pub fn zeroed(rows: usize, stations: usize) -> Self {
        Self {
            stations,
            data: vec![0; rows * (stations + 1)],
        }
    }

    /// Wrap an existing flat buffer.
    pub fn from_raw(stations: usize, data: Vec<i32>) -> Result<Self> {
        if stations == 0 || data.len() % (stations + 1) != 0 {
            return Err(SeislocError::ShapeMismatch(format!(
                "delay buffer of {} ints is not a [T, {}] table",
                data.len(),
                stations + 1
            )));
        }
        Ok(Self { stations, data })
    }

    /// Number of station columns (excluding the validity column).
    #[inline]
    pub fn station_count(&self) -> usize {
        self.stations
    }

    /// Number of time-index rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.data.len() / self.row_stride()
    }

    /// Width of one row: validity flag plus one column per station.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.stations + 1
    }

    /// Whether the row at `time_index` carries a corroborated event.
    #[inline]
    pub fn is_valid(&self, time_index: usize) -> bool {
        self.row(time_index)[0] == 1
    }

    /// Decoded best lag of `station` at `time_index`.
    #[inline]
    pub fn delay(&self, time_index: usize, station: usize) -> Option<i32> {
        sentinel::decode_i32(self.row(time_index)[station + 1])
    }

    /// One sentinel-encoded row, flag first.
    #[inline]
    pub fn row(&self, time_index: usize) -> &[i32] {
        let stride = self.row_stride();
        &self.data[time_index * stride..(time_index + 1) * stride]
    }

    /// Indices of all rows whose validity flag is set.
    pub fn valid_row_indices(&self) -> Vec<usize> {
        (0..self.rows()).filter(|&t| self.is_valid(t)).collect()
    }

    /// The whole flat buffer (row-major).
    #[inline]
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Mutable flat buffer for the estimator kernel.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }
}
