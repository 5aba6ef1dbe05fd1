//! Horizontally layered P-wave velocity model.
//!
//! Layers are stored top-down: row 0 has the largest top altitude, the last
//! row the smallest bottom altitude. Altitudes increase upward and the rows
//! partition `[z_min, z_max]` without overlap.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeislocError};

/// Number of columns in the flat `[L, 3]` model layout.
pub const MODEL_COLUMNS: usize = 3;

/// A single homogeneous layer: altitude span and P-wave velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Bottom altitude of the layer.
    pub bottom: f32,
    /// Top altitude of the layer.
    pub top: f32,
    /// P-wave velocity inside the layer.
    pub vp: f32,
}

impl Layer {
    /// Full layer thickness.
    #[inline]
    pub fn thickness(&self) -> f32 {
        self.top - self.bottom
    }
}

/// A validated stack of layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityModel {
    layers: Vec<Layer>,
}

impl VelocityModel {
    /// Build a model from top-down layers, validating the stacking rules.
    pub fn new(layers: Vec<Layer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(SeislocError::InvalidConfig(
                "velocity model has no layers".into(),
            ));
        }
        for (i, layer) in layers.iter().enumerate() {
            if layer.bottom >= layer.top {
                return Err(SeislocError::InvalidConfig(format!(
                    "layer {i}: bottom altitude {} is not below top {}",
                    layer.bottom, layer.top
                )));
            }
            if layer.vp <= 0.0 {
                return Err(SeislocError::InvalidConfig(format!(
                    "layer {i}: non-positive velocity {}",
                    layer.vp
                )));
            }
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[1].top > pair[0].bottom {
                return Err(SeislocError::InvalidConfig(format!(
                    "layers {i} and {} overlap or are not stored top-down",
                    i + 1
                )));
            }
        }
        Ok(Self { layers })
    }

    /// Build a model from `(bottom, top, vp)` rows.
    pub fn from_rows(rows: &[[f32; 3]]) -> Result<Self> {
        Self::new(
            rows.iter()
                .map(|r| Layer {
                    bottom: r[0],
                    top: r[1],
                    vp: r[2],
                })
                .collect(),
        )
    }

    /// Build a model from the flat `[L, 3]` device layout.
    pub fn from_flat(data: &[f32]) -> Result<Self> {
        if data.is_empty() || data.len() % MODEL_COLUMNS != 0 {
            return Err(SeislocError::ShapeMismatch(format!(
                "model buffer of {} floats is not an [L, {MODEL_COLUMNS}] table",
                data.len()
            )));
        }
        Self::new(
            data.chunks_exact(MODEL_COLUMNS)
                .map(|r| Layer {
                    bottom: r[0],
                    top: r[1],
                    vp: r[2],
                })
                .collect(),
        )
    }

    /// Flatten into the `[L, 3]` device layout.
    pub fn to_flat(&self) -> Vec<f32> {
        self.layers
            .iter()
            .flat_map(|l| [l.bottom, l.top, l.vp])
            .collect()
    }

    /// Number of layers.
    #[inline]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// All layers, top-down.
    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layer at the given index.
    #[inline]
    pub fn layer(&self, index: usize) -> &Layer {
        &self.layers[index]
    }

    /// Linear altitude lookup: the index `i` with `bottom_i <= z < top_i`.
    pub fn layer_index_of(&self, altitude: f32) -> Option<usize> {
        self.layers
            .iter()
            .position(|l| l.bottom <= altitude && altitude < l.top)
    }

    /// Smallest altitude covered by the model.
    #[inline]
    pub fn z_min(&self) -> f32 {
        self.layers[self.layers.len() - 1].bottom
    }

    /// Largest altitude covered by the model.
    #[inline]
    pub fn z_max(&self) -> f32 {
        self.layers[0].top
    }
}
