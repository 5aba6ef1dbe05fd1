//! JSON job descriptions for the command line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use seisloc_core::{
    DelayParams, LocateParams, Result, SeislocError, SignalBlock, Station, SurfaceArray,
    VelocityModel,
};

/// Raw waveform file reference: little-endian f32, channel-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsSpec {
    /// File holding `stations * samples` little-endian f32 values.
    pub path: PathBuf,
    /// Station channels in the file.
    pub stations: usize,
    /// Samples per channel.
    pub samples: usize,
}

/// One locator job loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFile {
    /// Waveform input.
    pub signals: SignalsSpec,
    /// Velocity model as `(bottom, top, vp)` rows, top-down.
    pub model: Vec<[f32; 3]>,
    /// Station coordinates `(x, y)` in signal-channel order.
    pub stations: Vec<[f32; 2]>,
    /// Common receiver altitude.
    pub stations_altitude: f32,
    /// Delay-estimator parameters.
    pub delay: DelayParams,
    /// Localization parameters.
    pub locate: LocateParams,
    /// Search-grid center shared by every picked event.
    pub center: [f32; 3],
}

impl JobFile {
    /// Parse a job description from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| SeislocError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// Build the typed model from the job rows.
    pub fn velocity_model(&self) -> Result<VelocityModel> {
        VelocityModel::from_rows(&self.model)
    }

    /// Build the typed station network from the job rows.
    pub fn surface_array(&self) -> Result<SurfaceArray> {
        SurfaceArray::new(
            self.stations
                .iter()
                .map(|c| Station { x: c[0], y: c[1] })
                .collect(),
            self.stations_altitude,
        )
    }

    /// Load the referenced waveform file.
    pub fn load_signals(&self, base_dir: &Path) -> Result<SignalBlock> {
        let path = if self.signals.path.is_absolute() {
            self.signals.path.clone()
        } else {
            base_dir.join(&self.signals.path)
        };
        let bytes = std::fs::read(&path)?;
        if bytes.len() % 4 != 0 {
            return Err(SeislocError::ShapeMismatch(format!(
                "{}: length {} is not a whole number of f32 samples",
                path.display(),
                bytes.len()
            )));
        }
        let data: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        SignalBlock::new(self.signals.stations, self.signals.samples, data)
    }
}
