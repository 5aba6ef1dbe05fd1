//! # Seisloc Core
//!
//! Data model and shared types for the seisloc micro-seismic event locator.
//!
//! This crate holds everything both engines and every backend agree on:
//! the layered velocity model, the surface observation geometry, the flat
//! signal and delay buffers with their device layouts, job parameters, and
//! the dispatch-sizing math used to map flat work-item ranges onto a 3-D
//! launch grid.
//!
//! Buffers keep the device layout (flat, row-major, sentinel-encoded) so
//! they can be uploaded without copies; the typed accessors on top of them
//! speak `Option` instead of the `-9999` sentinel.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod delays;
pub mod error;
pub mod geometry;
pub mod launch;
pub mod model;
pub mod params;
pub mod sentinel;
pub mod signals;

pub use delays::DelayMatrix;
pub use error::{Result, SeislocError};
pub use geometry::{Station, SurfaceArray};
pub use launch::LaunchGrid;
pub use model::{Layer, VelocityModel};
pub use params::{DelayParams, LocateParams, Precision, SearchGrid};
pub use signals::SignalBlock;
