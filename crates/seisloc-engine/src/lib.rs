//! # Seisloc Engine
//!
//! The two numerical engines of the micro-seismic locator:
//!
//! - the **delay estimator**, which scans a multi-channel waveform block
//!   and finds, per time index, the best integer lag of every station
//!   against a base station via windowed Pearson correlation;
//! - the **localization engine**, which grid-searches candidate source
//!   positions per event, ray-tracing through a layered velocity model to
//!   compare theoretical differential travel times with the measured lags.
//!
//! Both engines are embarrassingly parallel per output cell and run behind
//! the [`ComputeBackend`] trait: [`CpuBackend`] executes the kernels with
//! rayon, and the `gpu` feature adds a wgpu backend running WGSL ports of
//! the same kernels.
//!
//! [`Locator`] is the host driver tying the stages together: delay
//! estimation, event picking, residual-cube evaluation, reduction, and
//! hypocenter assembly.

pub mod backend;
pub mod delays;
pub mod events;
pub mod locator;
pub mod ray;
pub mod residual;
pub mod signal;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use backend::{ComputeBackend, CpuBackend};
pub use delays::estimate_delays;
pub use events::PickedEvent;
pub use locator::{EventQuality, LocateJob, LocateOutput, LocatedEvent, Locator, RunOutput};
pub use ray::{ray_travel_time, trace_ray, TracePoint};

#[cfg(feature = "gpu")]
pub use gpu::WgpuBackend;
