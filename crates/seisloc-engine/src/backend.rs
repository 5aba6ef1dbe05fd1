//! Compute backends executing the data-parallel kernels.
//!
//! A backend owns the buffer plumbing for one job at a time: inputs are
//! read-only across all work items, every output cell is written by
//! exactly one work item, and the host enforces the happens-before edge
//! between the cube evaluation and its reduction.

use rayon::prelude::*;

use seisloc_core::{DelayMatrix, DelayParams, Result, SignalBlock};

use crate::locator::{LocateJob, LocateOutput};
use crate::residual::{evaluate_cell, reduce_event_cube};

/// A device that can run the delay-estimation and localization kernels.
pub trait ComputeBackend: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &'static str;

    /// Run the delay estimator over a signal block.
    fn estimate_delays(&self, signals: &SignalBlock, params: &DelayParams)
        -> Result<DelayMatrix>;

    /// Evaluate the `[E, N]` residual cube for a localization job.
    fn evaluate_cube(&self, job: &LocateJob<'_>) -> Result<Vec<f32>>;

    /// Reduce a residual cube to per-event best nodes.
    fn reduce_cube(&self, cube: &[f32], events: usize) -> Result<LocateOutput>;

    /// Run both localization stages with the stage barrier between them.
    fn locate_events(&self, job: &LocateJob<'_>) -> Result<LocateOutput> {
        let cube = self.evaluate_cube(job)?;
        self.reduce_cube(&cube, job.origins.len())
    }
}

/// Backend running the kernels on the host CPU with rayon.
///
/// Work items map one-to-one onto parallel iterator elements, so the
/// kernels stay scalar and the scheduling mirrors a device launch with an
/// implicit out-of-range guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl CpuBackend {
    /// Create a CPU backend.
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn estimate_delays(
        &self,
        signals: &SignalBlock,
        params: &DelayParams,
    ) -> Result<DelayMatrix> {
        crate::delays::estimate_delays(signals, params)
    }

    fn evaluate_cube(&self, job: &LocateJob<'_>) -> Result<Vec<f32>> {
        job.validate()?;
        let nodes = job.params.grid.node_count();
        let mut cube = vec![0.0f32; nodes * job.origins.len()];
        cube.par_iter_mut().enumerate().for_each(|(global_id, cell)| {
            *cell = evaluate_cell(
                job.model,
                job.array,
                job.delays,
                job.origins,
                job.params,
                global_id,
            );
        });
        Ok(cube)
    }

    fn reduce_cube(&self, cube: &[f32], events: usize) -> Result<LocateOutput> {
        if events == 0 {
            return Ok(LocateOutput::from_reductions(Vec::new()));
        }
        Ok(LocateOutput::from_reductions(
            cube.par_chunks(cube.len() / events)
                .map(reduce_event_cube)
                .collect(),
        ))
    }
}
