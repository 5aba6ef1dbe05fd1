//! Host driver: job assembly, stage ordering, and result stitching.

use seisloc_core::{
    DelayMatrix, DelayParams, LocateParams, Result, SeislocError, SignalBlock, SurfaceArray,
    VelocityModel,
};

use crate::backend::ComputeBackend;
use crate::events::{self, PickedEvent};
use crate::residual::CubeReduction;

/// One localization job handed to a backend.
///
/// `delays` is the `[E, S+1]` table of event rows (validity flag first),
/// `origins` the per-event search-grid origins. All buffers are read-only
/// for the duration of the job.
#[derive(Debug, Clone, Copy)]
pub struct LocateJob<'a> {
    /// Layered velocity model.
    pub model: &'a VelocityModel,
    /// Station network.
    pub array: &'a SurfaceArray,
    /// Flat `[E, S+1]` event-delay table.
    pub delays: &'a [i32],
    /// Per-event search-grid origins.
    pub origins: &'a [[f32; 3]],
    /// Localization parameters.
    pub params: &'a LocateParams,
}

impl LocateJob<'_> {
    /// Check that the buffers agree with each other and the parameters.
    pub fn validate(&self) -> Result<()> {
        self.params.validate(self.array.station_count())?;
        let stride = self.array.station_count() + 1;
        if self.delays.len() != self.origins.len() * stride {
            return Err(SeislocError::ShapeMismatch(format!(
                "delay table holds {} ints, expected {} ({} events x {stride})",
                self.delays.len(),
                self.origins.len() * stride,
                self.origins.len()
            )));
        }
        Ok(())
    }
}

/// Per-event output of the localization stages.
#[derive(Debug, Clone, PartialEq)]
pub struct LocateOutput {
    /// Best node per event, `None` when the whole cube was invalid.
    pub best_node: Vec<Option<usize>>,
    /// Best residual per event, `+inf` when the whole cube was invalid.
    pub residual: Vec<f32>,
    /// Fraction of invalid cube cells per event.
    pub invalid_fraction: Vec<f32>,
}

impl LocateOutput {
    /// Assemble the output from per-event reductions.
    pub fn from_reductions(reductions: Vec<CubeReduction>) -> Self {
        let mut output = Self {
            best_node: Vec::with_capacity(reductions.len()),
            residual: Vec::with_capacity(reductions.len()),
            invalid_fraction: Vec::with_capacity(reductions.len()),
        };
        for r in reductions {
            output.best_node.push(r.best_node);
            output.residual.push(r.residual);
            output.invalid_fraction.push(r.invalid_fraction);
        }
        output
    }
}

/// A located event assembled from the pipeline stages.
///
/// Only events whose cube produced a best node appear as located events;
/// the rest are omitted from the solution and surface through
/// [`EventQuality`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedEvent {
    /// Time index of the event's anchor row.
    pub time_index: usize,
    /// Event span in samples.
    pub duration: usize,
    /// Hypocenter position.
    pub position: [f32; 3],
    /// Residual at the best node.
    pub residual: f32,
    /// Fraction of invalid cells in the event's residual cube.
    pub invalid_fraction: f32,
}

/// Per-event cube quality figures, recorded for every picked event,
/// including events omitted from the assembled solution.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuality {
    /// Time index of the event's anchor row.
    pub time_index: usize,
    /// Whether the event made it into the assembled solution.
    pub located: bool,
    /// Best residual, `+inf` when the whole cube was invalid.
    pub residual: f32,
    /// Fraction of invalid cells in the event's residual cube.
    pub invalid_fraction: f32,
}

/// Assembled solution of a full pipeline run: the located events plus the
/// quality data of every picked event.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Successfully located events, in pick order.
    pub events: Vec<LocatedEvent>,
    /// Quality figures for every picked event, located or not.
    pub quality: Vec<EventQuality>,
}

/// The host driver tying both engines together over one backend.
pub struct Locator<B: ComputeBackend> {
    backend: B,
}

impl Locator<crate::backend::CpuBackend> {
    /// Locator over the default CPU backend.
    pub fn cpu() -> Self {
        Self::new(crate::backend::CpuBackend::new())
    }
}

impl<B: ComputeBackend> Locator<B> {
    /// Locator over an explicit backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The backend this locator drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Stage 1: delay estimation.
    pub fn estimate_delays(
        &self,
        signals: &SignalBlock,
        params: &DelayParams,
    ) -> Result<DelayMatrix> {
        tracing::info!(
            backend = self.backend.name(),
            stations = signals.station_count(),
            samples = signals.samples(),
            "estimating delays"
        );
        self.backend.estimate_delays(signals, params)
    }

    /// Stage 2: residual-cube evaluation and reduction.
    pub fn locate_events(&self, job: &LocateJob<'_>) -> Result<LocateOutput> {
        job.validate()?;
        tracing::info!(
            backend = self.backend.name(),
            events = job.origins.len(),
            nodes = job.params.grid.node_count(),
            "locating events"
        );
        let output = self.backend.locate_events(job)?;
        for (event, fraction) in output.invalid_fraction.iter().enumerate() {
            if *fraction > 0.0 {
                tracing::debug!(event, invalid_fraction = fraction, "cube quality");
            }
        }
        Ok(output)
    }

    /// Full pipeline: estimate delays, pick events, locate each one on a
    /// grid centered on `center`, and assemble hypocenters.
    ///
    /// Events whose cube produced no valid node are omitted from the
    /// solution; their quality figures remain in the output.
    pub fn run(
        &self,
        signals: &SignalBlock,
        delay_params: &DelayParams,
        model: &VelocityModel,
        array: &SurfaceArray,
        center: [f32; 3],
        locate_params: &LocateParams,
    ) -> Result<RunOutput> {
        if array.station_count() != signals.station_count() {
            return Err(SeislocError::ShapeMismatch(format!(
                "{} signal channels for {} stations",
                signals.station_count(),
                array.station_count()
            )));
        }

        let matrix = self.estimate_delays(signals, delay_params)?;
        let picked = events::pick_events(&matrix, delay_params);
        if picked.is_empty() {
            return Ok(RunOutput {
                events: Vec::new(),
                quality: Vec::new(),
            });
        }

        let origin = locate_params.grid.centered_origin(center);
        let origins = vec![origin; picked.len()];
        let delays: Vec<i32> = picked.iter().flat_map(|e| e.delays.iter().copied()).collect();
        let job = LocateJob {
            model,
            array,
            delays: &delays,
            origins: &origins,
            params: locate_params,
        };
        let output = self.locate_events(&job)?;

        let assembled = assemble(&picked, &origins, locate_params, &output);
        for quality in &assembled.quality {
            if !quality.located {
                tracing::warn!(
                    time_index = quality.time_index,
                    invalid_fraction = quality.invalid_fraction,
                    "event omitted from solution"
                );
            }
        }
        Ok(assembled)
    }
}

/// Stitch picked events and localization output into final results.
///
/// Events without a best node are left out of the solution; every picked
/// event contributes a quality record.
fn assemble(
    picked: &[PickedEvent],
    origins: &[[f32; 3]],
    params: &LocateParams,
    output: &LocateOutput,
) -> RunOutput {
    let mut events = Vec::new();
    let mut quality = Vec::with_capacity(picked.len());
    for (event, pick) in picked.iter().enumerate() {
        quality.push(EventQuality {
            time_index: pick.time_index,
            located: output.best_node[event].is_some(),
            residual: output.residual[event],
            invalid_fraction: output.invalid_fraction[event],
        });
        if let Some(node) = output.best_node[event] {
            events.push(LocatedEvent {
                time_index: pick.time_index,
                duration: pick.duration,
                position: params.grid.node_position(origins[event], node),
                residual: output.residual[event],
                invalid_fraction: output.invalid_fraction[event],
            });
        }
    }
    RunOutput { events, quality }
}
