//! WGPU backend running the WGSL kernel ports.
//!
//! Buffers live for a single job: inputs are uploaded once, each kernel
//! writes its own output buffer, and only the final stage is read back.
//! `locate_events` keeps the residual cube on the device between the
//! evaluation and reduction passes; the per-stage trait methods are also
//! implemented for callers that want the intermediate cube on the host.

mod shaders;

use std::sync::Arc;

use wgpu::util::DeviceExt;

use seisloc_core::launch::LaunchGrid;
use seisloc_core::sentinel::NULL_I32;
use seisloc_core::{DelayMatrix, DelayParams, Result, SeislocError, SignalBlock};

use crate::backend::ComputeBackend;
use crate::locator::{LocateJob, LocateOutput};
use crate::residual::CubeReduction;

/// Uniform block of the delay-estimator kernel (matches WGSL layout).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuDelayParams {
    samples: u32,
    stations: u32,
    window: u32,
    scanner: u32,
    base: u32,
    id_stride: u32,
    min_correlation: f32,
    _pad: u32,
}

/// Uniform block of the residual-cube kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuCubeParams {
    layers: u32,
    stations: u32,
    events: u32,
    base: u32,
    nx: u32,
    ny: u32,
    nz: u32,
    id_stride: u32,
    dx: f32,
    dy: f32,
    dz: f32,
    accuracy: f32,
    stations_altitude: f32,
    frequency: f32,
    _pad0: u32,
    _pad1: u32,
}

/// Uniform block of the reduction kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuReduceParams {
    events: u32,
    nodes: u32,
    id_stride: u32,
    _pad: u32,
}

/// One compiled kernel with its bind-group layout.
struct KernelPipeline {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl KernelPipeline {
    /// Compile an entry point with binding 0 as the uniform block and one
    /// storage buffer per `storage_read_only` flag after it.
    fn new(
        device: &wgpu::Device,
        label: &str,
        source: &str,
        entry_point: &str,
        storage_read_only: &[bool],
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        for (index, &read_only) in storage_read_only.iter().enumerate() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: index as u32 + 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point,
        });

        Self { pipeline, layout }
    }
}

/// Backend running the kernels on a WebGPU adapter.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    delays: KernelPipeline,
    cube: KernelPipeline,
    reduce: KernelPipeline,
}

impl WgpuBackend {
    /// Create a backend on the first available high-performance adapter.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                SeislocError::BackendUnavailable("no WebGPU adapter found".to_string())
            })?;

        let info = adapter.get_info();
        tracing::info!("wgpu backend: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("seisloc device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| SeislocError::BackendError(format!("failed to create device: {e}")))?;

        let delays = KernelPipeline::new(
            &device,
            "seisloc delays",
            shaders::DELAYS_SHADER,
            "estimate_delays",
            &[true, false],
        );
        let cube = KernelPipeline::new(
            &device,
            "seisloc cube",
            shaders::CUBE_SHADER,
            "evaluate_cube",
            &[true, true, true, true, false],
        );
        let reduce = KernelPipeline::new(
            &device,
            "seisloc reduce",
            shaders::REDUCE_SHADER,
            "reduce_cube",
            &[true, false, false, false],
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            delays,
            cube,
            reduce,
        })
    }

    /// Run one kernel over a flat work-item range.
    fn dispatch(&self, kernel: &KernelPipeline, buffers: &[&wgpu::Buffer], grid: LaunchGrid) {
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("seisloc bind group"),
            layout: &kernel.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("seisloc encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("seisloc pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid.groups_x, grid.groups_y, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Copy a device buffer into host memory.
    fn read_buffer(&self, source: &wgpu::Buffer, size: u64) -> Result<Vec<u8>> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("seisloc staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("seisloc readback"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| SeislocError::TransferFailed("map callback dropped".to_string()))?
            .map_err(|e| SeislocError::TransferFailed(format!("map failed: {e:?}")))?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }

    fn storage_init(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE,
            })
    }

    fn uniform_init(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    /// Zero-initialized device-side output buffer.
    fn output_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    /// Run the residual-cube kernel, leaving the cube on the device.
    fn evaluate_cube_on_device(&self, job: &LocateJob<'_>) -> Result<wgpu::Buffer> {
        job.validate()?;
        let nodes = job.params.grid.node_count();
        let events = job.origins.len();
        let grid = LaunchGrid::for_items(nodes * events);

        let gpu_params = GpuCubeParams {
            layers: job.model.layer_count() as u32,
            stations: job.array.station_count() as u32,
            events: events as u32,
            base: job.params.base_station as u32,
            nx: job.params.grid.nx as u32,
            ny: job.params.grid.ny as u32,
            nz: job.params.grid.nz as u32,
            id_stride: grid.row_stride(),
            dx: job.params.grid.dx,
            dy: job.params.grid.dy,
            dz: job.params.grid.dz,
            accuracy: job.params.accuracy,
            stations_altitude: job.array.altitude,
            frequency: job.params.frequency as f32,
            _pad0: 0,
            _pad1: 0,
        };

        let params = self.uniform_init("cube params", bytemuck::bytes_of(&gpu_params));
        let model = self.storage_init("model", bytemuck::cast_slice(&job.model.to_flat()));
        let delays = self.storage_init("delays", bytemuck::cast_slice(job.delays));
        let coords = self.storage_init("coords", bytemuck::cast_slice(&job.array.to_flat()));
        let origins: Vec<f32> = job.origins.iter().flatten().copied().collect();
        let origins = self.storage_init("origins", bytemuck::cast_slice(&origins));
        let cube = self.output_buffer(
            "cube",
            (nodes * events * std::mem::size_of::<f32>()) as u64,
        );

        self.dispatch(
            &self.cube,
            &[&params, &model, &delays, &coords, &origins, &cube],
            grid,
        );
        Ok(cube)
    }

    /// Run the reduction kernel over a device-resident cube.
    fn reduce_on_device(
        &self,
        cube: &wgpu::Buffer,
        events: usize,
        nodes: usize,
    ) -> Result<LocateOutput> {
        let grid = LaunchGrid::for_items(events);
        let gpu_params = GpuReduceParams {
            events: events as u32,
            nodes: nodes as u32,
            id_stride: grid.row_stride(),
            _pad: 0,
        };
        let params = self.uniform_init("reduce params", bytemuck::bytes_of(&gpu_params));
        let best = self.output_buffer("best nodes", (events * 4) as u64);
        let residuals = self.output_buffer("residuals", (events * 4) as u64);
        let invalid = self.output_buffer("invalid counts", (events * 4) as u64);

        self.dispatch(
            &self.reduce,
            &[&params, cube, &best, &residuals, &invalid],
            grid,
        );

        let best: Vec<i32> =
            bytemuck::pod_collect_to_vec(&self.read_buffer(&best, (events * 4) as u64)?);
        let residuals: Vec<f32> =
            bytemuck::pod_collect_to_vec(&self.read_buffer(&residuals, (events * 4) as u64)?);
        let invalid: Vec<u32> =
            bytemuck::pod_collect_to_vec(&self.read_buffer(&invalid, (events * 4) as u64)?);

        let reductions = (0..events)
            .map(|event| CubeReduction {
                best_node: (best[event] != NULL_I32).then_some(best[event] as usize),
                residual: residuals[event],
                invalid_fraction: invalid[event] as f32 / nodes as f32,
            })
            .collect();
        Ok(LocateOutput::from_reductions(reductions))
    }
}

impl ComputeBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn estimate_delays(
        &self,
        signals: &SignalBlock,
        params: &DelayParams,
    ) -> Result<DelayMatrix> {
        params.validate(signals.station_count())?;
        let rows = signals.samples();
        let stations = signals.station_count();
        let stride = stations + 1;
        let processed = params.processed_rows(rows);
        if processed == 0 {
            return Ok(DelayMatrix::zeroed(rows, stations));
        }

        let grid = LaunchGrid::for_items(processed);
        let gpu_params = GpuDelayParams {
            samples: rows as u32,
            stations: stations as u32,
            window: params.window_size as u32,
            scanner: params.scanner_size as u32,
            base: params.base_station as u32,
            id_stride: grid.row_stride(),
            min_correlation: params.min_correlation,
            _pad: 0,
        };

        let uniform = self.uniform_init("delay params", bytemuck::bytes_of(&gpu_params));
        let signal_buffer = self.storage_init("signals", bytemuck::cast_slice(signals.as_slice()));
        let delays_size = (rows * stride * std::mem::size_of::<i32>()) as u64;
        let delays_buffer = self.output_buffer("delays", delays_size);

        self.dispatch(&self.delays, &[&uniform, &signal_buffer, &delays_buffer], grid);

        let raw = self.read_buffer(&delays_buffer, delays_size)?;
        DelayMatrix::from_raw(stations, bytemuck::pod_collect_to_vec(&raw))
    }

    fn evaluate_cube(&self, job: &LocateJob<'_>) -> Result<Vec<f32>> {
        let nodes = job.params.grid.node_count();
        let events = job.origins.len();
        let cube = self.evaluate_cube_on_device(job)?;
        let raw = self.read_buffer(&cube, (nodes * events * std::mem::size_of::<f32>()) as u64)?;
        Ok(bytemuck::pod_collect_to_vec(&raw))
    }

    fn reduce_cube(&self, cube: &[f32], events: usize) -> Result<LocateOutput> {
        if events == 0 {
            return Ok(LocateOutput::from_reductions(Vec::new()));
        }
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube upload"),
            contents: bytemuck::cast_slice(cube),
            usage: wgpu::BufferUsages::STORAGE,
        });
        self.reduce_on_device(&buffer, events, cube.len() / events)
    }

    /// Both localization stages with the cube kept on the device.
    fn locate_events(&self, job: &LocateJob<'_>) -> Result<LocateOutput> {
        let events = job.origins.len();
        if events == 0 {
            return Ok(LocateOutput::from_reductions(Vec::new()));
        }
        let cube = self.evaluate_cube_on_device(job)?;
        self.reduce_on_device(&cube, events, job.params.grid.node_count())
    }
}
