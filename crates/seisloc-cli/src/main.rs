//! seisloc - micro-seismic event location from the command line.
//!
//! # Commands
//!
//! - `seisloc run <job.json>` - run a full job described by a JSON file
//! - `seisloc demo` - run the pipeline on synthetic shifted channels
//!
//! # Examples
//!
//! ```bash
//! # Locate events from a recorded waveform block
//! seisloc run survey/job.json
//!
//! # Quick synthetic end-to-end check, verbose logs
//! seisloc -v demo --stations 6 --samples 4096
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use seisloc_core::{
    DelayParams, LocateParams, Precision, SearchGrid, SeislocError, SignalBlock, Station,
    SurfaceArray, VelocityModel,
};
use seisloc_engine::{ComputeBackend, CpuBackend, Locator, RunOutput};

mod job;

use job::JobFile;

/// Micro-seismic event locator
#[derive(Parser)]
#[command(name = "seisloc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Compute backend to run the kernels on
    #[arg(short, long, global = true, default_value = "cpu")]
    backend: BackendChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    /// Rayon-parallel host execution
    Cpu,
    /// WebGPU adapter (requires the `gpu` build)
    Gpu,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job described by a JSON file
    Run {
        /// Job description path
        job: PathBuf,
    },

    /// Run the pipeline on synthetic shifted channels
    Demo {
        /// Station count
        #[arg(long, default_value = "6")]
        stations: usize,

        /// Samples per channel
        #[arg(long, default_value = "2048")]
        samples: usize,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let result = match cli.backend {
        BackendChoice::Cpu => dispatch(CpuBackend::new(), &cli.command),
        BackendChoice::Gpu => match gpu_backend() {
            Ok(backend) => dispatch(backend, &cli.command),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "gpu")]
fn gpu_backend() -> Result<seisloc_engine::WgpuBackend, SeislocError> {
    pollster::block_on(seisloc_engine::WgpuBackend::new())
}

#[cfg(not(feature = "gpu"))]
fn gpu_backend() -> Result<CpuBackend, SeislocError> {
    Err(SeislocError::BackendUnavailable(
        "this build has no GPU support; rebuild with --features gpu".to_string(),
    ))
}

fn dispatch<B: ComputeBackend>(backend: B, command: &Commands) -> Result<(), SeislocError> {
    let locator = Locator::new(backend);
    match command {
        Commands::Run { job } => run_job(&locator, job),
        Commands::Demo { stations, samples } => run_demo(&locator, *stations, *samples),
    }
}

fn run_job<B: ComputeBackend>(locator: &Locator<B>, path: &PathBuf) -> Result<(), SeislocError> {
    let job = JobFile::load(path)?;
    let base_dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));

    let model = job.velocity_model()?;
    let array = job.surface_array()?;
    let signals = job.load_signals(base_dir)?;

    let output = locator.run(&signals, &job.delay, &model, &array, job.center, &job.locate)?;
    report(&output);
    Ok(())
}

fn run_demo<B: ComputeBackend>(
    locator: &Locator<B>,
    stations: usize,
    samples: usize,
) -> Result<(), SeislocError> {
    if stations < 5 {
        return Err(SeislocError::InvalidConfig(
            "the demo needs at least 5 stations to clear the corroboration gate".to_string(),
        ));
    }

    let model = VelocityModel::from_rows(&[[0.0, 1000.0, 2000.0], [-1000.0, 0.0, 3000.0]])?;
    let ring: Vec<Station> = (0..stations)
        .map(|s| {
            let angle = s as f32 / stations as f32 * std::f32::consts::TAU;
            Station {
                x: 600.0 * angle.cos(),
                y: 600.0 * angle.sin(),
            }
        })
        .collect();
    let array = SurfaceArray::new(ring, 999.0)?;

    // Each station hears the same sweep one sample later than the last.
    let mut signals = SignalBlock::zeroed(stations, samples)?;
    for s in 0..stations {
        let channel = signals.channel_mut(s);
        for (i, value) in channel.iter_mut().enumerate() {
            let t = i as f32 - s as f32;
            *value = t + t.sin();
        }
    }

    let delay = DelayParams {
        window_size: 16,
        scanner_size: 8,
        min_correlation: 0.8,
        base_station: 0,
        precision: Precision::Single,
    };
    let locate = LocateParams {
        accuracy: 2.0,
        frequency: 1000,
        base_station: 0,
        grid: SearchGrid {
            dx: 50.0,
            dy: 50.0,
            dz: 50.0,
            nx: 10,
            ny: 10,
            nz: 10,
        },
    };

    let output = locator.run(&signals, &delay, &model, &array, [0.0, 0.0, -400.0], &locate)?;
    report(&output);
    Ok(())
}

fn report(output: &RunOutput) {
    if output.events.is_empty() {
        println!("no events located");
    } else {
        println!(
            "{:>8}  {:>8}  {:>30}  {:>10}  {:>8}",
            "t", "span", "hypocenter (x y z)", "residual", "invalid"
        );
        for event in &output.events {
            let p = event.position;
            let position = format!("{:9.1} {:9.1} {:9.1}", p[0], p[1], p[2]);
            println!(
                "{:>8}  {:>8}  {:>30}  {:>10.3}  {:>7.1}%",
                event.time_index,
                event.duration,
                position,
                event.residual,
                event.invalid_fraction * 100.0
            );
        }
    }

    for quality in &output.quality {
        if !quality.located {
            println!(
                "event at t={} omitted: no valid node ({:.1}% invalid cells)",
                quality.time_index,
                quality.invalid_fraction * 100.0
            );
        }
    }
}
