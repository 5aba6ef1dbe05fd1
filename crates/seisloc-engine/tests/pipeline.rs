//! End-to-end scenarios over the full pipeline on synthetic data.

use seisloc_core::{
    DelayParams, LocateParams, Precision, SearchGrid, Station, SurfaceArray, VelocityModel,
};
use seisloc_engine::ray::ray_travel_time;
use seisloc_engine::{ComputeBackend, CpuBackend, LocateJob, Locator};

fn two_layer_model() -> VelocityModel {
    VelocityModel::from_rows(&[[0.0, 1000.0, 2000.0], [-1000.0, 0.0, 3000.0]]).unwrap()
}

fn network() -> SurfaceArray {
    SurfaceArray::new(
        vec![
            Station { x: 0.0, y: 0.0 },
            Station { x: 500.0, y: 0.0 },
            Station { x: 0.0, y: 500.0 },
            Station { x: -500.0, y: 0.0 },
            Station { x: 0.0, y: -500.0 },
            Station { x: 350.0, y: 350.0 },
        ],
        999.0,
    )
    .unwrap()
}

fn locate_params() -> LocateParams {
    LocateParams {
        accuracy: 2.0,
        frequency: 1000,
        base_station: 0,
        grid: SearchGrid {
            dx: 50.0,
            dy: 50.0,
            dz: 50.0,
            nx: 4,
            ny: 4,
            nz: 4,
        },
    }
}

/// Forward-model a delay row for a source position: the differential
/// travel times every station would measure against the base station.
fn forward_delay_row(
    model: &VelocityModel,
    array: &SurfaceArray,
    params: &LocateParams,
    source: [f32; 3],
) -> Vec<i32> {
    let time_to = |station: &Station| {
        ray_travel_time(
            model,
            0.0,
            source[2],
            station.lateral_offset_to(source[0], source[1]),
            array.altitude,
            params.accuracy,
            params.frequency,
        )
        .expect("forward model must reach every station")
    };
    let base_time = time_to(array.station(params.base_station));
    let mut row = vec![1];
    for station in array.stations() {
        row.push(time_to(station) - base_time);
    }
    row[params.base_station + 1] = 0;
    row
}

#[test]
fn residual_minimum_sits_on_the_truth_node() {
    let model = two_layer_model();
    let array = network();
    let params = locate_params();

    // Even grid dimensions put the grid center exactly on a node.
    let truth = [25.0, -40.0, -350.0];
    let delays = forward_delay_row(&model, &array, &params, truth);
    let origins = vec![params.grid.centered_origin(truth)];

    let job = LocateJob {
        model: &model,
        array: &array,
        delays: &delays,
        origins: &origins,
        params: &params,
    };
    let output = CpuBackend::new().locate_events(&job).unwrap();

    let truth_node = {
        let (nx, ny) = (params.grid.nx, params.grid.ny);
        (nx / 2) + (ny / 2) * nx + (params.grid.nz / 2) * nx * ny
    };
    assert_eq!(output.best_node[0], Some(truth_node));
    assert!(output.residual[0] < 0.5, "residual={}", output.residual[0]);
    let position = params
        .grid
        .node_position(origins[0], output.best_node[0].unwrap());
    for axis in 0..3 {
        assert!((position[axis] - truth[axis]).abs() < 1e-3);
    }
}

#[test]
fn localization_is_invariant_under_station_permutation() {
    let model = two_layer_model();
    let array = network();
    let params = locate_params();
    let truth = [0.0, 0.0, -400.0];
    let delays = forward_delay_row(&model, &array, &params, truth);
    let origins = vec![params.grid.centered_origin(truth)];

    let job = LocateJob {
        model: &model,
        array: &array,
        delays: &delays,
        origins: &origins,
        params: &params,
    };
    let reference = CpuBackend::new().locate_events(&job).unwrap();

    // Reverse the station order, permuting coordinates and delay columns
    // consistently and re-mapping the base index.
    let station_count = array.station_count();
    let reversed: Vec<Station> = array.stations().iter().rev().copied().collect();
    let permuted_array = SurfaceArray::new(reversed, array.altitude).unwrap();
    let mut permuted_delays = vec![delays[0]];
    permuted_delays.extend((0..station_count).map(|s| delays[station_count - s]));
    let permuted_params = LocateParams {
        base_station: station_count - 1 - params.base_station,
        ..params.clone()
    };

    let permuted_job = LocateJob {
        model: &model,
        array: &permuted_array,
        delays: &permuted_delays,
        origins: &origins,
        params: &permuted_params,
    };
    let permuted = CpuBackend::new().locate_events(&permuted_job).unwrap();

    assert_eq!(reference.best_node, permuted.best_node);
    let (a, b) = (reference.residual[0], permuted.residual[0]);
    assert!((a - b).abs() <= 1e-4 * a.abs().max(1.0), "{a} vs {b}");
}

#[test]
fn fully_gated_grid_reports_no_location() {
    let model = two_layer_model();
    let array = network();
    let params = locate_params();
    let truth = [0.0, 0.0, -400.0];
    let delays = forward_delay_row(&model, &array, &params, truth);
    // Every node of this grid sits below the model floor.
    let origins = vec![[0.0, 0.0, -5000.0]];

    let job = LocateJob {
        model: &model,
        array: &array,
        delays: &delays,
        origins: &origins,
        params: &params,
    };
    let output = CpuBackend::new().locate_events(&job).unwrap();
    assert_eq!(output.best_node[0], None);
    assert!(output.residual[0].is_infinite());
    assert_eq!(output.invalid_fraction[0], 1.0);
}

fn delay_params() -> DelayParams {
    DelayParams {
        window_size: 16,
        scanner_size: 8,
        min_correlation: 0.8,
        base_station: 0,
        precision: Precision::Single,
    }
}

/// Station s records the same waveform s samples late; the delay
/// estimator must recover the shifts even though the geometry cannot
/// reproduce them physically.
fn shifted_signals(stations: usize, samples: usize) -> seisloc_core::SignalBlock {
    let mut signals = seisloc_core::SignalBlock::zeroed(stations, samples).unwrap();
    for s in 0..stations {
        let channel = signals.channel_mut(s);
        for (i, value) in channel.iter_mut().enumerate() {
            let t = i as f32 - s as f32;
            *value = t + t.sin();
        }
    }
    signals
}

#[test]
fn full_pipeline_picks_and_locates_shifted_channels() {
    let model = two_layer_model();
    let array = network();
    let locate = locate_params();
    let delay_params = delay_params();
    let signals = shifted_signals(6, 512);

    let locator = Locator::cpu();
    let matrix = locator.estimate_delays(&signals, &delay_params).unwrap();
    for t in 32..64 {
        assert!(matrix.is_valid(t), "t={t}");
        for s in 1..6 {
            assert_eq!(matrix.delay(t, s), Some(s as i32));
        }
    }

    let output = locator
        .run(
            &signals,
            &delay_params,
            &model,
            &array,
            [0.0, 0.0, -400.0],
            &locate,
        )
        .unwrap();
    // Identical delay rows merge aggressively, but every event surviving
    // into the solution carries a hypocenter and a finite residual.
    assert!(!output.events.is_empty());
    for event in &output.events {
        assert!(event.duration >= delay_params.window_size);
        assert!(event.residual.is_finite());
    }
    // Every node of this grid is inside the model, so no pick is omitted.
    assert!(output.quality.iter().all(|q| q.located));
    assert_eq!(output.events.len(), output.quality.len());
}

#[test]
fn unlocatable_events_are_omitted_but_surface_in_quality_data() {
    let model = two_layer_model();
    let array = network();
    let locate = locate_params();
    let delay_params = delay_params();
    let signals = shifted_signals(6, 512);

    // A search grid centered far below the model floor gates out every
    // node, so no picked event can be located.
    let output = Locator::cpu()
        .run(
            &signals,
            &delay_params,
            &model,
            &array,
            [0.0, 0.0, -5000.0],
            &locate,
        )
        .unwrap();
    assert!(output.events.is_empty());
    assert!(!output.quality.is_empty());
    for quality in &output.quality {
        assert!(!quality.located);
        assert!(quality.residual.is_infinite());
        assert_eq!(quality.invalid_fraction, 1.0);
    }
}
