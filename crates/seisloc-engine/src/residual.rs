//! Residual evaluation over candidate-source grids and per-event reduction.
//!
//! One logical work item per `(event, node)` pair. Each item places the
//! node inside the event's search grid, ray-traces to the base station and
//! to every other station, and scores the node by how well the theoretical
//! differential travel times reproduce the measured delays. A second
//! kernel reduces each event's cube to its best node.

use seisloc_core::sentinel::{self, NULL_F32};
use seisloc_core::{LocateParams, SurfaceArray, VelocityModel};

use crate::ray::ray_travel_time;

/// Minimum number of stations that must corroborate a node's residual.
pub const MIN_USING_STATIONS: usize = 3;

/// Residual of one candidate node against one event's measured delays.
///
/// `delay_row` is one `[flag, delays..]` row; the flag gates the whole
/// event, missing delays just drop their station from the sum. Differences
/// are accumulated as squared integer sample counts and normalized by the
/// contributing-station count.
pub fn node_residual(
    model: &VelocityModel,
    array: &SurfaceArray,
    delay_row: &[i32],
    node: [f32; 3],
    params: &LocateParams,
) -> Option<f32> {
    if delay_row[0] != 1 {
        return None;
    }

    let base = array.station(params.base_station);
    let base_offset = base.lateral_offset_to(node[0], node[1]);
    let base_time = ray_travel_time(
        model,
        0.0,
        node[2],
        base_offset,
        array.altitude,
        params.accuracy,
        params.frequency,
    )?;

    let mut sum = 0.0f32;
    let mut using_stations = 0usize;
    for (station_index, station) in array.stations().iter().enumerate() {
        let offset = station.lateral_offset_to(node[0], node[1]);
        let Some(time) = ray_travel_time(
            model,
            0.0,
            node[2],
            offset,
            array.altitude,
            params.accuracy,
            params.frequency,
        ) else {
            continue;
        };

        let theoretical = time - base_time;
        if theoretical < 0 {
            continue;
        }
        let Some(measured) = sentinel::decode_i32(delay_row[station_index + 1]) else {
            continue;
        };

        let delta = theoretical - measured;
        sum += (delta * delta) as f32;
        using_stations += 1;
    }

    if using_stations < MIN_USING_STATIONS {
        return None;
    }
    Some(sum.sqrt() / using_stations as f32)
}

/// Evaluate one cell of the `[E, N]` residual cube.
///
/// `global_id` is the flat work-item id; `delays` is the `[E, S+1]` event
/// table and `origins` the per-event grid origins. Nodes whose altitude
/// leaves the velocity model are gated out before any tracing.
pub fn evaluate_cell(
    model: &VelocityModel,
    array: &SurfaceArray,
    delays: &[i32],
    origins: &[[f32; 3]],
    params: &LocateParams,
    global_id: usize,
) -> f32 {
    let nodes = params.grid.node_count();
    let event = global_id / nodes;
    let node_id = global_id % nodes;

    let position = params.grid.node_position(origins[event], node_id);
    if position[2] < model.z_min() || position[2] > model.z_max() {
        return NULL_F32;
    }

    let stride = array.station_count() + 1;
    let row = &delays[event * stride..(event + 1) * stride];
    sentinel::encode_f32(node_residual(model, array, row, position, params))
}

/// Reduction of one event's residual cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeReduction {
    /// Node with the smallest residual, if any node was valid.
    pub best_node: Option<usize>,
    /// Smallest residual, `+inf` when every node was gated out.
    pub residual: f32,
    /// Fraction of cube cells that carried no residual.
    pub invalid_fraction: f32,
}

/// Scan one event's cube row for its minimum residual.
///
/// Strict `<` keeps the first-seen node on ties. The invalid-cell fraction
/// is surfaced as a per-event quality figure.
pub fn reduce_event_cube(cells: &[f32]) -> CubeReduction {
    let mut best_node = None;
    let mut residual = f32::INFINITY;
    let mut invalid = 0usize;
    for (node, &value) in cells.iter().enumerate() {
        if value == NULL_F32 {
            invalid += 1;
            continue;
        }
        if value < residual {
            residual = value;
            best_node = Some(node);
        }
    }
    CubeReduction {
        best_node,
        residual,
        invalid_fraction: invalid as f32 / cells.len() as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seisloc_core::{SearchGrid, Station};

    fn model() -> VelocityModel {
        VelocityModel::from_rows(&[[0.0, 1000.0, 2000.0], [-1000.0, 0.0, 3000.0]]).unwrap()
    }

    fn array() -> SurfaceArray {
        SurfaceArray::new(
            vec![
                Station { x: 0.0, y: 0.0 },
                Station { x: 400.0, y: 0.0 },
                Station { x: 0.0, y: 400.0 },
                Station { x: -400.0, y: 0.0 },
                Station { x: 0.0, y: -400.0 },
            ],
            999.0,
        )
        .unwrap()
    }

    fn params() -> LocateParams {
        LocateParams {
            accuracy: 1.0,
            frequency: 1000,
            base_station: 0,
            grid: SearchGrid {
                dx: 50.0,
                dy: 50.0,
                dz: 50.0,
                nx: 5,
                ny: 5,
                nz: 5,
            },
        }
    }

    /// Differential times of the forward model at a source position.
    fn forward_row(source: [f32; 3]) -> Vec<i32> {
        let model = model();
        let array = array();
        let p = params();
        let base_time = ray_travel_time(
            &model,
            0.0,
            source[2],
            array.station(0).lateral_offset_to(source[0], source[1]),
            array.altitude,
            p.accuracy,
            p.frequency,
        )
        .unwrap();
        let mut row = vec![1];
        for station in array.stations() {
            let time = ray_travel_time(
                &model,
                0.0,
                source[2],
                station.lateral_offset_to(source[0], source[1]),
                array.altitude,
                p.accuracy,
                p.frequency,
            )
            .unwrap();
            row.push(time - base_time);
        }
        // The base column is reserved; the estimator leaves it zeroed.
        row[1] = 0;
        row
    }

    #[test]
    fn truth_node_scores_zero() {
        let source = [0.0, 0.0, -400.0];
        let row = forward_row(source);
        let residual = node_residual(&model(), &array(), &row, source, &params()).unwrap();
        assert!(residual < 1.0, "residual={residual}");
    }

    #[test]
    fn invalid_flag_gates_the_event() {
        let source = [0.0, 0.0, -400.0];
        let mut row = forward_row(source);
        row[0] = 0;
        assert!(node_residual(&model(), &array(), &row, source, &params()).is_none());
    }

    #[test]
    fn missing_delays_drop_below_station_minimum() {
        let source = [0.0, 0.0, -400.0];
        let mut row = forward_row(source);
        // Two delay columns survive, below the three-station minimum.
        for cell in row.iter_mut().skip(2) {
            *cell = seisloc_core::sentinel::NULL_I32;
        }
        row[2] = 0;
        assert!(node_residual(&model(), &array(), &row, source, &params()).is_none());
    }

    #[test]
    fn altitude_gate_marks_cells_null() {
        let row = forward_row([0.0, 0.0, -400.0]);
        let origins = [[0.0, 0.0, -3000.0]];
        let p = params();
        // Every node of this grid sits below the model.
        for node in 0..p.grid.node_count() {
            let value = evaluate_cell(&model(), &array(), &row, &origins, &p, node);
            assert_eq!(value, NULL_F32);
        }
    }

    #[test]
    fn reducer_finds_minimum_and_counts_invalids() {
        let cells = [NULL_F32, 3.0, 1.5, NULL_F32, 2.0, 1.5];
        let reduction = reduce_event_cube(&cells);
        assert_eq!(reduction.best_node, Some(2));
        assert_eq!(reduction.residual, 1.5);
        assert!((reduction.invalid_fraction - 2.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn reducer_with_no_valid_cells() {
        let cells = [NULL_F32; 4];
        let reduction = reduce_event_cube(&cells);
        assert_eq!(reduction.best_node, None);
        assert_eq!(reduction.residual, f32::INFINITY);
        assert_eq!(reduction.invalid_fraction, 1.0);
    }

    #[test]
    fn reducer_is_idempotent() {
        let cells = [2.0, NULL_F32, 0.5, 0.5];
        assert_eq!(reduce_event_cube(&cells), reduce_event_cube(&cells));
        assert_eq!(reduce_event_cube(&cells).best_node, Some(2));
    }
}
