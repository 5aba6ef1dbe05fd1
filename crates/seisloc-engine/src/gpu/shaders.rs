//! WGSL ports of the seisloc kernels.
//!
//! The kernels mirror the scalar implementations cell for cell; every
//! entry point rebuilds its flat work-item id from the 2-D dispatch via
//! the `id_stride` uniform and guards the out-of-range tail. WGSL has no
//! f64, so angle arithmetic runs in f32 here.

/// Delay-estimator kernel (one work item per time index).
pub const DELAYS_SHADER: &str = r#"
struct DelayParams {
    samples: u32,
    stations: u32,
    window: u32,
    scanner: u32,
    base: u32,
    id_stride: u32,
    min_correlation: f32,
    _pad: u32,
}

@group(0) @binding(0) var<uniform> params: DelayParams;
@group(0) @binding(1) var<storage, read> signals: array<f32>;
@group(0) @binding(2) var<storage, read_write> delays: array<i32>;

const NULL_VALUE: i32 = -9999;
const MIN_STATIONS_COUNT: u32 = 3u;

// True iff no two adjacent samples inside the window are equal.
fn is_clean_segment(start: u32, window: u32) -> bool {
    var last = signals[start];
    for (var i = start + 1u; i < start + window; i++) {
        if (signals[i] == last) {
            return false;
        }
        last = signals[i];
    }
    return true;
}

@compute @workgroup_size(64)
fn estimate_delays(@builtin(global_invocation_id) gid: vec3<u32>) {
    let time_index = gid.y * params.id_stride + gid.x;
    // The host never dispatches when samples <= window + scanner.
    if (time_index >= params.samples - params.window - params.scanner) {
        return;
    }

    let base_start = params.base * params.samples + time_index;
    if (!is_clean_segment(base_start, params.window)) {
        return;
    }

    var sum_a = 0.0;
    var sum_qa = 0.0;
    var min_value = signals[base_start];
    var max_value = signals[base_start];
    for (var i = 0u; i < params.window; i++) {
        let value = signals[base_start + i];
        min_value = min(min_value, value);
        max_value = max(max_value, value);
        sum_a += value;
        sum_qa += value * value;
    }
    if (min_value == max_value) {
        return;
    }

    let w = f32(params.window);
    let row = time_index * (params.stations + 1u);
    var selected = 0u;

    for (var station = 0u; station < params.stations; station++) {
        if (station == params.base) {
            continue;
        }

        var best_correlation = -1.0;
        var best_lag = NULL_VALUE;

        for (var lag = 0u; lag < params.scanner; lag++) {
            let candidate_start = station * params.samples + time_index + lag;
            if (!is_clean_segment(candidate_start, params.window)) {
                continue;
            }

            var sum_b = 0.0;
            var sum_qb = 0.0;
            var sum_ab = 0.0;
            for (var j = 0u; j < params.window; j++) {
                let a = signals[base_start + j];
                let b = signals[candidate_start + j];
                sum_b += b;
                sum_qb += b * b;
                sum_ab += a * b;
            }

            let numerator = sum_ab * w - sum_a * sum_b;
            if (numerator < 0.0) {
                continue;
            }
            let denominator = sqrt((sum_qa * w - sum_a * sum_a) * (sum_qb * w - sum_b * sum_b));
            if (denominator == 0.0) {
                continue;
            }

            let correlation = numerator / denominator;
            if (correlation >= params.min_correlation && best_correlation < correlation) {
                best_correlation = correlation;
                best_lag = i32(lag);
            }
        }

        delays[row + station + 1u] = best_lag;
        if (best_lag != NULL_VALUE) {
            selected += 1u;
        }
    }

    delays[row] = i32(selected > MIN_STATIONS_COUNT);
}
"#;

/// Residual-cube kernel (one work item per `(event, node)` pair).
pub const CUBE_SHADER: &str = r#"
struct CubeParams {
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

@group(0) @binding(0) var<uniform> params: CubeParams;
@group(0) @binding(1) var<storage, read> model: array<f32>;
@group(0) @binding(2) var<storage, read> delays: array<i32>;
@group(0) @binding(3) var<storage, read> coords: array<f32>;
@group(0) @binding(4) var<storage, read> origins: array<f32>;
@group(0) @binding(5) var<storage, read_write> cube: array<f32>;

const NULL_VALUE: i32 = -9999;
const NULL_F32: f32 = -9999.0;
const MAX_BISECTION_ITERATIONS: u32 = 10u;
// Stands in for the endpoint of a reflected ray in the bracket checks.
const REFLECTED_R: f32 = -3.0e38;

fn layer_index_of(altitude: f32) -> i32 {
    for (var i = 0u; i < params.layers; i++) {
        let bottom = model[i * 3u];
        let top = model[i * 3u + 1u];
        if (bottom <= altitude && altitude < top) {
            return i32(i);
        }
    }
    return -1;
}

struct RayEnd {
    r: f32,
    z: f32,
    time: f32,
    ok: bool,
}

fn trace_ray(source_r: f32, source_z: f32, target_z: f32, incidence: f32, direction: f32) -> RayEnd {
    var result = RayEnd(0.0, 0.0, 0.0, false);
    let source_layer = layer_index_of(source_z);
    let target_layer = layer_index_of(target_z);
    if (source_layer < 0 || target_layer < 0) {
        return result;
    }

    let constant = sin(incidence) / model[u32(source_layer) * 3u + 2u];
    let lo = u32(min(source_layer, target_layer));
    let hi = u32(max(source_layer, target_layer));
    for (var i = lo; i <= hi; i++) {
        if (constant * model[i * 3u + 2u] > 1.0) {
            return result;
        }
    }

    result.r = source_r;
    result.z = source_z;
    let upgoing = source_layer >= target_layer;
    var index = source_layer;
    loop {
        let bottom = model[u32(index) * 3u];
        let top = model[u32(index) * 3u + 1u];
        let velocity = model[u32(index) * 3u + 2u];

        var thickness = top - bottom;
        if (source_layer == target_layer) {
            thickness = abs(target_z - source_z);
        } else if (index == source_layer) {
            thickness = select(source_z - bottom, top - source_z, upgoing);
        } else if (index == target_layer) {
            thickness = select(top - target_z, target_z - bottom, upgoing);
        }

        let refraction = asin(constant * velocity);
        let dr = thickness * tan(refraction) * direction;
        let dl = sqrt(dr * dr + thickness * thickness);

        result.r += dr;
        result.z += thickness;
        result.time += dl / velocity * params.frequency;

        if (index == target_layer) {
            break;
        }
        index += select(1i, -1i, upgoing);
    }
    result.ok = true;
    return result;
}

fn ray_travel_time(source_r: f32, source_z: f32, receiver_r: f32, receiver_z: f32) -> i32 {
    let source_layer = layer_index_of(source_z);
    if (source_layer < 0) {
        return NULL_VALUE;
    }

    let delta_z = abs(source_z - receiver_z);
    var min_angle = atan2(0.5 * params.accuracy, delta_z);
    let layer_delta_z = model[u32(source_layer) * 3u + 1u] - source_z;
    let r_offset = abs(source_r - receiver_r);
    var max_angle = atan2(r_offset, layer_delta_z);
    let direction = select(-1.0, 1.0, receiver_r >= 0.0);

    for (var i = 0u; i < MAX_BISECTION_ITERATIONS; i++) {
        let min_ray = trace_ray(source_r, source_z, receiver_z, min_angle, direction);
        if (min_ray.ok && abs(min_ray.r - receiver_r) < params.accuracy) {
            return i32(min_ray.time);
        }

        let middle_angle = (min_angle + max_angle) / 2.0;
        let middle_ray = trace_ray(source_r, source_z, receiver_z, middle_angle, direction);
        if (middle_ray.ok && abs(middle_ray.r - receiver_r) < params.accuracy) {
            return i32(middle_ray.time);
        }

        let max_ray = trace_ray(source_r, source_z, receiver_z, max_angle, direction);
        if (max_ray.ok && abs(max_ray.r - receiver_r) < params.accuracy) {
            return i32(max_ray.time);
        }

        let min_r = select(REFLECTED_R, min_ray.r, min_ray.ok);
        let middle_r = select(REFLECTED_R, middle_ray.r, middle_ray.ok);
        let max_r = select(REFLECTED_R, max_ray.r, max_ray.ok);

        if (direction > 0.0) {
            if (min_r < receiver_r && receiver_r < middle_r) {
                max_angle = middle_angle;
            } else if (middle_r < receiver_r && receiver_r < max_r) {
                min_angle = middle_angle;
            } else {
                break;
            }
        } else {
            if (max_r < receiver_r && receiver_r < middle_r) {
                min_angle = middle_angle;
            } else if (middle_r < receiver_r && receiver_r < min_r) {
                max_angle = middle_angle;
            } else {
                break;
            }
        }
    }
    return NULL_VALUE;
}

fn node_residual(event: u32, node: vec3<f32>) -> f32 {
    let row = event * (params.stations + 1u);
    if (delays[row] != 1) {
        return NULL_F32;
    }

    let base_dx = coords[params.base * 2u] - node.x;
    let base_dy = coords[params.base * 2u + 1u] - node.y;
    let base_offset = sqrt(base_dx * base_dx + base_dy * base_dy);
    let base_time = ray_travel_time(0.0, node.z, base_offset, params.stations_altitude);
    if (base_time == NULL_VALUE) {
        return NULL_F32;
    }

    var sum = 0.0;
    var using_stations = 0u;
    for (var i = 0u; i < params.stations; i++) {
        let dx = coords[i * 2u] - node.x;
        let dy = coords[i * 2u + 1u] - node.y;
        let offset = sqrt(dx * dx + dy * dy);
        let time = ray_travel_time(0.0, node.z, offset, params.stations_altitude);
        if (time == NULL_VALUE) {
            continue;
        }
        let theoretical = time - base_time;
        if (theoretical < 0) {
            continue;
        }
        let measured = delays[row + i + 1u];
        if (measured == NULL_VALUE) {
            continue;
        }
        let delta = theoretical - measured;
        sum += f32(delta * delta);
        using_stations += 1u;
    }

    if (using_stations < 3u) {
        return NULL_F32;
    }
    return sqrt(sum) / f32(using_stations);
}

@compute @workgroup_size(64)
fn evaluate_cube(@builtin(global_invocation_id) gid: vec3<u32>) {
    let global_id = gid.y * params.id_stride + gid.x;
    let nodes = params.nx * params.ny * params.nz;
    if (global_id >= nodes * params.events) {
        return;
    }

    let event = global_id / nodes;
    let node_id = global_id % nodes;
    let plane = params.nx * params.ny;
    let node = vec3<f32>(
        f32((node_id % plane) % params.nx) * params.dx + origins[event * 3u],
        f32((node_id % plane) / params.nx) * params.dy + origins[event * 3u + 1u],
        f32(node_id / plane) * params.dz + origins[event * 3u + 2u],
    );

    let z_min = model[(params.layers - 1u) * 3u];
    let z_max = model[1u];
    if (node.z < z_min || node.z > z_max) {
        cube[global_id] = NULL_F32;
        return;
    }
    cube[global_id] = node_residual(event, node);
}
"#;

/// Cube-reduction kernel (one work item per event).
pub const REDUCE_SHADER: &str = r#"
struct ReduceParams {
    events: u32,
    nodes: u32,
    id_stride: u32,
    _pad: u32,
}

@group(0) @binding(0) var<uniform> params: ReduceParams;
@group(0) @binding(1) var<storage, read> cube: array<f32>;
@group(0) @binding(2) var<storage, read_write> best_nodes: array<i32>;
@group(0) @binding(3) var<storage, read_write> residuals: array<f32>;
@group(0) @binding(4) var<storage, read_write> invalid_counts: array<u32>;

const NULL_VALUE: i32 = -9999;
const NULL_F32: f32 = -9999.0;

@compute @workgroup_size(64)
fn reduce_cube(@builtin(global_invocation_id) gid: vec3<u32>) {
    let event = gid.y * params.id_stride + gid.x;
    if (event >= params.events) {
        return;
    }

    let start = event * params.nodes;
    var best_node = NULL_VALUE;
    var best_value = bitcast<f32>(0x7f800000u); // +inf
    var invalid = 0u;
    for (var i = 0u; i < params.nodes; i++) {
        let value = cube[start + i];
        if (value == NULL_F32) {
            invalid += 1u;
            continue;
        }
        if (value < best_value) {
            best_value = value;
            best_node = i32(i);
        }
    }

    best_nodes[event] = best_node;
    residuals[event] = best_value;
    invalid_counts[event] = invalid;
}
"#;
