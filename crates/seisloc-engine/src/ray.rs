//! Ray tracing through a horizontally layered medium.
//!
//! A ray leaves the source with an incidence angle measured from the
//! vertical; Snell's law keeps `sin(theta) / v` constant across layer
//! boundaries, so the trace marches layer by layer from the source toward
//! the target altitude, accumulating lateral offset, depth covered, and
//! travel time. When refraction breaks down (`sin > 1`) or an altitude
//! falls outside the model, the ray is reported as reflected and carries
//! no arrival. Angle arithmetic is in f64, matching the reference device
//! kernels; accumulated quantities stay f32.

use seisloc_core::VelocityModel;

/// Bisection budget of the travel-time solver.
pub const MAX_BISECTION_ITERATIONS: usize = 10;

/// End point of a traced ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePoint {
    /// Lateral offset from the source axis.
    pub r: f32,
    /// Altitude reached.
    pub z: f32,
    /// Travel time in sample counts (seconds times `frequency`).
    pub time: f32,
}

/// Which lateral half-plane the ray is traced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateralDirection {
    /// Toward positive lateral offsets.
    Positive,
    /// Toward negative lateral offsets.
    Negative,
}

impl LateralDirection {
    /// Direction that reaches a receiver at lateral offset `r`.
    #[inline]
    pub fn toward(receiver_r: f32) -> Self {
        if receiver_r >= 0.0 {
            Self::Positive
        } else {
            Self::Negative
        }
    }

    #[inline]
    fn sign(self) -> f32 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

/// Snell invariant `sin(theta) / v` of a ray leaving with `incidence` in a
/// layer of velocity `vp`.
#[inline]
pub fn ray_constant(incidence: f64, vp: f32) -> f64 {
    incidence.sin() / f64::from(vp)
}

/// Trace a single ray from `(source_r, source_z)` to the target altitude.
///
/// Returns `None` when the ray reflects: either altitude outside the
/// model, or `ray_constant * v > 1` in any traversed layer.
pub fn trace_ray(
    model: &VelocityModel,
    source_r: f32,
    source_z: f32,
    target_z: f32,
    incidence: f64,
    direction: LateralDirection,
    frequency: i32,
) -> Option<TracePoint> {
    let source_layer = model.layer_index_of(source_z)?;
    let target_layer = model.layer_index_of(target_z)?;
    let constant = ray_constant(incidence, model.layer(source_layer).vp);

    let lo = source_layer.min(target_layer);
    let hi = source_layer.max(target_layer);
    for index in lo..=hi {
        if constant * f64::from(model.layer(index).vp) > 1.0 {
            return None;
        }
    }

    let mut point = TracePoint {
        r: source_r,
        z: source_z,
        time: 0.0,
    };

    // Indices are stored top-down, so an upgoing ray walks them downward.
    let upgoing = source_layer >= target_layer;
    let mut index = source_layer;
    loop {
        let layer = model.layer(index);
        let thickness = if source_layer == target_layer {
            (target_z - source_z).abs()
        } else if index == source_layer {
            if upgoing {
                layer.top - source_z
            } else {
                source_z - layer.bottom
            }
        } else if index == target_layer {
            if upgoing {
                target_z - layer.bottom
            } else {
                layer.top - target_z
            }
        } else {
            layer.thickness()
        };

        let refraction = (constant * f64::from(layer.vp)).asin();
        let dr = thickness * refraction.tan() as f32 * direction.sign();
        let dl = (dr * dr + thickness * thickness).sqrt();

        point.r += dr;
        point.z += thickness;
        point.time += dl / layer.vp * frequency as f32;

        if index == target_layer {
            break;
        }
        if upgoing {
            index -= 1;
        } else {
            index += 1;
        }
    }
    Some(point)
}

/// Integer travel time of a ray from `(source_r, source_z)` landing within
/// `accuracy` of a receiver at `(receiver_r, receiver_z)`.
///
/// Three-point bisection over the incidence angle: the bracket opens
/// between the near-vertical angle that covers half the tolerance and the
/// straight-line angle to the receiver through the source layer, then
/// narrows around whichever sub-interval straddles the receiver offset.
/// `None` when the budget runs out or every bracket endpoint reflects.
pub fn ray_travel_time(
    model: &VelocityModel,
    source_r: f32,
    source_z: f32,
    receiver_r: f32,
    receiver_z: f32,
    accuracy: f32,
    frequency: i32,
) -> Option<i32> {
    let source_layer = model.layer_index_of(source_z)?;

    let delta_z = (source_z - receiver_z).abs();
    let mut min_angle = f64::from(0.5 * accuracy).atan2(f64::from(delta_z));

    let layer_delta_z = model.layer(source_layer).top - source_z;
    let r_offset = (source_r - receiver_r).abs();
    let mut max_angle = f64::from(r_offset).atan2(f64::from(layer_delta_z));

    let direction = LateralDirection::toward(receiver_r);
    let trace = |angle: f64| {
        trace_ray(
            model, source_r, source_z, receiver_z, angle, direction, frequency,
        )
    };
    // A reflected trace has no endpoint and can never bracket the receiver.
    let end_r = |ray: &Option<TracePoint>| ray.map_or(f32::NEG_INFINITY, |p| p.r);
    let hit = |ray: &Option<TracePoint>| {
        ray.and_then(|p| ((p.r - receiver_r).abs() < accuracy).then_some(p.time as i32))
    };

    for _ in 0..MAX_BISECTION_ITERATIONS {
        let min_ray = trace(min_angle);
        if let Some(time) = hit(&min_ray) {
            return Some(time);
        }

        let middle_angle = (min_angle + max_angle) / 2.0;
        let middle_ray = trace(middle_angle);
        if let Some(time) = hit(&middle_ray) {
            return Some(time);
        }

        let max_ray = trace(max_angle);
        if let Some(time) = hit(&max_ray) {
            return Some(time);
        }

        let (min_r, middle_r, max_r) = (end_r(&min_ray), end_r(&middle_ray), end_r(&max_ray));
        match direction {
            LateralDirection::Positive => {
                if min_r < receiver_r && receiver_r < middle_r {
                    max_angle = middle_angle;
                } else if middle_r < receiver_r && receiver_r < max_r {
                    min_angle = middle_angle;
                } else {
                    break;
                }
            }
            LateralDirection::Negative => {
                if max_r < receiver_r && receiver_r < middle_r {
                    min_angle = middle_angle;
                } else if middle_r < receiver_r && receiver_r < min_r {
                    max_angle = middle_angle;
                } else {
                    break;
                }
            }
        }
    }
    None
}
