//! Delay estimator: per-time-index windowed cross-correlation.
//!
//! One logical work item per time index `t` in
//! `[0, T - window_size - scanner_size - 1]`. Each item qualifies the base
//! window, accumulates base statistics once, then scans every other
//! station over `scanner_size` candidate lags for the highest windowed
//! Pearson correlation. Rows past the processed range are never touched
//! and keep their pre-zeroed content.

use rayon::prelude::*;

use seisloc_core::sentinel;
use seisloc_core::{DelayMatrix, DelayParams, Precision, Result, SignalBlock};

use crate::signal::{is_clean_segment, Accum};

/// A row is flagged valid only when strictly more than this many stations
/// produced a delay.
pub const MIN_STATIONS_COUNT: usize = 3;

/// Run the delay estimator over a whole signal block.
///
/// Rows are independent, so they are filled in parallel; each row of the
/// returned matrix is written exactly once by exactly one work item.
pub fn estimate_delays(signals: &SignalBlock, params: &DelayParams) -> Result<DelayMatrix> {
    params.validate(signals.station_count())?;

    let rows = signals.samples();
    let processed = params.processed_rows(rows);
    let mut matrix = DelayMatrix::zeroed(rows, signals.station_count());
    let stride = matrix.row_stride();

    matrix.as_mut_slice()[..processed * stride]
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(time_index, row)| estimate_row(signals, params, time_index, row));

    tracing::debug!(
        rows = processed,
        stations = signals.station_count(),
        valid = matrix.valid_row_indices().len(),
        "delay estimation finished"
    );
    Ok(matrix)
}

/// Fill one `[flag, delays..]` row for the given time index.
pub(crate) fn estimate_row(
    signals: &SignalBlock,
    params: &DelayParams,
    time_index: usize,
    row: &mut [i32],
) {
    match params.precision {
        Precision::Single => estimate_row_with::<f32>(signals, params, time_index, row),
        Precision::Double => estimate_row_with::<f64>(signals, params, time_index, row),
    }
}

fn estimate_row_with<A: Accum>(
    signals: &SignalBlock,
    params: &DelayParams,
    time_index: usize,
    row: &mut [i32],
) {
    let samples = signals.samples();
    let data = signals.as_slice();
    let window = params.window_size;

    let base_start = params.base_station * samples + time_index;
    if !is_clean_segment(data, base_start, window) {
        return;
    }

    // Base statistics over the window: sums for the correlation, extrema
    // for the constant-window check.
    let mut sum_a = A::ZERO;
    let mut sum_qa = A::ZERO;
    let mut min_value = data[base_start];
    let mut max_value = data[base_start];
    for &value in &data[base_start..base_start + window] {
        min_value = min_value.min(value);
        max_value = max_value.max(value);
        let v = A::from_f32(value);
        sum_a = sum_a + v;
        sum_qa = sum_qa + v * v;
    }
    if min_value == max_value {
        return;
    }

    let w = A::from_f32(window as f32);
    let min_correlation = A::from_f32(params.min_correlation);
    let mut selected = 0usize;

    for station in 0..signals.station_count() {
        if station == params.base_station {
            continue;
        }

        let mut best_correlation = A::from_f32(-1.0);
        let mut best_lag: Option<i32> = None;

        for lag in 0..params.scanner_size {
            let candidate_start = station * samples + time_index + lag;
            if !is_clean_segment(data, candidate_start, window) {
                continue;
            }

            let mut sum_b = A::ZERO;
            let mut sum_qb = A::ZERO;
            let mut sum_ab = A::ZERO;
            for j in 0..window {
                let a = A::from_f32(data[base_start + j]);
                let b = A::from_f32(data[candidate_start + j]);
                sum_b = sum_b + b;
                sum_qb = sum_qb + b * b;
                sum_ab = sum_ab + a * b;
            }

            // Negative correlations are forbidden.
            let numerator = sum_ab * w - sum_a * sum_b;
            if numerator < A::ZERO {
                continue;
            }

            let denominator = ((sum_qa * w - sum_a * sum_a) * (sum_qb * w - sum_b * sum_b)).sqrt();
            if denominator == A::ZERO {
                continue;
            }

            let correlation = numerator / denominator;
            // Strict improvement keeps the earliest lag on ties.
            if correlation >= min_correlation && best_correlation < correlation {
                best_correlation = correlation;
                best_lag = Some(lag as i32);
            }
        }

        row[station + 1] = sentinel::encode_i32(best_lag);
        if best_lag.is_some() {
            selected += 1;
        }
    }

    row[0] = i32::from(selected > MIN_STATIONS_COUNT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use seisloc_core::sentinel::NULL_I32;

    fn params(window: usize, scanner: usize, min_correlation: f32) -> DelayParams {
        DelayParams {
            window_size: window,
            scanner_size: scanner,
            min_correlation,
            base_station: 0,
            precision: Precision::Single,
        }
    }

    fn shifted_block(stations: usize, samples: usize) -> SignalBlock {
        // Station s sees the same waveform s samples late. The ramp keeps
        // adjacent samples distinct, the sine keeps windows correlating
        // best at the true lag.
        let mut block = SignalBlock::zeroed(stations, samples).unwrap();
        for s in 0..stations {
            let channel = block.channel_mut(s);
            for (i, value) in channel.iter_mut().enumerate() {
                let t = i as f32 - s as f32;
                *value = t + t.sin();
            }
        }
        block
    }

    #[test]
    fn constant_base_channel_invalidates_every_row() {
        // Flat base channel, lively second channel.
        let mut block = SignalBlock::zeroed(2, 16).unwrap();
        block.channel_mut(0).fill(1.0);
        for (i, v) in block.channel_mut(1).iter_mut().enumerate() {
            *v = (i as f32).sin();
        }
        let matrix = estimate_delays(&block, &params(4, 2, 0.5)).unwrap();
        for t in 0..matrix.rows() {
            assert!(!matrix.is_valid(t));
        }
    }

    #[test]
    fn identical_channels_lock_at_zero_lag() {
        let mut block = SignalBlock::zeroed(2, 64).unwrap();
        for s in 0..2 {
            for (i, v) in block.channel_mut(s).iter_mut().enumerate() {
                *v = (i % 7) as f32;
            }
        }
        let p = params(4, 3, 0.5);
        let matrix = estimate_delays(&block, &p).unwrap();
        for t in 0..p.processed_rows(64) {
            // Later lags tie at perfect correlation inside monotone runs;
            // the strict comparison keeps the earliest lag.
            assert_eq!(matrix.delay(t, 1), Some(0), "row {t}");
            // Two stations can never clear the >3 corroboration gate.
            assert!(!matrix.is_valid(t));
        }
    }

    #[test]
    fn synthetic_shift_is_recovered_per_station() {
        let block = shifted_block(6, 256);
        let p = params(16, 8, 0.8);
        let matrix = estimate_delays(&block, &p).unwrap();
        // Sample a stretch of the interior.
        for t in 32..64 {
            for s in 1..6 {
                assert_eq!(matrix.delay(t, s), Some(s as i32), "t={t} s={s}");
            }
            assert!(matrix.is_valid(t), "t={t}");
        }
    }

    #[test]
    fn tail_rows_stay_zeroed() {
        let block = shifted_block(2, 64);
        let p = params(16, 8, 0.8);
        let matrix = estimate_delays(&block, &p).unwrap();
        for t in p.processed_rows(64)..64 {
            assert_eq!(matrix.row(t), &[0, 0, 0][..], "t={t}");
        }
    }

    #[test]
    fn degenerate_candidate_window_yields_null() {
        let mut block = SignalBlock::zeroed(2, 32).unwrap();
        for (i, v) in block.channel_mut(0).iter_mut().enumerate() {
            *v = (i as f32 * 0.7).sin() + 0.01 * i as f32;
        }
        // Station 1 is flat: every candidate window fails qualification.
        block.channel_mut(1).fill(2.5);
        let matrix = estimate_delays(&block, &params(8, 4, 0.5)).unwrap();
        for t in 0..matrix.rows() {
            assert_eq!(matrix.row(t)[2], if t < 20 { NULL_I32 } else { 0 });
        }
    }

    #[test]
    fn double_precision_agrees_on_clean_data() {
        let block = shifted_block(5, 128);
        let mut p = params(16, 8, 0.8);
        let single = estimate_delays(&block, &p).unwrap();
        p.precision = Precision::Double;
        let double = estimate_delays(&block, &p).unwrap();
        assert_eq!(single.as_slice(), double.as_slice());
    }
}
