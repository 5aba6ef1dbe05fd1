//! Event picking from the delay matrix.
//!
//! Every valid delay row is a candidate event anchored at its time index.
//! Consecutive candidates usually describe the same physical event seen
//! through overlapping windows, so candidates whose delay patterns are
//! close enough are merged into the earliest one, which absorbs their
//! span into its duration.

use seisloc_core::sentinel::NULL_I32;
use seisloc_core::{DelayMatrix, DelayParams};

/// Fraction of station columns that must match for two rows to merge.
pub const SIMILARITY_THRESHOLD: f32 = 0.8;

/// Two delays match when they differ by at most this many samples.
pub const TIME_EPSILON: i32 = 5;

/// One picked event: a delay row plus its time anchor and duration.
#[derive(Debug, Clone, PartialEq)]
pub struct PickedEvent {
    /// Time index of the first row merged into this event.
    pub time_index: usize,
    /// Event span in samples (window length plus absorbed rows).
    pub duration: usize,
    /// The `[flag, delays..]` row of the anchor time index.
    pub delays: Vec<i32>,
}

/// Fraction of station columns on which two sentinel-encoded rows agree.
///
/// A column agrees when the delays differ by at most [`TIME_EPSILON`]
/// samples, or when the difference is dominated by the absence sentinel:
/// a missing delay is treated as non-informative rather than
/// contradicting.
pub fn row_similarity(a: &[i32], b: &[i32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let sentinel_gap = NULL_I32.abs() / 2;
    let matching = a
        .iter()
        .zip(b)
        .filter(|(&x, &y)| {
            let diff = (x - y).abs();
            diff <= TIME_EPSILON || diff > sentinel_gap
        })
        .count();
    matching as f32 / a.len() as f32
}

/// Pick events from the estimator output.
///
/// Valid rows are scanned in time order; each unclaimed row starts an
/// event and absorbs similar rows among the following `scanner_size`
/// candidates. The event duration grows from the window length by the
/// distance (in candidate rows) to the last absorbed row.
pub fn pick_events(matrix: &DelayMatrix, params: &DelayParams) -> Vec<PickedEvent> {
    let valid = matrix.valid_row_indices();
    let mut absorbed = vec![false; valid.len()];
    let mut events = Vec::new();

    for i in 0..valid.len() {
        if absorbed[i] {
            continue;
        }
        let anchor = matrix.row(valid[i]);
        let mut last_merged = i;
        let horizon = (i + params.scanner_size + 1).min(valid.len());
        for j in i + 1..horizon {
            if absorbed[j] {
                continue;
            }
            let candidate = matrix.row(valid[j]);
            if row_similarity(&anchor[1..], &candidate[1..]) >= SIMILARITY_THRESHOLD {
                absorbed[j] = true;
                last_merged = j;
            }
        }
        events.push(PickedEvent {
            time_index: valid[i],
            duration: last_merged - i + params.window_size,
            delays: anchor.to_vec(),
        });
    }

    tracing::debug!(
        candidates = valid.len(),
        events = events.len(),
        "event picking finished"
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use seisloc_core::Precision;

    fn params() -> DelayParams {
        DelayParams {
            window_size: 16,
            scanner_size: 4,
            min_correlation: 0.8,
            base_station: 0,
            precision: Precision::Single,
        }
    }

    fn matrix_with_rows(rows: &[(usize, [i32; 5])]) -> DelayMatrix {
        let mut matrix = DelayMatrix::zeroed(64, 4);
        for &(t, row) in rows {
            let stride = matrix.row_stride();
            matrix.as_mut_slice()[t * stride..(t + 1) * stride].copy_from_slice(&row);
        }
        matrix
    }

    #[test]
    fn similarity_counts_close_and_sentinel_columns() {
        let a = [0, 3, 7, NULL_I32];
        let b = [1, 9, 7, 2];
        // diffs: 1 (close), 6 (far), 0 (close), sentinel (non-informative).
        assert!((row_similarity(&a, &b) - 0.75).abs() < 1e-6);
        assert_eq!(row_similarity(&a, &a), 1.0);
    }

    #[test]
    fn similar_neighbors_merge_into_one_event() {
        let matrix = matrix_with_rows(&[
            (10, [1, 0, 4, 7, 2]),
            (11, [1, 0, 4, 8, 2]),
            (12, [1, 0, 5, 7, 3]),
        ]);
        let events = pick_events(&matrix, &params());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time_index, 10);
        // Two absorbed rows extend the window-length duration by two.
        assert_eq!(events[0].duration, 18);
        assert_eq!(events[0].delays, vec![1, 0, 4, 7, 2]);
    }

    #[test]
    fn dissimilar_rows_stay_separate() {
        let matrix = matrix_with_rows(&[(10, [1, 0, 4, 7, 2]), (11, [1, 0, 90, 80, 70])]);
        let events = pick_events(&matrix, &params());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].duration, 16);
        assert_eq!(events[1].time_index, 11);
    }

    #[test]
    fn merge_horizon_is_bounded_by_scanner_size() {
        // Six identical valid rows, scanner_size 4: the first event can
        // only absorb the four following candidates.
        let rows: Vec<(usize, [i32; 5])> = (10..16).map(|t| (t, [1, 0, 4, 7, 2])).collect();
        let matrix = matrix_with_rows(&rows);
        let events = pick_events(&matrix, &params());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time_index, 10);
        assert_eq!(events[0].duration, 4 + 16);
        assert_eq!(events[1].time_index, 15);
    }

    #[test]
    fn no_valid_rows_no_events() {
        let matrix = DelayMatrix::zeroed(32, 4);
        assert!(pick_events(&matrix, &params()).is_empty());
    }
}
