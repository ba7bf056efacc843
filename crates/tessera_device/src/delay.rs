//! Source-to-sink delay estimation for placement.
//!
//! The placer only ever asks one question of the timing model: how long does a
//! signal take from a driver pin at one grid position to a sink pin at
//! another. [`DelayModel`] is that contract. [`DeltaDelayModel`] is the
//! standard implementation: a lookup table indexed by coordinate deltas,
//! profiled once per device before placement begins.

use serde::{Deserialize, Serialize};

/// Estimates the routing delay of a single source-to-sink connection.
///
/// Implementations must return a non-negative delay in seconds; the placer
/// treats a negative return as a fatal modeling error.
pub trait DelayModel {
    /// Returns the estimated delay from a driver pin at `(src_x, src_y)` to a
    /// sink pin at `(sink_x, sink_y)`.
    ///
    /// `src_pin` and `sink_pin` are the physical pin indices on their tiles;
    /// a model may ignore them and estimate from position alone.
    fn delay(
        &self,
        src_x: i32,
        src_y: i32,
        src_pin: usize,
        sink_x: i32,
        sink_y: i32,
        sink_pin: usize,
    ) -> f32;
}

/// A delay model backed by a table indexed by `(|dx|, |dy|)`.
///
/// Deltas beyond the table bounds are clamped to the last entry, so a model
/// profiled on an `N x M` device remains usable (if pessimistic) for larger
/// spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaDelayModel {
    /// Delay in seconds for each `(|dx|, |dy|)` pair, indexed `[dx][dy]`.
    delays: Vec<Vec<f32>>,
}

impl DeltaDelayModel {
    /// Creates a model from an explicit delta table.
    ///
    /// `delays[dx][dy]` gives the delay for a connection spanning `dx`
    /// columns and `dy` rows. The table must be non-empty and rectangular.
    pub fn from_table(delays: Vec<Vec<f32>>) -> Self {
        assert!(!delays.is_empty() && !delays[0].is_empty());
        let dy_len = delays[0].len();
        assert!(delays.iter().all(|row| row.len() == dy_len));
        Self { delays }
    }

    /// Creates a model where delay grows linearly with Manhattan distance.
    ///
    /// Covers deltas up to `(width - 1, height - 1)` at `delay_per_tile`
    /// seconds per tile crossed.
    pub fn linear(width: usize, height: usize, delay_per_tile: f32) -> Self {
        let delays = (0..width.max(1))
            .map(|dx| {
                (0..height.max(1))
                    .map(|dy| (dx + dy) as f32 * delay_per_tile)
                    .collect()
            })
            .collect();
        Self { delays }
    }
}

impl DelayModel for DeltaDelayModel {
    fn delay(
        &self,
        src_x: i32,
        src_y: i32,
        _src_pin: usize,
        sink_x: i32,
        sink_y: i32,
        _sink_pin: usize,
    ) -> f32 {
        let dx = (src_x.abs_diff(sink_x) as usize).min(self.delays.len() - 1);
        let dy = (src_y.abs_diff(sink_y) as usize).min(self.delays[0].len() - 1);
        self.delays[dx][dy]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_model_scales_with_distance() {
        let model = DeltaDelayModel::linear(10, 10, 1e-10);
        assert_eq!(model.delay(0, 0, 0, 0, 0, 0), 0.0);
        assert_eq!(model.delay(0, 0, 0, 3, 0, 0), 3e-10);
        assert_eq!(model.delay(2, 5, 0, 4, 1, 0), 6e-10);
    }

    #[test]
    fn delay_is_symmetric_in_direction() {
        let model = DeltaDelayModel::linear(8, 8, 2e-10);
        assert_eq!(
            model.delay(1, 1, 0, 5, 3, 0),
            model.delay(5, 3, 0, 1, 1, 0)
        );
    }

    #[test]
    fn out_of_table_deltas_clamp() {
        let model = DeltaDelayModel::from_table(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        // dx=5, dy=9 clamps to the (1, 1) entry
        assert_eq!(model.delay(0, 0, 0, 5, 9, 0), 4.0);
    }

    #[test]
    fn explicit_table_lookup() {
        let model = DeltaDelayModel::from_table(vec![vec![0.0, 1.5], vec![2.5, 5.0]]);
        assert_eq!(model.delay(3, 3, 0, 3, 4, 0), 1.5);
        assert_eq!(model.delay(3, 3, 0, 4, 3, 0), 2.5);
        assert_eq!(model.delay(3, 3, 0, 4, 4, 0), 5.0);
    }

    #[test]
    #[should_panic]
    fn ragged_table_panics() {
        DeltaDelayModel::from_table(vec![vec![0.0, 1.0], vec![2.0]]);
    }

    #[test]
    fn serde_roundtrip() {
        let model = DeltaDelayModel::linear(4, 4, 1e-10);
        let json = serde_json::to_string(&model).unwrap();
        let restored: DeltaDelayModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.delay(0, 0, 0, 2, 1, 0), 3e-10);
    }
}
