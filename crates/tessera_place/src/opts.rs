//! Placer options and annealing schedule configuration.

use crate::error::PlaceError;
use serde::{Deserialize, Serialize};

/// Which cost function drives move acceptance.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PlaceAlgorithm {
    /// Minimize estimated wirelength only.
    BoundingBox,
    /// Minimize a normalized blend of wirelength and criticality-weighted delay.
    PathTimingDriven,
}

/// How the per-temperature move limit scales with the problem.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EffortScaling {
    /// Moves scale with circuit size: `inner_num * num_blocks^(4/3)`.
    Circuit,
    /// Moves scale with both device and circuit size:
    /// `inner_num * device_size^(2/3) * num_blocks^(2/3)`.
    DeviceCircuit,
}

/// The annealing schedule family.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ScheduleKind {
    /// Fixed user-specified starting temperature, decay, and exit threshold.
    User,
    /// Success-rate-adaptive decay with an automatic exit criterion.
    Auto,
    /// Success-rate-responsive schedule that restarts from a warmer
    /// temperature and slows its decay when progress stalls.
    Dusty,
}

/// Annealing schedule parameters.
///
/// Only a subset applies to each [`ScheduleKind`]: `init_t`/`alpha_t`/`exit_t`
/// drive the User schedule, while the `alpha_*` and `success_*` fields drive
/// Dusty. `inner_num` scales the per-temperature move limit for all kinds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnealingSchedule {
    /// The schedule family.
    pub kind: ScheduleKind,
    /// Starting temperature (User schedule only).
    pub init_t: f64,
    /// Temperature decay factor per outer iteration (User schedule only).
    pub alpha_t: f64,
    /// Exit temperature (User schedule only).
    pub exit_t: f64,
    /// Initial decay factor (Dusty schedule).
    pub alpha_min: f64,
    /// Decay factor beyond which the Dusty schedule terminates.
    pub alpha_max: f64,
    /// How quickly the Dusty decay factor approaches 1 on restart.
    pub alpha_decay: f64,
    /// Success rate above which the Dusty schedule records a restart point.
    pub success_target: f64,
    /// Success rate below which the Dusty schedule restarts.
    pub success_min: f64,
    /// Scale factor on the per-temperature move limit.
    pub inner_num: f64,
}

impl Default for AnnealingSchedule {
    fn default() -> Self {
        Self {
            kind: ScheduleKind::Auto,
            init_t: 100.0,
            alpha_t: 0.8,
            exit_t: 0.01,
            alpha_min: 0.2,
            alpha_max: 0.9,
            alpha_decay: 0.7,
            success_target: 0.25,
            success_min: 0.1,
            inner_num: 1.0,
        }
    }
}

/// Options controlling the placement engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlacerOpts {
    /// Which cost function drives acceptance.
    pub algorithm: PlaceAlgorithm,
    /// Exponent applied to inverse average channel width in the wiring cost.
    /// Values above 1 penalize narrow channels more heavily.
    pub place_cost_exp: f64,
    /// Timing/wirelength blend in `[0, 1]`; 0 is pure wirelength, 1 pure timing.
    pub timing_tradeoff: f64,
    /// Fraction of moves proposed with an unbounded range limit, to escape
    /// local minima. Must be in `[0, 1]`.
    pub rlim_escape_fraction: f64,
    /// Criticality exponent at the start of annealing (full range limit).
    pub td_place_exp_first: f64,
    /// Criticality exponent at the end of annealing (range limit 1).
    pub td_place_exp_last: f64,
    /// Outer iterations between criticality recomputations.
    pub recompute_crit_iter: usize,
    /// Criticality recomputations per inner loop (0 = none).
    pub inner_loop_recompute_divider: usize,
    /// Criticality recomputations during the quench (0 = none).
    pub quench_recompute_divider: usize,
    /// How the per-temperature move limit scales.
    pub effort_scaling: EffortScaling,
    /// Seed for the move/acceptance random stream; a fixed seed makes the
    /// whole anneal reproducible.
    pub seed: u64,
}

impl Default for PlacerOpts {
    fn default() -> Self {
        Self {
            algorithm: PlaceAlgorithm::BoundingBox,
            place_cost_exp: 1.0,
            timing_tradeoff: 0.5,
            rlim_escape_fraction: 0.0,
            td_place_exp_first: 1.0,
            td_place_exp_last: 8.0,
            recompute_crit_iter: 1,
            inner_loop_recompute_divider: 0,
            quench_recompute_divider: 0,
            effort_scaling: EffortScaling::Circuit,
            seed: 0,
        }
    }
}

impl PlacerOpts {
    /// Checks option ranges, returning an error for values the engine
    /// cannot work with.
    pub fn validate(&self) -> Result<(), PlaceError> {
        if !(0.0..=1.0).contains(&self.timing_tradeoff) {
            return Err(PlaceError::InvalidOption {
                reason: format!("timing_tradeoff {} outside [0, 1]", self.timing_tradeoff),
            });
        }
        if !(0.0..=1.0).contains(&self.rlim_escape_fraction) {
            return Err(PlaceError::InvalidOption {
                reason: format!(
                    "rlim_escape_fraction {} outside [0, 1]",
                    self.rlim_escape_fraction
                ),
            });
        }
        if !self.place_cost_exp.is_finite() || self.place_cost_exp < 0.0 {
            return Err(PlaceError::InvalidOption {
                reason: format!("place_cost_exp {} must be finite and >= 0", self.place_cost_exp),
            });
        }
        Ok(())
    }
}
