//! Error types for the placement engine.

use std::fmt;

/// Which accumulated cost diverged from its from-scratch recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostKind {
    /// The bounding-box wirelength cost.
    BoundingBox,
    /// The criticality-weighted timing cost.
    Timing,
}

impl fmt::Display for CostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostKind::BoundingBox => write!(f, "bounding-box"),
            CostKind::Timing => write!(f, "timing"),
        }
    }
}

/// Errors that abort placement.
///
/// Every variant is fatal: once incremental and recomputed costs disagree or
/// the location maps fall out of sync, no further annealing result can be
/// trusted.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    /// A placer option is out of range or inconsistent with the run setup.
    #[error("invalid placer option: {reason}")]
    InvalidOption {
        /// Description of the offending option.
        reason: String,
    },

    /// The delay model returned a negative delay for a connection.
    #[error(
        "delay model returned {delay} for connection ({src_x},{src_y}) -> ({sink_x},{sink_y}); \
         delays must be non-negative"
    )]
    NegativeDelay {
        /// The offending delay value.
        delay: f32,
        /// Source pin x position.
        src_x: i32,
        /// Source pin y position.
        src_y: i32,
        /// Sink pin x position.
        sink_x: i32,
        /// Sink pin y position.
        sink_y: i32,
    },

    /// An incrementally maintained cost drifted beyond tolerance from its
    /// from-scratch recomputation.
    #[error(
        "{kind} cost drift: incremental {incremental} vs recomputed {recomputed} \
         (relative tolerance {tolerance})"
    )]
    CostDrift {
        /// Which cost diverged.
        kind: CostKind,
        /// The incrementally maintained value.
        incremental: f64,
        /// The from-scratch value.
        recomputed: f64,
        /// The relative tolerance that was exceeded.
        tolerance: f64,
    },

    /// The block-to-grid and grid-to-block maps disagree, a block sits on an
    /// incompatible tile, or a macro member is out of formation.
    #[error("placement consistency check failed with {errors} error(s)")]
    Inconsistent {
        /// Number of consistency violations found.
        errors: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_drift_display() {
        let err = PlaceError::CostDrift {
            kind: CostKind::BoundingBox,
            incremental: 10.5,
            recomputed: 12.0,
            tolerance: 0.01,
        };
        let msg = err.to_string();
        assert!(msg.contains("bounding-box"));
        assert!(msg.contains("10.5"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn negative_delay_display() {
        let err = PlaceError::NegativeDelay {
            delay: -1.0,
            src_x: 1,
            src_y: 2,
            sink_x: 3,
            sink_y: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("-1"));
        assert!(msg.contains("(1,2)"));
        assert!(msg.contains("(3,4)"));
    }

    #[test]
    fn invalid_option_display() {
        let err = PlaceError::InvalidOption {
            reason: "timing_tradeoff 2 outside [0, 1]".into(),
        };
        assert!(err.to_string().contains("timing_tradeoff"));
    }

    #[test]
    fn inconsistent_display() {
        let err = PlaceError::Inconsistent { errors: 3 };
        assert!(err.to_string().contains("3 error(s)"));
    }

    #[test]
    fn cost_kind_display() {
        assert_eq!(CostKind::BoundingBox.to_string(), "bounding-box");
        assert_eq!(CostKind::Timing.to_string(), "timing");
    }
}
