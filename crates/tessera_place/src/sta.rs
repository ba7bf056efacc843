//! Timing-analysis collaborator contracts.
//!
//! The placer drives a static timing analyzer but does not implement one.
//! These traits are the seam: [`SetupTimingInfo`] runs the analysis and
//! reports path metrics, [`CriticalityProvider`] turns slacks into per-sink
//! criticalities in `[0, 1]`, and [`TimingInvalidator`] receives the set of
//! connections whose delay changed so the next analysis can be incremental.
//! [`TimingContext`] bundles mutable borrows of all of them plus the delay
//! model for the duration of a timing-driven run.

use crate::ids::{NetId, PinId};
use tessera_device::DelayModel;

/// A setup-time static timing analyzer driven by the placer.
pub trait SetupTimingInfo {
    /// Re-runs the analysis against the current connection delays.
    fn update(&mut self);

    /// Returns the delay of the least-slack critical path, in seconds.
    fn least_slack_critical_path_delay(&self) -> f32;

    /// Returns the setup total negative slack, in seconds (<= 0).
    fn setup_total_negative_slack(&self) -> f32;

    /// Returns the setup worst negative slack, in seconds (<= 0).
    fn setup_worst_negative_slack(&self) -> f32;
}

/// Per-connection criticalities derived from the last timing analysis.
pub trait CriticalityProvider {
    /// Refreshes criticalities from the analyzer's current slacks, sharpening
    /// them with `crit_exponent`.
    fn update_criticalities(&mut self, timing_info: &dyn SetupTimingInfo, crit_exponent: f32);

    /// Returns the criticality of the connection to `sink` (1-based index) on
    /// `net`, in `[0, 1]`.
    fn criticality(&self, net: NetId, sink: usize) -> f32;

    /// Returns the pins whose criticality changed in the last
    /// [`update_criticalities`](Self::update_criticalities) call.
    fn pins_with_modified_criticality(&self) -> &[PinId];
}

/// Receives the connections whose delay changed since the last analysis.
pub trait TimingInvalidator {
    /// Marks the connection ending at `pin` as needing re-analysis.
    fn invalidate_connection(&mut self, pin: PinId);

    /// Clears all pending invalidations after a completed analysis.
    fn reset(&mut self);
}

/// The timing collaborators borrowed for a timing-driven placement run.
pub struct TimingContext<'a> {
    /// Source-to-sink delay estimator.
    pub delay_model: &'a dyn DelayModel,
    /// The timing analyzer.
    pub timing_info: &'a mut dyn SetupTimingInfo,
    /// Criticality lookup refreshed from the analyzer.
    pub criticalities: &'a mut dyn CriticalityProvider,
    /// Sink for changed-delay notifications.
    pub invalidator: &'a mut dyn TimingInvalidator,
}
