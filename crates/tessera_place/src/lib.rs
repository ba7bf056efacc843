//! Simulated-annealing placement engine for the Tessera FPGA toolchain.
//!
//! Given a legal initial placement of netlist blocks onto a device grid, the
//! engine iteratively perturbs it to minimize a combined cost of estimated
//! wirelength (net bounding boxes scaled by channel capacity) and, when
//! timing-driven, estimated criticality-weighted source-to-sink delay. Moves
//! are evaluated through incremental delta updates, accepted by the
//! Metropolis criterion, and committed or reverted atomically; the schedule
//! adapts temperature, range limit, and criticality exponent to the observed
//! acceptance rate.
//!
//! # Collaborators
//!
//! The engine drives, but does not implement, timing analysis: the
//! [`SetupTimingInfo`], [`CriticalityProvider`], and [`TimingInvalidator`]
//! traits (bundled in a [`TimingContext`]) are the seam to an external STA
//! engine, and the delay model comes from `tessera_device`. Move proposals
//! come through [`MoveGenerator`]; [`UniformMoveGenerator`] is the standard
//! implementation.
//!
//! # Usage
//!
//! ```ignore
//! use tessera_place::{try_place, AnnealingSchedule, PlacerOpts, UniformMoveGenerator};
//!
//! let mut move_gen = UniformMoveGenerator::new();
//! let summary = try_place(
//!     &netlist,
//!     &grid,
//!     &mut placement,
//!     &PlacerOpts::default(),
//!     &AnnealingSchedule::default(),
//!     &mut move_gen,
//!     None,
//!     &sink,
//! )?;
//! println!("final wirelength cost: {}", summary.bb_cost);
//! ```

#![warn(missing_docs)]

pub mod data;
pub mod error;
pub mod ids;
pub mod loc;
pub mod opts;
pub mod placement;
pub mod sta;

#[cfg(test)]
pub(crate) mod testutil;

pub use data::{Block, Net, Netlist, Pin, PinKind};
pub use error::{CostKind, PlaceError};
pub use ids::{BlockId, NetId, PinId};
pub use loc::{GridLoc, MacroMember, MacroOffset, Placement, PlacementMacro};
pub use opts::{AnnealingSchedule, EffortScaling, PlaceAlgorithm, PlacerOpts, ScheduleKind};
pub use placement::{
    try_place, BlocksAffected, CreateMove, MoveContext, MoveGenerator, MoveOutcome,
    MoveOutcomeStats, MovedBlock, PlacementSummary, UniformMoveGenerator,
};
pub use sta::{CriticalityProvider, SetupTimingInfo, TimingContext, TimingInvalidator};
