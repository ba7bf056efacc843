//! The simulated-annealing placement engine.
//!
//! Submodules, leaves first: `cost` holds the channel-factor tables and the
//! per-net wiring cost; `bb` the from-scratch and incremental bounding-box
//! calculators; `timing` the per-connection delay/cost caches with their
//! shadow pairs; `moves` the move-generator contract and transaction
//! helpers; `swap` the single-move trial; `check` the invariant checker;
//! and `anneal` the controller that drives everything.
//!
//! All mutable cost state lives in one `PlacerState` value owned for the
//! duration of a [`try_place`] call. Scratch arrays carry sentinels
//! (`proposed_net_cost < 0`, shadow delays `NaN`) that are restored at every
//! trial boundary by both the commit and revert paths.

mod anneal;
mod bb;
mod check;
mod cost;
mod moves;
mod swap;
mod timing;

pub use anneal::{try_place, PlacementSummary};
pub use moves::{
    BlocksAffected, CreateMove, MoveContext, MoveGenerator, MoveOutcome, MoveOutcomeStats,
    MovedBlock, UniformMoveGenerator,
};

use crate::data::Netlist;
use crate::ids::NetId;
use crate::loc::Placement;
use crate::opts::{PlaceAlgorithm, PlacerOpts};
use bb::{BbUpdate, NetBox};
use cost::ChanCostFactors;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tessera_device::DeviceGrid;
use tessera_diagnostics::DiagnosticSink;
use timing::TimingCosts;

/// Relative tolerance for incremental vs from-scratch cost agreement.
pub(crate) const ERROR_TOL: f64 = 0.01;

/// The accumulated cost totals.
///
/// Deltas are computed in `f32`-friendly magnitudes but accumulated in `f64`
/// so round-off stays small relative to the totals on large designs.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Costs {
    /// The normalized combined cost (reset to 1 each temperature when
    /// timing-driven).
    pub cost: f64,
    /// Total bounding-box wirelength cost.
    pub bb_cost: f64,
    /// Total criticality-weighted timing cost.
    pub timing_cost: f64,
}

/// Inverse cost normalizers frozen at the last outer iteration.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InverseCosts {
    /// `1 / bb_cost` at the last refresh.
    pub bb_cost: f64,
    /// `min(1 / timing_cost, 1e9)` at the last refresh.
    pub timing_cost: f64,
}

/// All mutable placer state for one annealing run.
///
/// Owns the committed per-net costs and bounding boxes, the per-trial scratch
/// arrays, the timing caches (when timing-driven), the move transaction
/// buffer, and the seeded random stream. Everything is allocated once at
/// controller entry and released when the run returns.
pub(crate) struct PlacerState<'a> {
    pub netlist: &'a Netlist,
    pub grid: &'a DeviceGrid,
    pub placement: &'a mut Placement,
    pub opts: &'a PlacerOpts,
    pub sink: &'a DiagnosticSink,

    pub costs: Costs,
    pub prev_inverse: InverseCosts,
    pub chan_fac: ChanCostFactors,

    /// Committed cost of each net (-1 until first computed).
    pub net_cost: Vec<f64>,
    /// Proposed cost of each net during a trial; negative means "not marked
    /// affected", which doubles as the affected-net sentinel.
    pub proposed_net_cost: Vec<f64>,
    /// Committed bounding box of each net.
    pub bb_coords: Vec<NetBox>,
    /// Pins on each bounding-box edge (maintained for nets with fanout >=
    /// [`bb::SMALL_NET`] only).
    pub bb_num_on_edges: Vec<NetBox>,
    /// Per-net bounding-box update state for the current trial.
    pub bb_updated_before: Vec<BbUpdate>,
    /// Proposed bounding box of each affected net.
    pub ts_bb_coord_new: Vec<NetBox>,
    /// Proposed edge counts of each affected net.
    pub ts_bb_edge_new: Vec<NetBox>,
    /// Ordered list of nets affected by the current trial.
    pub ts_nets_to_update: Vec<NetId>,

    /// Timing caches; present only for timing-driven placement.
    pub timing: Option<TimingCosts>,
    /// The move transaction buffer shared across trials.
    pub blocks_affected: BlocksAffected,
    /// The single random stream; a fixed seed reproduces the whole anneal.
    pub rng: StdRng,

    pub swaps_accepted: usize,
    pub swaps_rejected: usize,
    pub swaps_aborted: usize,
    pub num_ts_called: usize,
    pub moves_since_recompute: usize,
}

impl<'a> PlacerState<'a> {
    /// Allocates placer state sized for the netlist and grid.
    pub(crate) fn new(
        netlist: &'a Netlist,
        grid: &'a DeviceGrid,
        placement: &'a mut Placement,
        opts: &'a PlacerOpts,
        sink: &'a DiagnosticSink,
    ) -> Self {
        let num_nets = netlist.net_count();
        let timing = (opts.algorithm == PlaceAlgorithm::PathTimingDriven)
            .then(|| TimingCosts::new(netlist));
        Self {
            netlist,
            grid,
            placement,
            opts,
            sink,
            costs: Costs::default(),
            prev_inverse: InverseCosts::default(),
            chan_fac: ChanCostFactors::new(grid, opts.place_cost_exp, sink),
            net_cost: vec![-1.0; num_nets],
            proposed_net_cost: vec![-1.0; num_nets],
            bb_coords: vec![NetBox::default(); num_nets],
            bb_num_on_edges: vec![NetBox::default(); num_nets],
            bb_updated_before: vec![BbUpdate::NotUpdatedYet; num_nets],
            ts_bb_coord_new: vec![NetBox::default(); num_nets],
            ts_bb_edge_new: vec![NetBox::default(); num_nets],
            ts_nets_to_update: Vec::with_capacity(num_nets),
            timing,
            blocks_affected: BlocksAffected::default(),
            rng: StdRng::seed_from_u64(opts.seed),
            swaps_accepted: 0,
            swaps_rejected: 0,
            swaps_aborted: 0,
            num_ts_called: 0,
            moves_since_recompute: 0,
        }
    }

    /// Returns whether this run carries timing caches.
    pub(crate) fn is_timing_driven(&self) -> bool {
        self.timing.is_some()
    }
}
