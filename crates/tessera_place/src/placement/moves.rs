//! Move proposals and placement transactions.
//!
//! A trial move is a list of [`MovedBlock`] records. The helpers here apply
//! the move to block locations (leaving the grid occupancy map untouched so
//! the move stays cheap to revert), then either commit it to both maps or
//! roll the locations back. [`MoveGenerator`] is the proposal contract;
//! [`UniformMoveGenerator`] is the standard uniform-random implementation.

use crate::data::Netlist;
use crate::ids::{BlockId, NetId, PinId};
use crate::loc::{GridLoc, Placement};
use rand::rngs::StdRng;
use rand::Rng;
use tessera_device::DeviceGrid;

/// How many times the uniform generator retries a rejected candidate before
/// giving up on the proposal.
const MAX_FIND_TRIES: usize = 10;

/// One block's part in a proposed move.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MovedBlock {
    /// The block being moved.
    pub block: BlockId,
    /// Where the block was before the move.
    pub old_loc: GridLoc,
    /// Where the move puts it.
    pub new_loc: GridLoc,
}

/// The blocks and pins touched by the trial in flight.
///
/// Reused across trials; [`clear_move_blocks`] empties it at every trial
/// boundary.
#[derive(Debug, Default)]
pub struct BlocksAffected {
    /// The moved blocks with their old and new locations.
    pub moved: Vec<MovedBlock>,
    /// Sink pins whose connection delay was recomputed during the trial.
    pub affected_pins: Vec<PinId>,
}

/// Whether a proposal produced a usable move.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CreateMove {
    /// The move is legal and recorded in the transaction buffer.
    Valid,
    /// No legal move could be produced; the trial is abandoned.
    Abort,
}

/// The outcome of one swap trial.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveOutcome {
    /// The move was committed.
    Accepted,
    /// The move was evaluated and rolled back.
    Rejected,
    /// The proposal was abandoned before evaluation.
    Aborted,
}

/// Per-trial feedback handed to the move generator.
#[derive(Clone, Copy, Debug)]
pub struct MoveOutcomeStats {
    /// Normalized total cost delta.
    pub delta_cost_norm: f64,
    /// Normalized wirelength delta.
    pub delta_bb_cost_norm: f64,
    /// Normalized timing delta.
    pub delta_timing_cost_norm: f64,
    /// Absolute wirelength delta.
    pub delta_bb_cost_abs: f64,
    /// Absolute timing delta.
    pub delta_timing_cost_abs: f64,
    /// What happened to the trial.
    pub outcome: MoveOutcome,
}

impl MoveOutcomeStats {
    /// Stats for an abandoned proposal (no deltas were computed).
    pub fn aborted() -> Self {
        Self {
            delta_cost_norm: f64::NAN,
            delta_bb_cost_norm: f64::NAN,
            delta_timing_cost_norm: f64::NAN,
            delta_bb_cost_abs: f64::NAN,
            delta_timing_cost_abs: f64::NAN,
            outcome: MoveOutcome::Aborted,
        }
    }
}

/// Read-only view of the world handed to move generators.
pub struct MoveContext<'a> {
    /// The netlist being placed.
    pub netlist: &'a Netlist,
    /// The device grid.
    pub grid: &'a DeviceGrid,
    /// The current (committed) placement.
    pub placement: &'a Placement,
}

/// Proposes placement perturbations for the annealer to evaluate.
pub trait MoveGenerator {
    /// Proposes one move within Chebyshev distance `rlim`, recording it into
    /// `blocks`. Returns [`CreateMove::Abort`] when no legal move was found;
    /// the buffer contents are then ignored.
    fn propose_move(
        &mut self,
        blocks: &mut BlocksAffected,
        rlim: f64,
        ctx: &MoveContext<'_>,
        rng: &mut StdRng,
    ) -> CreateMove;

    /// Receives the evaluated deltas and outcome of the proposed move.
    fn process_outcome(&mut self, _stats: &MoveOutcomeStats) {}
}

/// Writes the moved blocks' new locations into the forward map only.
///
/// The grid occupancy map is deliberately left stale so rejection is a plain
/// location rollback; [`commit_move_blocks`] brings the grid up to date on
/// acceptance.
pub fn apply_move_blocks(placement: &mut Placement, blocks: &BlocksAffected) {
    for mb in &blocks.moved {
        placement.block_locs[mb.block.as_raw() as usize] = mb.new_loc;
    }
}

/// Restores the moved blocks' old locations in the forward map.
pub fn revert_move_blocks(placement: &mut Placement, blocks: &BlocksAffected) {
    for mb in &blocks.moved {
        placement.block_locs[mb.block.as_raw() as usize] = mb.old_loc;
    }
}

/// Updates the grid occupancy map to match an accepted move.
///
/// Runs in two passes (vacate, then occupy) so block exchanges and rotations
/// resolve regardless of record order. A cell is only vacated if it still
/// names the moved block.
pub fn commit_move_blocks(placement: &mut Placement, blocks: &BlocksAffected) {
    for mb in &blocks.moved {
        let cell = placement.cell_mut(mb.old_loc.x, mb.old_loc.y);
        if cell.blocks[mb.old_loc.sub_tile] == Some(mb.block) {
            cell.blocks[mb.old_loc.sub_tile] = None;
            cell.usage -= 1;
        }
    }
    for mb in &blocks.moved {
        let cell = placement.cell_mut(mb.new_loc.x, mb.new_loc.y);
        if cell.blocks[mb.new_loc.sub_tile].is_none() {
            cell.usage += 1;
        }
        cell.blocks[mb.new_loc.sub_tile] = Some(mb.block);
    }
}

/// Empties the transaction buffer at the end of a trial.
pub fn clear_move_blocks(blocks: &mut BlocksAffected) {
    blocks.moved.clear();
    blocks.affected_pins.clear();
}

/// Returns whether `net` is driven by one of the moved blocks.
pub(crate) fn driven_by_moved_block(
    netlist: &Netlist,
    net: NetId,
    blocks: &BlocksAffected,
) -> bool {
    let driver_block = netlist.net_driver_block(net);
    blocks.moved.iter().any(|mb| mb.block == driver_block)
}

/// The standard move generator: uniform-random block relocations and swaps.
///
/// Picks a random movable block and a random type-compatible destination
/// within the range limit. An occupied destination proposes an exchange;
/// macro members drag their whole macro along. Proposals that would break
/// type compatibility, fixedness, or macro rigidity abort instead.
#[derive(Debug, Default)]
pub struct UniformMoveGenerator;

impl UniformMoveGenerator {
    /// Creates a uniform move generator.
    pub fn new() -> Self {
        Self
    }
}

impl MoveGenerator for UniformMoveGenerator {
    fn propose_move(
        &mut self,
        blocks: &mut BlocksAffected,
        rlim: f64,
        ctx: &MoveContext<'_>,
        rng: &mut StdRng,
    ) -> CreateMove {
        debug_assert!(blocks.moved.is_empty());

        let num_blocks = ctx.netlist.block_count();
        if num_blocks == 0 {
            return CreateMove::Abort;
        }

        let mut picked = None;
        for _ in 0..50 {
            let cand = BlockId::from_raw(rng.gen_range(0..num_blocks as u32));
            if !ctx.netlist.block(cand).is_fixed {
                picked = Some(cand);
                break;
            }
        }
        let Some(block) = picked else {
            return CreateMove::Abort;
        };
        let from = ctx.placement.block_loc(block);

        for _ in 0..MAX_FIND_TRIES {
            let Some(to) = find_to_loc(ctx, block, from, rlim, rng) else {
                continue;
            };
            let plan = match ctx.placement.block_macro(block) {
                Some(imacro) => plan_macro_move(ctx, imacro, from, to),
                None => plan_single_move(ctx, block, from, to),
            };
            if let Some(moved) = plan {
                blocks.moved = moved;
                return CreateMove::Valid;
            }
        }
        CreateMove::Abort
    }
}

/// Picks a random location within `rlim` of `from` whose tile can host
/// `block`, or `None` if the sampled position is unsuitable.
fn find_to_loc(
    ctx: &MoveContext<'_>,
    block: BlockId,
    from: GridLoc,
    rlim: f64,
    rng: &mut StdRng,
) -> Option<GridLoc> {
    let w = ctx.grid.width() as i32;
    let h = ctx.grid.height() as i32;
    let rlim_x = (rlim.min(f64::from(w - 1)) as i32).max(1);
    let rlim_y = (rlim.min(f64::from(h - 1)) as i32).max(1);

    let x = (from.x + rng.gen_range(-rlim_x..=rlim_x)).max(0).min(w - 1);
    let y = (from.y + rng.gen_range(-rlim_y..=rlim_y)).max(0).min(h - 1);

    let tile = ctx.grid.tile_type_at(x as usize, y as usize);
    let block_type = ctx.netlist.block_type(block);
    let compatible: Vec<usize> = (0..tile.capacity())
        .filter(|&s| tile.is_sub_tile_compatible(block_type, s))
        .collect();
    if compatible.is_empty() {
        return None;
    }
    let sub_tile = compatible[rng.gen_range(0..compatible.len())];
    Some(GridLoc::new(x, y, sub_tile))
}

/// Plans moving one free block to `to`, exchanging with any occupant.
fn plan_single_move(
    ctx: &MoveContext<'_>,
    block: BlockId,
    from: GridLoc,
    to: GridLoc,
) -> Option<Vec<MovedBlock>> {
    if to == from {
        return None;
    }
    match ctx.placement.cell(to.x, to.y).blocks[to.sub_tile] {
        None => Some(vec![MovedBlock {
            block,
            old_loc: from,
            new_loc: to,
        }]),
        Some(occupant) => {
            if ctx.netlist.block(occupant).is_fixed
                || ctx.placement.block_macro(occupant).is_some()
            {
                return None;
            }
            // The displaced block must be legal in the vacated slot.
            let from_tile = ctx.grid.tile_type_at(from.x as usize, from.y as usize);
            if !from_tile.is_sub_tile_compatible(ctx.netlist.block_type(occupant), from.sub_tile) {
                return None;
            }
            Some(vec![
                MovedBlock {
                    block,
                    old_loc: from,
                    new_loc: to,
                },
                MovedBlock {
                    block: occupant,
                    old_loc: to,
                    new_loc: from,
                },
            ])
        }
    }
}

/// Plans translating a whole macro by the displacement `to - from`.
///
/// Every member must land in bounds on a compatible slot that is empty or
/// held by another member of the same macro.
fn plan_macro_move(
    ctx: &MoveContext<'_>,
    imacro: usize,
    from: GridLoc,
    to: GridLoc,
) -> Option<Vec<MovedBlock>> {
    if to == from {
        return None;
    }
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let dsub = to.sub_tile as i32 - from.sub_tile as i32;

    let members = &ctx.placement.macros[imacro].members;
    let mut moved = Vec::with_capacity(members.len());
    for member in members {
        let old_loc = ctx.placement.block_loc(member.block);
        let sub_tile = old_loc.sub_tile as i32 + dsub;
        let new_loc = GridLoc {
            x: old_loc.x + dx,
            y: old_loc.y + dy,
            sub_tile: usize::try_from(sub_tile).ok()?,
        };
        if new_loc.x < 0
            || new_loc.x >= ctx.grid.width() as i32
            || new_loc.y < 0
            || new_loc.y >= ctx.grid.height() as i32
        {
            return None;
        }
        let tile = ctx.grid.tile_type_at(new_loc.x as usize, new_loc.y as usize);
        if new_loc.sub_tile >= tile.capacity()
            || !tile.is_sub_tile_compatible(ctx.netlist.block_type(member.block), new_loc.sub_tile)
        {
            return None;
        }
        match ctx.placement.cell(new_loc.x, new_loc.y).blocks[new_loc.sub_tile] {
            None => {}
            Some(occupant) => {
                if ctx.placement.block_macro(occupant) != Some(imacro) {
                    return None;
                }
            }
        }
        moved.push(MovedBlock {
            block: member.block,
            old_loc,
            new_loc,
        });
    }
    Some(moved)
}
