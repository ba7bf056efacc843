//! Block locations, the grid occupancy map, and placement macros.
//!
//! A [`Placement`] is the mutable state the annealer perturbs: the forward
//! map from block to [`GridLoc`] and the inverse map from grid cell to
//! occupants. The two maps are only allowed to disagree *inside* a trial;
//! the move helpers in [`placement::moves`](crate::placement::moves) restore
//! agreement on commit or revert. Placement macros group blocks that must
//! keep fixed relative offsets (carry chains and the like).

use crate::data::Netlist;
use crate::ids::BlockId;
use serde::{Deserialize, Serialize};
use tessera_device::DeviceGrid;

/// A block location: grid position plus sub-tile slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct GridLoc {
    /// Column in the device grid.
    pub x: i32,
    /// Row in the device grid.
    pub y: i32,
    /// Placement slot within the tile.
    pub sub_tile: usize,
}

impl GridLoc {
    /// Creates a location.
    pub fn new(x: i32, y: i32, sub_tile: usize) -> Self {
        Self { x, y, sub_tile }
    }

    /// Returns this location displaced by a macro offset.
    pub fn offset_by(self, offset: MacroOffset) -> Self {
        Self {
            x: self.x + offset.x,
            y: self.y + offset.y,
            sub_tile: (self.sub_tile as i32 + offset.sub_tile) as usize,
        }
    }
}

/// The displacement of a macro member from the macro head.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct MacroOffset {
    /// Column displacement.
    pub x: i32,
    /// Row displacement.
    pub y: i32,
    /// Sub-tile displacement.
    pub sub_tile: i32,
}

impl MacroOffset {
    /// Creates an offset.
    pub fn new(x: i32, y: i32, sub_tile: i32) -> Self {
        Self { x, y, sub_tile }
    }
}

/// One block of a placement macro with its offset from the head.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MacroMember {
    /// The member block.
    pub block: BlockId,
    /// The member's displacement from the macro head.
    pub offset: MacroOffset,
}

/// A rigid group of blocks that moves as a unit.
///
/// The head is `members[0]` and must carry a zero offset; every other member
/// sits at head location plus its offset in any legal placement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlacementMacro {
    /// The member blocks, head first.
    pub members: Vec<MacroMember>,
}

/// The occupants of one grid position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridCell {
    /// Occupant of each sub-tile slot (`None` = empty).
    pub blocks: Vec<Option<BlockId>>,
    /// Number of occupied slots.
    pub usage: usize,
}

/// A full placement: block locations plus the inverse grid occupancy map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Placement {
    width: usize,
    height: usize,
    /// Location of each block, indexed by block ID.
    pub block_locs: Vec<GridLoc>,
    /// Occupancy of each grid position, stored column-major (`x * height + y`).
    cells: Vec<GridCell>,
    /// All placement macros.
    pub macros: Vec<PlacementMacro>,
    /// The macro each block belongs to, if any (index into `macros`).
    block_macro: Vec<Option<usize>>,
}

impl Placement {
    /// Creates an empty placement sized for the given netlist and grid.
    ///
    /// All cells start empty; every block location starts at the origin and
    /// must be set with [`place_block`](Self::place_block) before annealing.
    pub fn new(netlist: &Netlist, grid: &DeviceGrid) -> Self {
        let cells = (0..grid.width() * grid.height())
            .map(|i| {
                let (x, y) = (i / grid.height(), i % grid.height());
                let capacity = grid.tile_type_at(x, y).capacity();
                GridCell {
                    blocks: vec![None; capacity],
                    usage: 0,
                }
            })
            .collect();
        Self {
            width: grid.width(),
            height: grid.height(),
            block_locs: vec![GridLoc::new(0, 0, 0); netlist.block_count()],
            cells,
            macros: Vec::new(),
            block_macro: vec![None; netlist.block_count()],
        }
    }

    /// Places a block at the given location, updating both maps.
    ///
    /// The target slot must be empty.
    pub fn place_block(&mut self, block: BlockId, loc: GridLoc) {
        let cell = self.cell_mut(loc.x, loc.y);
        assert!(
            cell.blocks[loc.sub_tile].is_none(),
            "slot ({}, {}, {}) already occupied",
            loc.x,
            loc.y,
            loc.sub_tile
        );
        cell.blocks[loc.sub_tile] = Some(block);
        cell.usage += 1;
        self.block_locs[block.as_raw() as usize] = loc;
    }

    /// Returns the location of the given block.
    pub fn block_loc(&self, block: BlockId) -> GridLoc {
        self.block_locs[block.as_raw() as usize]
    }

    /// Returns the occupants of the grid position `(x, y)`.
    pub fn cell(&self, x: i32, y: i32) -> &GridCell {
        &self.cells[x as usize * self.height + y as usize]
    }

    /// Returns a mutable reference to the occupants of `(x, y)`.
    pub(crate) fn cell_mut(&mut self, x: i32, y: i32) -> &mut GridCell {
        &mut self.cells[x as usize * self.height + y as usize]
    }

    /// Registers a placement macro and returns its index.
    ///
    /// The head member must carry a zero offset, and no member may already
    /// belong to another macro.
    pub fn add_macro(&mut self, members: Vec<MacroMember>) -> usize {
        assert!(!members.is_empty());
        assert_eq!(members[0].offset, MacroOffset::default());
        let index = self.macros.len();
        for member in &members {
            let slot = &mut self.block_macro[member.block.as_raw() as usize];
            assert!(slot.is_none(), "block {} in two macros", member.block);
            *slot = Some(index);
        }
        self.macros.push(PlacementMacro { members });
        index
    }

    /// Returns the index of the macro the given block belongs to, if any.
    pub fn block_macro(&self, block: BlockId) -> Option<usize> {
        self.block_macro[block.as_raw() as usize]
    }
}
