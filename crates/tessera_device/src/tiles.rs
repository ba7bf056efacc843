//! Physical tile types: capacity, pin geometry, and sub-tile compatibility.
//!
//! A tile type describes one kind of grid position: how many blocks it can
//! hold (its sub-tiles), which logical block types each sub-tile accepts, and
//! where each physical pin sits relative to the tile origin. Pin offsets feed
//! the placer's bounding-box computation so that wide tiles with pins on a far
//! edge are costed at the pin position, not the tile origin.

use crate::ids::{BlockTypeId, TileTypeId};
use serde::{Deserialize, Serialize};

/// One placement slot within a tile.
///
/// Each sub-tile accepts a specific set of logical block types; a tile's
/// capacity is its number of sub-tiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTile {
    /// Logical block types this sub-tile can host.
    pub compatible: Vec<BlockTypeId>,
}

impl SubTile {
    /// Creates a sub-tile accepting the given logical block types.
    pub fn new(compatible: Vec<BlockTypeId>) -> Self {
        Self { compatible }
    }
}

/// A physical tile type in the device grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileType {
    /// The unique ID of this tile type.
    pub id: TileTypeId,
    /// Human-readable type name (e.g., "clb", "io", "bram").
    pub name: String,
    /// The placement slots this tile provides.
    pub sub_tiles: Vec<SubTile>,
    /// Horizontal pin offset from the tile origin, indexed by physical pin number.
    pub pin_width_offset: Vec<i32>,
    /// Vertical pin offset from the tile origin, indexed by physical pin number.
    pub pin_height_offset: Vec<i32>,
}

impl TileType {
    /// Creates a tile type with the given sub-tiles and zero pin offsets.
    pub fn new(name: impl Into<String>, sub_tiles: Vec<SubTile>, num_pins: usize) -> Self {
        Self {
            id: TileTypeId::from_raw(0),
            name: name.into(),
            sub_tiles,
            pin_width_offset: vec![0; num_pins],
            pin_height_offset: vec![0; num_pins],
        }
    }

    /// Creates an empty tile type (no placement slots, no pins).
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new(), 0)
    }

    /// Creates a tile type whose sub-tiles all accept the same logical block type.
    pub fn uniform(
        name: impl Into<String>,
        block_type: BlockTypeId,
        capacity: usize,
        num_pins: usize,
    ) -> Self {
        let sub_tiles = (0..capacity)
            .map(|_| SubTile::new(vec![block_type]))
            .collect();
        Self::new(name, sub_tiles, num_pins)
    }

    /// Returns the number of blocks this tile can hold.
    pub fn capacity(&self) -> usize {
        self.sub_tiles.len()
    }

    /// Returns whether the given logical block type may occupy `sub_tile`.
    pub fn is_sub_tile_compatible(&self, block_type: BlockTypeId, sub_tile: usize) -> bool {
        self.sub_tiles
            .get(sub_tile)
            .is_some_and(|st| st.compatible.contains(&block_type))
    }

    /// Returns the horizontal offset of the given physical pin from the tile origin.
    pub fn pin_width_offset(&self, pin: usize) -> i32 {
        self.pin_width_offset.get(pin).copied().unwrap_or(0)
    }

    /// Returns the vertical offset of the given physical pin from the tile origin.
    pub fn pin_height_offset(&self, pin: usize) -> i32 {
        self.pin_height_offset.get(pin).copied().unwrap_or(0)
    }
}
