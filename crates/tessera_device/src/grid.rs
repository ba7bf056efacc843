//! The device grid: tile placement surface and routing channel capacities.
//!
//! The grid is a `width * height` array of tile types plus the per-channel
//! track counts the placer's wiring cost model normalizes against. Horizontal
//! channels run between rows (indexed by y), vertical channels between
//! columns (indexed by x).

use crate::ids::TileTypeId;
use crate::tiles::TileType;
use serde::{Deserialize, Serialize};

/// An FPGA device grid.
///
/// Owns the tile-type table and the per-position type assignment. Positions
/// are addressed as `(x, y)` with `x` in `0..width` and `y` in `0..height`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceGrid {
    width: usize,
    height: usize,
    /// Track count of each horizontal channel, indexed by y.
    chan_width_x: Vec<i32>,
    /// Track count of each vertical channel, indexed by x.
    chan_width_y: Vec<i32>,
    tile_types: Vec<TileType>,
    /// Tile type at each position, stored column-major (`x * height + y`).
    tiles: Vec<TileTypeId>,
}

impl DeviceGrid {
    /// Creates a grid from explicit channel widths, tile types, and per-position assignment.
    ///
    /// `tiles` must hold `width * height` entries in column-major order;
    /// `chan_width_x` must have `height` entries and `chan_width_y` `width`
    /// entries. Tile-type IDs are rewritten to match their table position.
    pub fn new(
        width: usize,
        height: usize,
        chan_width_x: Vec<i32>,
        chan_width_y: Vec<i32>,
        mut tile_types: Vec<TileType>,
        tiles: Vec<TileTypeId>,
    ) -> Self {
        assert_eq!(chan_width_x.len(), height);
        assert_eq!(chan_width_y.len(), width);
        assert_eq!(tiles.len(), width * height);
        for (i, ty) in tile_types.iter_mut().enumerate() {
            ty.id = TileTypeId::from_raw(i as u32);
        }
        Self {
            width,
            height,
            chan_width_x,
            chan_width_y,
            tile_types,
            tiles,
        }
    }

    /// Creates a grid with one tile type everywhere and uniform channel widths.
    pub fn uniform(width: usize, height: usize, chan_width: i32, tile_type: TileType) -> Self {
        let tiles = vec![TileTypeId::from_raw(0); width * height];
        Self::new(
            width,
            height,
            vec![chan_width; height],
            vec![chan_width; width],
            vec![tile_type],
            tiles,
        )
    }

    /// Returns the grid width in tiles.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the grid height in tiles.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the track count of the horizontal channel at row `y`.
    pub fn chan_width_x(&self, y: usize) -> i32 {
        self.chan_width_x[y]
    }

    /// Returns the track count of the vertical channel at column `x`.
    pub fn chan_width_y(&self, x: usize) -> i32 {
        self.chan_width_y[x]
    }

    /// Returns all horizontal channel track counts, indexed by y.
    pub fn chan_widths_x(&self) -> &[i32] {
        &self.chan_width_x
    }

    /// Returns all vertical channel track counts, indexed by x.
    pub fn chan_widths_y(&self) -> &[i32] {
        &self.chan_width_y
    }

    /// Returns the tile type with the given ID.
    pub fn tile_type(&self, id: TileTypeId) -> &TileType {
        &self.tile_types[id.as_raw() as usize]
    }

    /// Returns the ID of the tile type at position `(x, y)`.
    pub fn tile_type_id_at(&self, x: usize, y: usize) -> TileTypeId {
        self.tiles[x * self.height + y]
    }

    /// Returns the tile type at position `(x, y)`.
    pub fn tile_type_at(&self, x: usize, y: usize) -> &TileType {
        self.tile_type(self.tile_type_id_at(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::BlockTypeId;

    fn clb() -> TileType {
        TileType::uniform("clb", BlockTypeId::from_raw(0), 1, 4)
    }

    #[test]
    fn uniform_grid_dimensions() {
        let grid = DeviceGrid::uniform(6, 4, 8, clb());
        assert_eq!(grid.width(), 6);
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.chan_width_x(0), 8);
        assert_eq!(grid.chan_width_y(5), 8);
        assert_eq!(grid.chan_widths_x().len(), 4);
        assert_eq!(grid.chan_widths_y().len(), 6);
    }

    #[test]
    fn tile_lookup() {
        let grid = DeviceGrid::uniform(3, 3, 4, clb());
        let ty = grid.tile_type_at(2, 1);
        assert_eq!(ty.name, "clb");
        assert_eq!(ty.capacity(), 1);
    }

    #[test]
    fn mixed_tile_types() {
        let io = BlockTypeId::from_raw(1);
        let types = vec![clb(), TileType::uniform("io", io, 2, 1)];
        // 2x2 grid: io tiles in column 0, clb in column 1
        let io_id = TileTypeId::from_raw(1);
        let clb_id = TileTypeId::from_raw(0);
        let tiles = vec![io_id, io_id, clb_id, clb_id];
        let grid = DeviceGrid::new(2, 2, vec![4, 4], vec![4, 4], types, tiles);

        assert_eq!(grid.tile_type_at(0, 0).name, "io");
        assert_eq!(grid.tile_type_at(0, 1).name, "io");
        assert_eq!(grid.tile_type_at(1, 0).name, "clb");
        assert!(grid.tile_type_at(0, 0).is_sub_tile_compatible(io, 1));
    }

    #[test]
    fn tile_type_ids_rewritten() {
        let grid = DeviceGrid::uniform(2, 2, 4, clb());
        assert_eq!(grid.tile_type_id_at(0, 0).as_raw(), 0);
        assert_eq!(grid.tile_type(TileTypeId::from_raw(0)).id.as_raw(), 0);
    }

    #[test]
    #[should_panic]
    fn wrong_channel_count_panics() {
        DeviceGrid::new(
            2,
            2,
            vec![4],
            vec![4, 4],
            vec![clb()],
            vec![TileTypeId::from_raw(0); 4],
        );
    }

    #[test]
    fn serde_roundtrip() {
        let grid = DeviceGrid::uniform(3, 2, 6, clb());
        let json = serde_json::to_string(&grid).unwrap();
        let restored: DeviceGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.width(), 3);
        assert_eq!(restored.height(), 2);
        assert_eq!(restored.chan_width_x(1), 6);
    }
}
