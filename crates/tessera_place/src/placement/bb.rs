//! Net bounding boxes: from-scratch calculators and the incremental updater.
//!
//! Every non-ignored net carries a bounding box in clipped pin coordinates.
//! Large nets (fanout >= [`SMALL_NET`]) additionally track how many pins sit
//! on each box edge, which lets a single-pin move update the box in O(1)
//! unless the moved pin was the sole occupant of a shrinking edge. In that
//! one case the box is rebuilt from scratch and further updates for the net
//! within the same trial become no-ops.

use crate::data::Netlist;
use crate::ids::{NetId, PinId};
use crate::loc::Placement;
use crate::placement::moves::MovedBlock;
use crate::placement::PlacerState;
use tessera_device::DeviceGrid;

/// Fanout cutoff below which incremental bounding-box updates are skipped;
/// the brute-force recomputation is faster for small nets.
pub(crate) const SMALL_NET: usize = 4;

/// An axis-aligned net bounding box in clipped pin coordinates.
///
/// Also reused to hold the per-edge pin counts of large nets, with each field
/// counting the pins on the corresponding extreme.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) struct NetBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

/// Per-net bounding-box state within a single trial.
///
/// Transitions `NotUpdatedYet -> UpdatedOnce -> UpdatedOnce | GotFromScratch`;
/// both the commit and revert paths reset every touched net to
/// `NotUpdatedYet`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum BbUpdate {
    /// The net's proposed box has not been written this trial; reads must use
    /// the committed box.
    NotUpdatedYet,
    /// The proposed box holds the result of an earlier update this trial;
    /// further updates must chain from it.
    UpdatedOnce,
    /// The proposed box was rebuilt from scratch this trial and is exact;
    /// further updates must not touch it.
    GotFromScratch,
}

/// Clips a pin coordinate into `[1, upper]`, where `upper` is the last
/// position with routing channels on both sides.
///
/// I/O blocks on the perimeter are pulled one cell in; the channels adjacent
/// to the bounding box are unaffected, so costs are unchanged.
fn clip(v: i32, upper: i32) -> i32 {
    v.min(upper).max(1)
}

/// Returns the pin's position: its block location plus the pin's physical
/// offsets on the tile at that location.
fn pin_position(
    netlist: &Netlist,
    grid: &DeviceGrid,
    placement: &Placement,
    pin: PinId,
) -> (i32, i32) {
    let block = netlist.pin_block(pin);
    let loc = placement.block_loc(block);
    let tile = grid.tile_type_at(loc.x as usize, loc.y as usize);
    let tile_pin = netlist.pin(pin).tile_pin;
    (
        loc.x + tile.pin_width_offset(tile_pin),
        loc.y + tile.pin_height_offset(tile_pin),
    )
}

/// Computes a net's bounding box and per-edge pin counts from block
/// locations alone.
///
/// Used for large nets whose boxes will be updated incrementally afterwards;
/// call only when the stored box information is invalid.
pub(crate) fn get_bb_from_scratch(
    netlist: &Netlist,
    grid: &DeviceGrid,
    placement: &Placement,
    net: NetId,
    coords: &mut NetBox,
    num_on_edges: &mut NetBox,
) {
    let upper_x = grid.width() as i32 - 2;
    let upper_y = grid.height() as i32 - 2;

    let (dx, dy) = pin_position(netlist, grid, placement, netlist.net_driver(net));
    let x = clip(dx, upper_x);
    let y = clip(dy, upper_y);

    let (mut xmin, mut xmax, mut ymin, mut ymax) = (x, x, y, y);
    let (mut xmin_edge, mut xmax_edge, mut ymin_edge, mut ymax_edge) = (1, 1, 1, 1);

    for &pin in netlist.net_sinks(net) {
        let (px, py) = pin_position(netlist, grid, placement, pin);
        let x = clip(px, upper_x);
        let y = clip(py, upper_y);

        if x == xmin {
            xmin_edge += 1;
        }
        if x == xmax {
            // xmin may equal xmax, so this is not an else branch.
            xmax_edge += 1;
        } else if x < xmin {
            xmin = x;
            xmin_edge = 1;
        } else if x > xmax {
            xmax = x;
            xmax_edge = 1;
        }

        if y == ymin {
            ymin_edge += 1;
        }
        if y == ymax {
            ymax_edge += 1;
        } else if y < ymin {
            ymin = y;
            ymin_edge = 1;
        } else if y > ymax {
            ymax = y;
            ymax_edge = 1;
        }
    }

    *coords = NetBox {
        xmin,
        ymin,
        xmax,
        ymax,
    };
    *num_on_edges = NetBox {
        xmin: xmin_edge,
        ymin: ymin_edge,
        xmax: xmax_edge,
        ymax: ymax_edge,
    };
}

/// Computes a net's bounding box without edge counts.
///
/// The fast path for small nets; the resulting box cannot be updated
/// incrementally later.
pub(crate) fn get_non_updateable_bb(
    netlist: &Netlist,
    grid: &DeviceGrid,
    placement: &Placement,
    net: NetId,
    bb_coord_new: &mut NetBox,
) {
    let (x, y) = pin_position(netlist, grid, placement, netlist.net_driver(net));
    let (mut xmin, mut xmax, mut ymin, mut ymax) = (x, x, y, y);

    for &pin in netlist.net_sinks(net) {
        let (x, y) = pin_position(netlist, grid, placement, pin);
        if x < xmin {
            xmin = x;
        } else if x > xmax {
            xmax = x;
        }
        if y < ymin {
            ymin = y;
        } else if y > ymax {
            ymax = y;
        }
    }

    let upper_x = grid.width() as i32 - 2;
    let upper_y = grid.height() as i32 - 2;
    *bb_coord_new = NetBox {
        xmin: clip(xmin, upper_x),
        ymin: clip(ymin, upper_y),
        xmax: clip(xmax, upper_x),
        ymax: clip(ymax, upper_y),
    };
}

impl PlacerState<'_> {
    /// Updates `net`'s proposed bounding box for one pin of a moved block.
    ///
    /// Small nets are recomputed whole (once per net per trial); large nets
    /// go through the incremental updater once per moved pin.
    pub(crate) fn update_net_bb(&mut self, net: NetId, moved: MovedBlock, pin: PinId) {
        let netlist = self.netlist;
        let i = net.as_raw() as usize;

        if netlist.num_sinks(net) < SMALL_NET {
            if self.bb_updated_before[i] == BbUpdate::NotUpdatedYet {
                let mut coords = NetBox::default();
                get_non_updateable_bb(netlist, self.grid, self.placement, net, &mut coords);
                self.ts_bb_coord_new[i] = coords;
                self.bb_updated_before[i] = BbUpdate::UpdatedOnce;
            }
        } else {
            let tile = self
                .grid
                .tile_type_at(moved.new_loc.x as usize, moved.new_loc.y as usize);
            let tile_pin = netlist.pin(pin).tile_pin;
            let wo = tile.pin_width_offset(tile_pin);
            let ho = tile.pin_height_offset(tile_pin);
            self.update_bb(
                net,
                moved.old_loc.x + wo,
                moved.old_loc.y + ho,
                moved.new_loc.x + wo,
                moved.new_loc.y + ho,
            );
        }
    }

    /// Incrementally updates a large net's proposed bounding box and edge
    /// counts for a pin moving from `(xold, yold)` to `(xnew, ynew)`.
    ///
    /// If the moved pin was the sole pin on a shrinking edge the extreme is
    /// lost; the box is then rebuilt from scratch and marked so further
    /// updates this trial are skipped.
    pub(crate) fn update_bb(&mut self, net: NetId, xold: i32, yold: i32, xnew: i32, ynew: i32) {
        let upper_x = self.grid.width() as i32 - 2;
        let upper_y = self.grid.height() as i32 - 2;
        let xnew = clip(xnew, upper_x);
        let ynew = clip(ynew, upper_y);
        let xold = clip(xold, upper_x);
        let yold = clip(yold, upper_y);

        let i = net.as_raw() as usize;
        let (curr_coord, curr_edge) = match self.bb_updated_before[i] {
            BbUpdate::GotFromScratch => return,
            BbUpdate::NotUpdatedYet => {
                self.bb_updated_before[i] = BbUpdate::UpdatedOnce;
                (self.bb_coords[i], self.bb_num_on_edges[i])
            }
            BbUpdate::UpdatedOnce => (self.ts_bb_coord_new[i], self.ts_bb_edge_new[i]),
        };

        let mut coord = NetBox::default();
        let mut edge = NetBox::default();

        if xnew < xold {
            // Moving left: the xmax edge shrinks or carries through.
            if xold == curr_coord.xmax {
                if curr_edge.xmax == 1 {
                    self.rebuild_bb_from_scratch(net);
                    return;
                }
                edge.xmax = curr_edge.xmax - 1;
                coord.xmax = curr_coord.xmax;
            } else {
                coord.xmax = curr_coord.xmax;
                edge.xmax = curr_edge.xmax;
            }

            if xnew < curr_coord.xmin {
                coord.xmin = xnew;
                edge.xmin = 1;
            } else if xnew == curr_coord.xmin {
                coord.xmin = xnew;
                edge.xmin = curr_edge.xmin + 1;
            } else {
                coord.xmin = curr_coord.xmin;
                edge.xmin = curr_edge.xmin;
            }
        } else if xnew > xold {
            // Moving right: mirror image.
            if xold == curr_coord.xmin {
                if curr_edge.xmin == 1 {
                    self.rebuild_bb_from_scratch(net);
                    return;
                }
                edge.xmin = curr_edge.xmin - 1;
                coord.xmin = curr_coord.xmin;
            } else {
                coord.xmin = curr_coord.xmin;
                edge.xmin = curr_edge.xmin;
            }

            if xnew > curr_coord.xmax {
                coord.xmax = xnew;
                edge.xmax = 1;
            } else if xnew == curr_coord.xmax {
                coord.xmax = xnew;
                edge.xmax = curr_edge.xmax + 1;
            } else {
                coord.xmax = curr_coord.xmax;
                edge.xmax = curr_edge.xmax;
            }
        } else {
            coord.xmin = curr_coord.xmin;
            coord.xmax = curr_coord.xmax;
            edge.xmin = curr_edge.xmin;
            edge.xmax = curr_edge.xmax;
        }

        if ynew < yold {
            if yold == curr_coord.ymax {
                if curr_edge.ymax == 1 {
                    self.rebuild_bb_from_scratch(net);
                    return;
                }
                edge.ymax = curr_edge.ymax - 1;
                coord.ymax = curr_coord.ymax;
            } else {
                coord.ymax = curr_coord.ymax;
                edge.ymax = curr_edge.ymax;
            }

            if ynew < curr_coord.ymin {
                coord.ymin = ynew;
                edge.ymin = 1;
            } else if ynew == curr_coord.ymin {
                coord.ymin = ynew;
                edge.ymin = curr_edge.ymin + 1;
            } else {
                coord.ymin = curr_coord.ymin;
                edge.ymin = curr_edge.ymin;
            }
        } else if ynew > yold {
            if yold == curr_coord.ymin {
                if curr_edge.ymin == 1 {
                    self.rebuild_bb_from_scratch(net);
                    return;
                }
                edge.ymin = curr_edge.ymin - 1;
                coord.ymin = curr_coord.ymin;
            } else {
                coord.ymin = curr_coord.ymin;
                edge.ymin = curr_edge.ymin;
            }

            if ynew > curr_coord.ymax {
                coord.ymax = ynew;
                edge.ymax = 1;
            } else if ynew == curr_coord.ymax {
                coord.ymax = ynew;
                edge.ymax = curr_edge.ymax + 1;
            } else {
                coord.ymax = curr_coord.ymax;
                edge.ymax = curr_edge.ymax;
            }
        } else {
            coord.ymin = curr_coord.ymin;
            coord.ymax = curr_coord.ymax;
            edge.ymin = curr_edge.ymin;
            edge.ymax = curr_edge.ymax;
        }

        self.ts_bb_coord_new[i] = coord;
        self.ts_bb_edge_new[i] = edge;
    }

    /// Rebuilds the proposed bounding box from block locations and pins the
    /// flag at [`BbUpdate::GotFromScratch`] for the rest of the trial.
    fn rebuild_bb_from_scratch(&mut self, net: NetId) {
        let i = net.as_raw() as usize;
        let mut coords = NetBox::default();
        let mut edges = NetBox::default();
        get_bb_from_scratch(self.netlist, self.grid, self.placement, net, &mut coords, &mut edges);
        self.ts_bb_coord_new[i] = coords;
        self.ts_bb_edge_new[i] = edges;
        self.bb_updated_before[i] = BbUpdate::GotFromScratch;
    }
}
