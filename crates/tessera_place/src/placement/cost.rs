//! Wirelength cost model: channel-factor tables and per-net bounding-box cost.
//!
//! The cost of a net is its bounding-box span in each axis, scaled by an
//! expected-crossing correction for fanout and by the inverse average track
//! count of the channels the box covers. The channel factors are precomputed
//! into lower-triangular tables so per-net evaluation is two multiplies per
//! axis.

use crate::data::Netlist;
use crate::ids::NetId;
use crate::placement::bb::{get_bb_from_scratch, get_non_updateable_bb, NetBox, SMALL_NET};
use crate::placement::PlacerState;
use tessera_device::DeviceGrid;
use tessera_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};

/// Expected crossing counts for nets with 1..=50 pins, from ICCAD 94
/// pp. 690-695 with linear interpolation. Indexed by pin count minus one;
/// multiplies the bounding-box span to better estimate wirelength for
/// higher-fanout nets.
const CROSS_COUNT: [f32; 50] = [
    1.0, 1.0, 1.0, 1.0828, 1.1536, 1.2206, 1.2823, 1.3385, 1.3991, 1.4493, 1.4974, 1.5455, 1.5937,
    1.6418, 1.6899, 1.7304, 1.7709, 1.8114, 1.8519, 1.8924, 1.9288, 1.9652, 2.0015, 2.0379, 2.0743,
    2.1061, 2.1379, 2.1698, 2.2016, 2.2334, 2.2646, 2.2958, 2.3271, 2.3583, 2.3895, 2.4187, 2.4479,
    2.4772, 2.5064, 2.5356, 2.5610, 2.5864, 2.6117, 2.6371, 2.6625, 2.6887, 2.7148, 2.7410, 2.7671,
    2.7933,
];

/// Returns the expected crossing count of a net with `num_pins` pins,
/// extrapolating linearly beyond 50 pins.
pub(crate) fn wirelength_crossing_count(num_pins: usize) -> f64 {
    if num_pins > 50 {
        2.7933 + 0.02616 * (num_pins - 50) as f64
    } else {
        f64::from(CROSS_COUNT[num_pins - 1])
    }
}

/// Precomputed inverse-average-track-count factors for channel spans.
///
/// `x(high, low)` covers the horizontal channels between rows `low` and
/// `high` inclusive, `y(high, low)` the vertical channels between columns.
/// Each entry is `((high - low + 1) / total_tracks)^place_cost_exp`, so the
/// per-net cost multiplies span length by a factor instead of dividing by an
/// average, and narrow channels can be penalized superlinearly.
pub(crate) struct ChanCostFactors {
    x: Vec<Vec<f32>>,
    y: Vec<Vec<f32>>,
}

impl ChanCostFactors {
    /// Builds both factor tables from the grid's channel capacities.
    ///
    /// A zero-track span would produce an infinite factor, so it is clamped
    /// to one track and reported as a warning.
    pub(crate) fn new(grid: &DeviceGrid, place_cost_exp: f64, sink: &DiagnosticSink) -> Self {
        Self {
            x: Self::build(grid.chan_widths_x(), place_cost_exp, sink, "horizontal"),
            y: Self::build(grid.chan_widths_y(), place_cost_exp, sink, "vertical"),
        }
    }

    fn build(
        widths: &[i32],
        place_cost_exp: f64,
        sink: &DiagnosticSink,
        axis: &str,
    ) -> Vec<Vec<f32>> {
        let n = widths.len();
        if n == 0 {
            return Vec::new();
        }
        let mut fac: Vec<Vec<f32>> = (0..n).map(|high| vec![0.0; high + 1]).collect();

        // Running sum of tracks between channel low and high, inclusive.
        fac[0][0] = widths[0] as f32;
        for high in 1..n {
            fac[high][high] = widths[high] as f32;
            for low in 0..high {
                fac[high][low] = fac[high - 1][low] + widths[high] as f32;
            }
        }

        for high in 0..n {
            for low in 0..=high {
                if fac[high][low] == 0.0 {
                    sink.emit(Diagnostic::warning(
                        DiagnosticCode::new(Category::Device, 1),
                        format!(
                            "{axis} channel span [{low}, {high}] has zero tracks; \
                             clamping to one"
                        ),
                    ));
                    fac[high][low] = 1.0;
                }
                let inv_avg = (high - low + 1) as f64 / f64::from(fac[high][low]);
                fac[high][low] = inv_avg.powf(place_cost_exp) as f32;
            }
        }
        fac
    }

    /// Returns the horizontal-channel factor for rows `low..=high`.
    pub(crate) fn x(&self, high: i32, low: i32) -> f32 {
        self.x[high as usize][low as usize]
    }

    /// Returns the vertical-channel factor for columns `low..=high`.
    pub(crate) fn y(&self, high: i32, low: i32) -> f32 {
        self.y[high as usize][low as usize]
    }
}

/// Returns the wiring cost of one net given its bounding box.
pub(crate) fn get_net_cost(
    netlist: &Netlist,
    chan_fac: &ChanCostFactors,
    net: NetId,
    bb: &NetBox,
) -> f64 {
    let crossing = wirelength_crossing_count(netlist.net_pins(net).len());

    // Cost = span along each axis * crossing / average channel capacity,
    // with the division folded into the precomputed factor.
    let mut ncost =
        f64::from(bb.xmax - bb.xmin + 1) * crossing * f64::from(chan_fac.x(bb.ymax, bb.ymin - 1));
    ncost +=
        f64::from(bb.ymax - bb.ymin + 1) * crossing * f64::from(chan_fac.y(bb.xmax, bb.xmin - 1));
    ncost
}

/// Returns the crossing-corrected half-perimeter wirelength of one net,
/// without channel normalization. Used for reporting only.
pub(crate) fn get_net_wirelength_estimate(netlist: &Netlist, net: NetId, bb: &NetBox) -> f64 {
    let crossing = wirelength_crossing_count(netlist.net_pins(net).len());
    f64::from(bb.xmax - bb.xmin + 1) * crossing + f64::from(bb.ymax - bb.ymin + 1) * crossing
}

impl PlacerState<'_> {
    /// Computes the total bounding-box cost from scratch, reloading every
    /// net's committed bounding box (and edge counts for large nets).
    ///
    /// Called only when the placement has changed radically (at controller
    /// entry); between moves the incremental updaters keep the boxes current.
    pub(crate) fn comp_bb_cost(&mut self) -> f64 {
        let netlist = self.netlist;
        let mut cost = 0.0;

        for net in netlist.net_ids() {
            if netlist.net_is_ignored(net) {
                continue;
            }
            let i = net.as_raw() as usize;
            if netlist.num_sinks(net) >= SMALL_NET {
                let mut coords = NetBox::default();
                let mut edges = NetBox::default();
                get_bb_from_scratch(netlist, self.grid, self.placement, net, &mut coords, &mut edges);
                self.bb_coords[i] = coords;
                self.bb_num_on_edges[i] = edges;
            } else {
                // Small nets skip incremental updating, so edge counts are
                // not maintained for them.
                let mut coords = NetBox::default();
                get_non_updateable_bb(netlist, self.grid, self.placement, net, &mut coords);
                self.bb_coords[i] = coords;
            }
            self.net_cost[i] = get_net_cost(netlist, &self.chan_fac, net, &self.bb_coords[i]);
            cost += self.net_cost[i];
        }
        cost
    }

    /// Re-sums the committed per-net costs to shed accumulated round-off.
    ///
    /// The bounding boxes themselves are exact (integer), so only the sum
    /// needs re-anchoring.
    pub(crate) fn recompute_bb_cost(&self) -> f64 {
        let netlist = self.netlist;
        let mut cost = 0.0;
        for net in netlist.net_ids() {
            if !netlist.net_is_ignored(net) {
                cost += self.net_cost[net.as_raw() as usize];
            }
        }
        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_device::{BlockTypeId, TileType};

    fn sink() -> DiagnosticSink {
        DiagnosticSink::new()
    }

    fn grid(w: usize, h: usize, chan: i32) -> DeviceGrid {
        DeviceGrid::uniform(
            w,
            h,
            chan,
            TileType::uniform("clb", BlockTypeId::from_raw(0), 1, 8),
        )
    }

    #[test]
    fn crossing_count_small_fanouts() {
        assert_eq!(wirelength_crossing_count(1), 1.0);
        assert_eq!(wirelength_crossing_count(2), 1.0);
        assert_eq!(wirelength_crossing_count(3), 1.0);
        assert!((wirelength_crossing_count(4) - f64::from(1.0828f32)).abs() < 1e-9);
        assert!((wirelength_crossing_count(50) - f64::from(2.7933f32)).abs() < 1e-9);
    }

    #[test]
    fn crossing_count_extrapolates() {
        let at_60 = wirelength_crossing_count(60);
        assert!((at_60 - (2.7933 + 0.02616 * 10.0)).abs() < 1e-9);
        assert!(wirelength_crossing_count(100) > at_60);
    }

    #[test]
    fn factors_running_sum_and_transform() {
        // Uniform width 4: span [0, 1] sums 8 tracks, factor (2/8)^1 = 0.25.
        let s = sink();
        let fac = ChanCostFactors::new(&grid(2, 2, 4), 1.0, &s);
        assert!((fac.x(0, 0) - 0.25).abs() < 1e-6);
        assert!((fac.x(1, 0) - 0.25).abs() < 1e-6);
        assert!((fac.y(1, 1) - 0.25).abs() < 1e-6);
        assert!(s.diagnostics().is_empty());
    }

    #[test]
    fn factors_respect_cost_exponent() {
        let s = sink();
        let fac = ChanCostFactors::new(&grid(3, 3, 2), 2.0, &s);
        // Single channel of width 2: (1/2)^2 = 0.25.
        assert!((fac.x(0, 0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn zero_width_channel_clamps_and_warns() {
        let s = sink();
        let fac = ChanCostFactors::new(&grid(2, 2, 0), 1.0, &s);
        // Clamped to one track: (1/1)^1 = 1.
        assert_eq!(fac.x(0, 0), 1.0);
        assert!(!s.diagnostics().is_empty());
        assert!(!s.has_errors());
    }

    #[test]
    fn net_cost_trivial_box() {
        // Both pins at (1, 1) on a 2x2 grid with width-4 channels: each axis
        // contributes 1 * crossing(2) * 0.25, total 0.5.
        let mut nl = Netlist::new();
        let bt = BlockTypeId::from_raw(0);
        let a = nl.add_block("a", bt, false);
        let b = nl.add_block("b", bt, false);
        let n = nl.add_net("n", false);
        nl.add_pin(a, n, 0);
        nl.add_pin(b, n, 1);

        let s = sink();
        let fac = ChanCostFactors::new(&grid(2, 2, 4), 1.0, &s);
        let bb = NetBox {
            xmin: 1,
            ymin: 1,
            xmax: 1,
            ymax: 1,
        };
        let cost = get_net_cost(&nl, &fac, n, &bb);
        assert!((cost - 0.5).abs() < 1e-9);
    }

    #[test]
    fn wirelength_estimate_ignores_channels() {
        let mut nl = Netlist::new();
        let bt = BlockTypeId::from_raw(0);
        let a = nl.add_block("a", bt, false);
        let b = nl.add_block("b", bt, false);
        let n = nl.add_net("n", false);
        nl.add_pin(a, n, 0);
        nl.add_pin(b, n, 1);

        let bb = NetBox {
            xmin: 1,
            ymin: 1,
            xmax: 3,
            ymax: 2,
        };
        // (3 + 2) * crossing(2) = 5.
        assert!((get_net_wirelength_estimate(&nl, n, &bb) - 5.0).abs() < 1e-9);
    }
}
