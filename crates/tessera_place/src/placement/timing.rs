//! Per-connection timing cost caches for timing-driven placement.
//!
//! Each source-to-sink connection carries a cached delay and a timing cost
//! (criticality * delay). A shadow pair holds the values a trial proposes;
//! shadow entries are `NaN` whenever no trial is pending, and both the commit
//! and revert paths restore that sentinel.
//!
//! Totals are always summed hierarchically (connection -> net -> total) so
//! the incremental and from-scratch paths produce bit-identical results
//! under finite-precision arithmetic. Connection delays are `f32`; costs and
//! accumulations are `f64`.

use crate::data::{Netlist, PinKind};
use crate::error::PlaceError;
use crate::ids::{NetId, PinId};
use crate::loc::Placement;
use crate::placement::moves::{driven_by_moved_block, BlocksAffected};
use crate::sta::CriticalityProvider;
use tessera_device::DelayModel;

/// Committed and proposed timing state for every connection.
///
/// Matrices are indexed `[net][pin]` with pin indices starting at 1 (slot 0
/// belongs to the driver and is never read).
pub(crate) struct TimingCosts {
    /// Delay of each connection under the committed placement.
    pub connection_delay: Vec<Vec<f32>>,
    /// Delay each pending trial proposes; `NaN` when not pending.
    pub proposed_connection_delay: Vec<Vec<f32>>,
    /// Timing cost (criticality * delay) of each connection.
    pub connection_timing_cost: Vec<Vec<f64>>,
    /// Timing cost each pending trial proposes; `NaN` when not pending.
    pub proposed_connection_timing_cost: Vec<Vec<f64>>,
    /// Per-net sums of connection timing costs, kept so the total can be
    /// re-derived in a fixed order.
    pub net_timing_cost: Vec<f64>,
}

/// Returns the delay of one source-to-sink connection under the current
/// block locations.
///
/// Ignored nets have zero delay. A negative delay from the model is a fatal
/// modeling error.
pub(crate) fn comp_td_connection_delay(
    netlist: &Netlist,
    placement: &Placement,
    delay_model: &dyn DelayModel,
    net: NetId,
    ipin: usize,
) -> Result<f32, PlaceError> {
    if netlist.net_is_ignored(net) {
        return Ok(0.0);
    }

    let source_pin = netlist.net_driver(net);
    let sink_pin = netlist.net_pins(net)[ipin];
    let src = placement.block_loc(netlist.pin_block(source_pin));
    let dst = placement.block_loc(netlist.pin_block(sink_pin));

    let delay = delay_model.delay(
        src.x,
        src.y,
        netlist.pin(source_pin).tile_pin,
        dst.x,
        dst.y,
        netlist.pin(sink_pin).tile_pin,
    );
    if delay < 0.0 {
        return Err(PlaceError::NegativeDelay {
            delay,
            src_x: src.x,
            src_y: src.y,
            sink_x: dst.x,
            sink_y: dst.y,
        });
    }
    Ok(delay)
}

impl TimingCosts {
    /// Allocates caches sized for the netlist, with all shadow entries at
    /// the not-pending sentinel.
    pub(crate) fn new(netlist: &Netlist) -> Self {
        let sizes: Vec<usize> = netlist.net_ids().map(|n| netlist.net_pins(n).len()).collect();
        Self {
            connection_delay: sizes.iter().map(|&s| vec![0.0; s]).collect(),
            proposed_connection_delay: sizes.iter().map(|&s| vec![f32::NAN; s]).collect(),
            connection_timing_cost: sizes.iter().map(|&s| vec![f64::NAN; s]).collect(),
            proposed_connection_timing_cost: sizes.iter().map(|&s| vec![f64::NAN; s]).collect(),
            net_timing_cost: vec![0.0; netlist.net_count()],
        }
    }

    /// Recomputes every connection delay and cost from scratch and returns
    /// the total timing cost.
    ///
    /// The hierarchical summation here is the reference order the
    /// incremental path must reproduce exactly.
    pub(crate) fn comp_td_costs(
        &mut self,
        netlist: &Netlist,
        placement: &Placement,
        delay_model: &dyn DelayModel,
        criticalities: &dyn CriticalityProvider,
    ) -> Result<f64, PlaceError> {
        for net in netlist.net_ids() {
            if netlist.net_is_ignored(net) {
                continue;
            }
            let i = net.as_raw() as usize;
            for ipin in 1..netlist.net_pins(net).len() {
                let delay = comp_td_connection_delay(netlist, placement, delay_model, net, ipin)?;
                self.connection_delay[i][ipin] = delay;
                self.connection_timing_cost[i][ipin] = self.connection_cost(criticalities, net, ipin);
            }
            self.net_timing_cost[i] = self.sum_net_cost(netlist, net);
        }
        Ok(self.sum_costs(netlist))
    }

    /// Refreshes connection costs after a criticality update and returns the
    /// re-derived total.
    ///
    /// Only connections whose criticality changed are recomputed (their
    /// cached delays are still valid; delay changes only on moves). The
    /// per-net and total sums are then rebuilt in the same order as
    /// [`comp_td_costs`](Self::comp_td_costs), so both paths agree to the
    /// last bit.
    pub(crate) fn update_td_costs(
        &mut self,
        netlist: &Netlist,
        criticalities: &dyn CriticalityProvider,
    ) -> f64 {
        for &pin in criticalities.pins_with_modified_criticality() {
            if netlist.pin_kind(pin) == PinKind::Driver {
                continue;
            }
            let net = netlist.pin_net(pin);
            if netlist.net_is_ignored(net) {
                continue;
            }
            let ipin = netlist.pin_net_index(pin);
            self.connection_timing_cost[net.as_raw() as usize][ipin] =
                self.connection_cost(criticalities, net, ipin);
        }

        for net in netlist.net_ids() {
            if netlist.net_is_ignored(net) {
                continue;
            }
            self.net_timing_cost[net.as_raw() as usize] = self.sum_net_cost(netlist, net);
        }
        self.sum_costs(netlist)
    }

    /// Computes one connection's timing cost from its cached delay.
    fn connection_cost(
        &self,
        criticalities: &dyn CriticalityProvider,
        net: NetId,
        ipin: usize,
    ) -> f64 {
        debug_assert!(ipin > 0, "driver pins carry no connection cost");
        let i = net.as_raw() as usize;
        debug_assert!(
            self.proposed_connection_delay[i][ipin].is_nan(),
            "proposed delay should be quiesced"
        );
        debug_assert!(
            self.proposed_connection_timing_cost[i][ipin].is_nan(),
            "proposed timing cost should be quiesced"
        );
        f64::from(criticalities.criticality(net, ipin) * self.connection_delay[i][ipin])
    }

    /// Sums one net's connection costs in pin order.
    fn sum_net_cost(&self, netlist: &Netlist, net: NetId) -> f64 {
        let i = net.as_raw() as usize;
        let mut net_cost = 0.0;
        for ipin in 1..netlist.net_pins(net).len() {
            net_cost += self.connection_timing_cost[i][ipin];
        }
        net_cost
    }

    /// Sums the per-net costs over non-ignored nets in net order.
    fn sum_costs(&self, netlist: &Netlist) -> f64 {
        let mut total = 0.0;
        for net in netlist.net_ids() {
            if !netlist.net_is_ignored(net) {
                total += self.net_timing_cost[net.as_raw() as usize];
            }
        }
        total
    }

    /// Promotes proposed delays and costs to committed for every connection
    /// the accepted move touched, quiescing the shadow entries.
    ///
    /// Walks the moved blocks' pins with the same driver-covers-sinks rule
    /// used when the deltas were computed, so exactly the written shadow
    /// entries are consumed.
    pub(crate) fn commit(&mut self, netlist: &Netlist, blocks: &BlocksAffected) {
        for mb in &blocks.moved {
            for &pin in netlist.block_pins(mb.block) {
                let net = netlist.pin_net(pin);
                if netlist.net_is_ignored(net) {
                    continue;
                }
                if netlist.pin_kind(pin) == PinKind::Driver {
                    for ipin in 1..netlist.net_pins(net).len() {
                        self.promote(net, ipin);
                    }
                } else if !driven_by_moved_block(netlist, net, blocks) {
                    self.promote(net, netlist.pin_net_index(pin));
                }
            }
        }
    }

    fn promote(&mut self, net: NetId, ipin: usize) {
        let i = net.as_raw() as usize;
        self.connection_delay[i][ipin] = self.proposed_connection_delay[i][ipin];
        self.proposed_connection_delay[i][ipin] = f32::NAN;
        self.connection_timing_cost[i][ipin] = self.proposed_connection_timing_cost[i][ipin];
        self.proposed_connection_timing_cost[i][ipin] = f64::NAN;
    }

    /// Quiesces the shadow entries of a rejected move, leaving committed
    /// values untouched.
    pub(crate) fn revert(&mut self, netlist: &Netlist, affected_pins: &[PinId]) {
        for &pin in affected_pins {
            let i = netlist.pin_net(pin).as_raw() as usize;
            let ipin = netlist.pin_net_index(pin);
            self.proposed_connection_delay[i][ipin] = f32::NAN;
            self.proposed_connection_timing_cost[i][ipin] = f64::NAN;
        }
    }

    /// Returns whether every shadow entry is quiesced.
    #[cfg(test)]
    pub(crate) fn shadows_quiesced(&self, netlist: &Netlist) -> bool {
        netlist.net_ids().all(|net| {
            let i = net.as_raw() as usize;
            (1..netlist.net_pins(net).len()).all(|ipin| {
                self.proposed_connection_delay[i][ipin].is_nan()
                    && self.proposed_connection_timing_cost[i][ipin].is_nan()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::BlockId;
    use crate::loc::GridLoc;
    use crate::placement::moves::MovedBlock;
    use crate::testutil::{place_at, single_net_world, FlatCriticalities, StubTimingInfo};
    use tessera_device::DeltaDelayModel;

    fn world() -> (Netlist, tessera_device::DeviceGrid, Placement, DeltaDelayModel) {
        let (nl, grid) = single_net_world(8, &[(1, 1), (3, 3), (5, 5)]);
        let pl = place_at(&nl, &grid, &[(1, 1), (3, 3), (5, 5)]);
        let model = DeltaDelayModel::linear(8, 8, 1e-10);
        (nl, grid, pl, model)
    }

    #[test]
    fn from_scratch_fills_delays_and_costs() {
        let (nl, _grid, pl, model) = world();
        let crits = FlatCriticalities::new(&nl, 0.5);
        let mut tc = TimingCosts::new(&nl);

        let total = tc.comp_td_costs(&nl, &pl, &model, &crits).unwrap();

        // Sinks at distance 4 and 8 from the driver at (1,1).
        assert_eq!(tc.connection_delay[0][1], 4e-10);
        assert_eq!(tc.connection_delay[0][2], 8e-10);
        let expected =
            f64::from(0.5f32 * 4e-10f32) + f64::from(0.5f32 * 8e-10f32);
        assert_eq!(total, expected);
        assert_eq!(tc.net_timing_cost[0], expected);
        assert!(tc.shadows_quiesced(&nl));
    }

    #[test]
    fn negative_delay_is_fatal() {
        let (nl, _grid, pl, _model) = world();
        struct BadModel;
        impl DelayModel for BadModel {
            fn delay(&self, _: i32, _: i32, _: usize, _: i32, _: i32, _: usize) -> f32 {
                -1.0
            }
        }
        let crits = FlatCriticalities::new(&nl, 0.5);
        let mut tc = TimingCosts::new(&nl);
        let err = tc.comp_td_costs(&nl, &pl, &BadModel, &crits).unwrap_err();
        assert!(matches!(err, PlaceError::NegativeDelay { .. }));
    }

    #[test]
    fn ignored_nets_cost_nothing() {
        let (mut nl, grid, _, model) = world();
        let clk = nl.add_net("clk", true);
        nl.add_pin(BlockId::from_raw(0), clk, 4);
        nl.add_pin(BlockId::from_raw(2), clk, 5);
        let pl = place_at(&nl, &grid, &[(1, 1), (3, 3), (5, 5)]);

        let crits = FlatCriticalities::new(&nl, 1.0);
        let mut tc = TimingCosts::new(&nl);
        let total = tc.comp_td_costs(&nl, &pl, &model, &crits).unwrap();
        let expected = f64::from(1.0f32 * 4e-10f32) + f64::from(1.0f32 * 8e-10f32);
        assert_eq!(total, expected);
    }

    #[test]
    fn criticality_refresh_matches_from_scratch_exactly() {
        let (nl, _grid, pl, model) = world();
        let mut crits = FlatCriticalities::new(&nl, 0.5);
        let timing_info = StubTimingInfo::new();
        let mut tc = TimingCosts::new(&nl);
        tc.comp_td_costs(&nl, &pl, &model, &crits).unwrap();

        // Sharpen criticalities, then refresh incrementally.
        crits.pending = 0.875;
        crits.update_criticalities(&timing_info, 1.0);
        let incremental = tc.update_td_costs(&nl, &crits);

        let mut fresh = TimingCosts::new(&nl);
        let scratch = fresh.comp_td_costs(&nl, &pl, &model, &crits).unwrap();
        assert_eq!(incremental.to_bits(), scratch.to_bits());
    }

    #[test]
    fn commit_promotes_and_quiesces() {
        let (nl, _grid, mut pl, model) = world();
        let crits = FlatCriticalities::new(&nl, 1.0);
        let mut tc = TimingCosts::new(&nl);
        tc.comp_td_costs(&nl, &pl, &model, &crits).unwrap();

        // Move the driver block from (1,1) to (2,2) and propose new values.
        let net = NetId::from_raw(0);
        let moved = MovedBlock {
            block: BlockId::from_raw(0),
            old_loc: GridLoc::new(1, 1, 0),
            new_loc: GridLoc::new(2, 2, 0),
        };
        pl.block_locs[0] = moved.new_loc;
        let mut blocks = BlocksAffected::default();
        blocks.moved.push(moved);

        for ipin in 1..nl.net_pins(net).len() {
            let d = comp_td_connection_delay(&nl, &pl, &model, net, ipin).unwrap();
            tc.proposed_connection_delay[0][ipin] = d;
            tc.proposed_connection_timing_cost[0][ipin] = f64::from(1.0f32 * d);
            blocks.affected_pins.push(nl.net_pins(net)[ipin]);
        }

        tc.commit(&nl, &blocks);
        assert_eq!(tc.connection_delay[0][1], 2e-10);
        assert_eq!(tc.connection_delay[0][2], 6.0 * 1e-10f32);
        assert!(tc.shadows_quiesced(&nl));
    }

    #[test]
    fn revert_discards_proposals() {
        let (nl, _grid, pl, model) = world();
        let crits = FlatCriticalities::new(&nl, 1.0);
        let mut tc = TimingCosts::new(&nl);
        tc.comp_td_costs(&nl, &pl, &model, &crits).unwrap();

        let net = NetId::from_raw(0);
        let before_delay = tc.connection_delay[0][1];
        let before_cost = tc.connection_timing_cost[0][1];

        tc.proposed_connection_delay[0][1] = 9e-10;
        tc.proposed_connection_timing_cost[0][1] = 9e-10;
        let affected = vec![nl.net_pins(net)[1]];

        tc.revert(&nl, &affected);
        assert_eq!(tc.connection_delay[0][1], before_delay);
        assert_eq!(tc.connection_timing_cost[0][1], before_cost);
        assert!(tc.shadows_quiesced(&nl));
    }
}
