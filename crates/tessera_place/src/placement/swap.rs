//! The single-move trial: propose, evaluate, accept or revert.
//!
//! A trial applies the proposed move to block locations only, gathers the
//! nets touched by any moved pin, computes wirelength and timing deltas
//! against the committed state, and then either commits everything (costs,
//! bounding boxes, timing shadows, grid occupancy) or rolls it all back.
//! Either way the scratch arrays end the trial quiesced to their sentinels.

use crate::data::PinKind;
use crate::error::PlaceError;
use crate::ids::{NetId, PinId};
use crate::opts::PlaceAlgorithm;
use crate::placement::bb::BbUpdate;
use crate::placement::cost;
use crate::placement::moves::{
    self, driven_by_moved_block, CreateMove, MoveContext, MoveGenerator, MoveOutcome,
    MoveOutcomeStats,
};
use crate::placement::timing::comp_td_connection_delay;
use crate::placement::PlacerState;
use crate::sta::{CriticalityProvider, TimingContext};
use rand::Rng;
use tessera_device::DelayModel;

impl PlacerState<'_> {
    /// Runs one swap trial at temperature `t` and range limit `rlim`.
    ///
    /// Returns the trial outcome; `Aborted` means the generator produced no
    /// legal move and nothing was evaluated. Costs may only go negative
    /// through round-off, which the sentinel scheme on `proposed_net_cost`
    /// relies on never happening for real nets.
    pub(crate) fn try_swap(
        &mut self,
        t: f64,
        rlim: f64,
        move_generator: &mut dyn MoveGenerator,
        mut tctx: Option<&mut TimingContext<'_>>,
    ) -> Result<MoveOutcome, PlaceError> {
        debug_assert_eq!(self.is_timing_driven(), tctx.is_some());
        self.num_ts_called += 1;

        let mut bb_delta_c = 0.0;
        let mut timing_delta_c = 0.0;

        // Let some fraction of moves ignore the range limit, in the hope of
        // escaping local minima.
        let mut rlim = rlim;
        if self.opts.rlim_escape_fraction > 0.0
            && self.rng.gen::<f64>() < self.opts.rlim_escape_fraction
        {
            rlim = f64::INFINITY;
        }

        let proposal = {
            let ctx = MoveContext {
                netlist: self.netlist,
                grid: self.grid,
                placement: self.placement,
            };
            move_generator.propose_move(&mut self.blocks_affected, rlim, &ctx, &mut self.rng)
        };

        if proposal == CreateMove::Abort {
            moves::clear_move_blocks(&mut self.blocks_affected);
            move_generator.process_outcome(&MoveOutcomeStats::aborted());
            return Ok(MoveOutcome::Aborted);
        }

        // Move the blocks to their new locations first (the grid occupancy
        // map is NOT updated yet), then evaluate the change in cost. The
        // occupancy map must therefore not be consulted while evaluating.
        moves::apply_move_blocks(self.placement, &self.blocks_affected);

        self.find_affected_nets_and_update_costs(
            tctx.as_deref_mut(),
            &mut bb_delta_c,
            &mut timing_delta_c,
        )?;

        let delta_c = if self.opts.algorithm == PlaceAlgorithm::PathTimingDriven {
            // Normalize both terms so delta_c is relative to a cost of 1.
            (1.0 - self.opts.timing_tradeoff) * bb_delta_c * self.prev_inverse.bb_cost
                + self.opts.timing_tradeoff * timing_delta_c * self.prev_inverse.timing_cost
        } else {
            bb_delta_c
        };

        let outcome = self.assess_swap(delta_c, t);

        if outcome == MoveOutcome::Accepted {
            self.costs.cost += delta_c;
            self.costs.bb_cost += bb_delta_c;

            if let Some(tc) = tctx.as_deref_mut() {
                self.costs.timing_cost += timing_delta_c;

                // Report changed delays before the shadows are consumed; the
                // comparison below needs both proposed and committed values.
                self.invalidate_affected_connection_delays(tc);

                let timing = self.timing.as_mut().expect("timing-driven state");
                timing.commit(self.netlist, &self.blocks_affected);
            }

            self.update_move_nets();
            moves::commit_move_blocks(self.placement, &self.blocks_affected);
        } else {
            self.reset_move_nets();
            moves::revert_move_blocks(self.placement, &self.blocks_affected);
            if let Some(timing) = self.timing.as_mut() {
                timing.revert(self.netlist, &self.blocks_affected.affected_pins);
            }
        }

        let stats = MoveOutcomeStats {
            delta_cost_norm: delta_c,
            delta_bb_cost_norm: bb_delta_c * self.prev_inverse.bb_cost,
            delta_timing_cost_norm: timing_delta_c * self.prev_inverse.timing_cost,
            delta_bb_cost_abs: bb_delta_c,
            delta_timing_cost_abs: timing_delta_c,
            outcome,
        };
        move_generator.process_outcome(&stats);

        moves::clear_move_blocks(&mut self.blocks_affected);
        Ok(outcome)
    }

    /// Metropolis acceptance: always take improvements, take degradations
    /// with probability `exp(-delta_c / t)`.
    pub(crate) fn assess_swap(&mut self, delta_c: f64, t: f64) -> MoveOutcome {
        if delta_c <= 0.0 {
            return MoveOutcome::Accepted;
        }
        if t == 0.0 {
            return MoveOutcome::Rejected;
        }
        let fnum: f64 = self.rng.gen();
        if (-delta_c / t).exp() > fnum {
            return MoveOutcome::Accepted;
        }
        MoveOutcome::Rejected
    }

    /// Collects every net touched by the move, updates proposed bounding
    /// boxes and (when timing-driven) per-connection deltas, and accumulates
    /// both cost deltas.
    fn find_affected_nets_and_update_costs(
        &mut self,
        mut tctx: Option<&mut TimingContext<'_>>,
        bb_delta_c: &mut f64,
        timing_delta_c: &mut f64,
    ) -> Result<(), PlaceError> {
        debug_assert!(self.ts_nets_to_update.is_empty());
        let netlist = self.netlist;

        for iblk in 0..self.blocks_affected.moved.len() {
            let moved = self.blocks_affected.moved[iblk];
            for &pin in netlist.block_pins(moved.block) {
                let net = netlist.pin_net(pin);
                if netlist.net_is_ignored(net) {
                    // Globals span the whole chip and carry no cost.
                    continue;
                }

                self.record_affected_net(net);

                // Bounding boxes update once per moved pin; the net cost is
                // recomputed later, once per net.
                self.update_net_bb(net, moved, pin);

                if let Some(tc) = tctx.as_deref_mut() {
                    self.update_td_delta_costs(
                        tc.delay_model,
                        &*tc.criticalities,
                        net,
                        pin,
                        timing_delta_c,
                    )?;
                }
            }
        }

        // Bounding boxes are now final for this trial; cost each affected
        // net exactly once.
        for idx in 0..self.ts_nets_to_update.len() {
            let net = self.ts_nets_to_update[idx];
            let i = net.as_raw() as usize;
            let new_cost =
                cost::get_net_cost(netlist, &self.chan_fac, net, &self.ts_bb_coord_new[i]);
            self.proposed_net_cost[i] = new_cost;
            *bb_delta_c += new_cost - self.net_cost[i];
        }
        Ok(())
    }

    /// Marks a net affected on first encounter, preserving discovery order.
    ///
    /// A negative `proposed_net_cost` doubles as the "not yet marked"
    /// sentinel; marking stores a placeholder that the costing pass
    /// overwrites.
    fn record_affected_net(&mut self, net: NetId) {
        let i = net.as_raw() as usize;
        if self.proposed_net_cost[i] < 0.0 {
            self.ts_nets_to_update.push(net);
            self.proposed_net_cost[i] = 1.0;
        }
    }

    /// Accumulates the timing-cost delta contributed by one moved pin.
    ///
    /// A moved driver re-evaluates every sink of its net. A moved sink only
    /// contributes when its driver did NOT move; otherwise the driver's pass
    /// already covered it and counting it again would corrupt the delta.
    fn update_td_delta_costs(
        &mut self,
        delay_model: &dyn DelayModel,
        criticalities: &dyn CriticalityProvider,
        net: NetId,
        pin: PinId,
        delta: &mut f64,
    ) -> Result<(), PlaceError> {
        let netlist = self.netlist;
        let i = net.as_raw() as usize;

        if netlist.pin_kind(pin) == PinKind::Driver {
            for ipin in 1..netlist.net_pins(net).len() {
                let proposed_delay =
                    comp_td_connection_delay(netlist, self.placement, delay_model, net, ipin)?;
                let proposed_cost =
                    f64::from(criticalities.criticality(net, ipin) * proposed_delay);

                let timing = self.timing.as_mut().expect("timing-driven state");
                timing.proposed_connection_delay[i][ipin] = proposed_delay;
                timing.proposed_connection_timing_cost[i][ipin] = proposed_cost;
                *delta += proposed_cost - timing.connection_timing_cost[i][ipin];

                self.blocks_affected
                    .affected_pins
                    .push(netlist.net_pins(net)[ipin]);
            }
        } else if !driven_by_moved_block(netlist, net, &self.blocks_affected) {
            let ipin = netlist.pin_net_index(pin);
            let proposed_delay =
                comp_td_connection_delay(netlist, self.placement, delay_model, net, ipin)?;
            let proposed_cost = f64::from(criticalities.criticality(net, ipin) * proposed_delay);

            let timing = self.timing.as_mut().expect("timing-driven state");
            timing.proposed_connection_delay[i][ipin] = proposed_delay;
            timing.proposed_connection_timing_cost[i][ipin] = proposed_cost;
            *delta += proposed_cost - timing.connection_timing_cost[i][ipin];

            self.blocks_affected.affected_pins.push(pin);
        }
        Ok(())
    }

    /// Notifies the timing graph of every connection whose delay actually
    /// changed under the accepted move.
    ///
    /// Connections whose delay is unchanged (possible when a sink lands at
    /// the same delta from its driver) are not reported, keeping the
    /// incremental analysis minimal.
    fn invalidate_affected_connection_delays(&self, tc: &mut TimingContext<'_>) {
        let timing = self.timing.as_ref().expect("timing-driven state");
        for &pin in &self.blocks_affected.affected_pins {
            let net = self.netlist.pin_net(pin);
            let i = net.as_raw() as usize;
            let ipin = self.netlist.pin_net_index(pin);
            if timing.proposed_connection_delay[i][ipin] != timing.connection_delay[i][ipin] {
                tc.invalidator.invalidate_connection(pin);
            }
        }
    }

    /// Commits the affected nets' proposed boxes and costs, quiescing the
    /// per-net markers.
    pub(crate) fn update_move_nets(&mut self) {
        use crate::placement::bb::SMALL_NET;
        for idx in 0..self.ts_nets_to_update.len() {
            let net = self.ts_nets_to_update[idx];
            let i = net.as_raw() as usize;

            self.bb_coords[i] = self.ts_bb_coord_new[i];
            if self.netlist.num_sinks(net) >= SMALL_NET {
                self.bb_num_on_edges[i] = self.ts_bb_edge_new[i];
            }
            self.net_cost[i] = self.proposed_net_cost[i];

            self.proposed_net_cost[i] = -1.0;
            self.bb_updated_before[i] = BbUpdate::NotUpdatedYet;
        }
        self.ts_nets_to_update.clear();
    }

    /// Quiesces the per-net markers of a rejected move.
    pub(crate) fn reset_move_nets(&mut self) {
        for idx in 0..self.ts_nets_to_update.len() {
            let net = self.ts_nets_to_update[idx];
            let i = net.as_raw() as usize;
            self.proposed_net_cost[i] = -1.0;
            self.bb_updated_before[i] = BbUpdate::NotUpdatedYet;
        }
        self.ts_nets_to_update.clear();
    }
}
