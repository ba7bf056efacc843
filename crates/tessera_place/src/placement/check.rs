//! Placement invariant checker.
//!
//! Recomputes both cost totals through independent paths and verifies the
//! forward and inverse location maps agree, every block is placed exactly
//! once on a compatible slot, and every macro holds formation. Any violation
//! is fatal: a placement whose books don't balance cannot be trusted.

use crate::error::PlaceError;
use crate::placement::bb::{get_non_updateable_bb, NetBox};
use crate::placement::timing::comp_td_connection_delay;
use crate::placement::{cost, PlacerState, ERROR_TOL};
use crate::sta::TimingContext;
use tessera_diagnostics::{Category, Diagnostic, DiagnosticCode};

impl PlacerState<'_> {
    /// Verifies the placement and the incremental cost totals.
    ///
    /// Individual findings are reported through the diagnostic sink; the
    /// returned error carries only the count.
    pub(crate) fn check_place(
        &self,
        tctx: Option<&TimingContext<'_>>,
    ) -> Result<(), PlaceError> {
        let mut errors = 0;
        errors += self.check_placement_consistency();
        errors += self.check_placement_costs(tctx);

        if errors == 0 {
            log::info!("completed placement consistency check successfully");
            Ok(())
        } else {
            Err(PlaceError::Inconsistent { errors })
        }
    }

    /// Compares the incremental cost totals against independent references:
    /// the non-updateable bounding box for every net, and a full
    /// delay-model re-evaluation for timing.
    fn check_placement_costs(&self, tctx: Option<&TimingContext<'_>>) -> usize {
        let mut errors = 0;

        let (bb_check, expected_wirelength) = self.reference_bb_cost();
        log::info!("bb estimate of min-dist (placement) wire length: {expected_wirelength:.0}");
        if (bb_check - self.costs.bb_cost).abs() > self.costs.bb_cost * ERROR_TOL {
            self.sink.emit(Diagnostic::error(
                DiagnosticCode::new(Category::Placement, 10),
                format!(
                    "bb_cost from scratch {bb_check} and incremental {} disagree",
                    self.costs.bb_cost
                ),
            ));
            errors += 1;
        }

        if let Some(tc) = tctx {
            match self.reference_td_cost(tc) {
                Ok(timing_check) => {
                    if (timing_check - self.costs.timing_cost).abs()
                        > self.costs.timing_cost * ERROR_TOL
                    {
                        self.sink.emit(Diagnostic::error(
                            DiagnosticCode::new(Category::Timing, 10),
                            format!(
                                "timing_cost from scratch {timing_check} and incremental {} \
                                 disagree",
                                self.costs.timing_cost
                            ),
                        ));
                        errors += 1;
                    }
                }
                Err(err) => {
                    self.sink.emit(Diagnostic::error(
                        DiagnosticCode::new(Category::Timing, 11),
                        format!("timing recheck failed: {err}"),
                    ));
                    errors += 1;
                }
            }
        }
        errors
    }

    /// Recomputes the total wiring cost using the simple bounding-box path
    /// for every net, independent of the incrementally maintained boxes.
    fn reference_bb_cost(&self) -> (f64, f64) {
        let netlist = self.netlist;
        let mut total = 0.0;
        let mut expected_wirelength = 0.0;
        for net in netlist.net_ids() {
            if netlist.net_is_ignored(net) {
                continue;
            }
            let mut bb = NetBox::default();
            get_non_updateable_bb(netlist, self.grid, self.placement, net, &mut bb);
            total += cost::get_net_cost(netlist, &self.chan_fac, net, &bb);
            expected_wirelength += cost::get_net_wirelength_estimate(netlist, net, &bb);
        }
        (total, expected_wirelength)
    }

    /// Recomputes the total timing cost from the delay model and current
    /// criticalities, summed hierarchically like the maintained total.
    fn reference_td_cost(&self, tc: &TimingContext<'_>) -> Result<f64, PlaceError> {
        let netlist = self.netlist;
        let mut total = 0.0;
        for net in netlist.net_ids() {
            if netlist.net_is_ignored(net) {
                continue;
            }
            let mut net_cost = 0.0;
            for ipin in 1..netlist.net_pins(net).len() {
                let delay =
                    comp_td_connection_delay(netlist, self.placement, tc.delay_model, net, ipin)?;
                net_cost += f64::from(tc.criticalities.criticality(net, ipin) * delay);
            }
            total += net_cost;
        }
        Ok(total)
    }

    /// Verifies the forward and inverse location maps agree everywhere.
    fn check_placement_consistency(&self) -> usize {
        self.check_block_consistency() + self.check_macro_consistency()
    }

    fn check_block_consistency(&self) -> usize {
        let netlist = self.netlist;
        let mut errors = 0;
        let mut times_placed = vec![0usize; netlist.block_count()];

        for x in 0..self.grid.width() {
            for y in 0..self.grid.height() {
                let cell = self.placement.cell(x as i32, y as i32);
                let tile = self.grid.tile_type_at(x, y);

                if cell.usage > tile.capacity() {
                    self.sink.emit(Diagnostic::error(
                        DiagnosticCode::new(Category::Placement, 20),
                        format!("grid location ({x}, {y}) overused: usage {}", cell.usage),
                    ));
                    errors += 1;
                }

                let mut usage_check = 0;
                for sub_tile in 0..tile.capacity() {
                    let Some(block) = cell.blocks[sub_tile] else {
                        continue;
                    };

                    if !tile.is_sub_tile_compatible(netlist.block_type(block), sub_tile) {
                        self.sink.emit(Diagnostic::error(
                            DiagnosticCode::new(Category::Placement, 21),
                            format!(
                                "block {block} type {} incompatible with tile '{}' at \
                                 ({x}, {y}, {sub_tile})",
                                netlist.block_type(block),
                                tile.name
                            ),
                        ));
                        errors += 1;
                    }

                    let loc = self.placement.block_loc(block);
                    if loc.x != x as i32 || loc.y != y as i32 || loc.sub_tile != sub_tile {
                        self.sink.emit(Diagnostic::error(
                            DiagnosticCode::new(Category::Placement, 22),
                            format!(
                                "block {block} location ({}, {}, {}) but found in grid at \
                                 ({x}, {y}, {sub_tile})",
                                loc.x, loc.y, loc.sub_tile
                            ),
                        ));
                        errors += 1;
                    }
                    usage_check += 1;
                    times_placed[block.as_raw() as usize] += 1;
                }

                if usage_check != cell.usage {
                    self.sink.emit(Diagnostic::error(
                        DiagnosticCode::new(Category::Placement, 23),
                        format!(
                            "location ({x}, {y}) usage is {} but has actual usage {usage_check}",
                            cell.usage
                        ),
                    ));
                    errors += 1;
                }
            }
        }

        for block in netlist.block_ids() {
            let n = times_placed[block.as_raw() as usize];
            if n != 1 {
                self.sink.emit(Diagnostic::error(
                    DiagnosticCode::new(Category::Placement, 24),
                    format!("block {block} listed {n} times in the grid"),
                ));
                errors += 1;
            }
        }
        errors
    }

    fn check_macro_consistency(&self) -> usize {
        let mut errors = 0;
        for (imacro, pl_macro) in self.placement.macros.iter().enumerate() {
            let head_loc = self.placement.block_loc(pl_macro.members[0].block);

            for member in &pl_macro.members {
                let expected = head_loc.offset_by(member.offset);
                let actual = self.placement.block_loc(member.block);

                if actual != expected {
                    self.sink.emit(Diagnostic::error(
                        DiagnosticCode::new(Category::Placement, 25),
                        format!(
                            "block {} in macro {imacro} is out of formation",
                            member.block
                        ),
                    ));
                    errors += 1;
                }

                if self.placement.cell(expected.x, expected.y).blocks[expected.sub_tile]
                    != Some(member.block)
                {
                    self.sink.emit(Diagnostic::error(
                        DiagnosticCode::new(Category::Placement, 26),
                        format!(
                            "grid does not record block {} of macro {imacro} at its \
                             formation slot",
                            member.block
                        ),
                    ));
                    errors += 1;
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::BlockId;
    use crate::loc::{GridLoc, MacroMember, MacroOffset};
    use crate::opts::PlacerOpts;
    use crate::testutil::{place_at, single_net_world};
    use tessera_diagnostics::DiagnosticSink;

    #[test]
    fn consistent_placement_passes() {
        let (nl, grid) = single_net_world(8, &[(1, 1), (4, 4)]);
        let mut pl = place_at(&nl, &grid, &[(1, 1), (4, 4)]);
        let opts = PlacerOpts::default();
        let sink = DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost();

        assert!(state.check_place(None).is_ok());
        assert!(!sink.has_errors());
    }

    #[test]
    fn cost_drift_is_detected() {
        let (nl, grid) = single_net_world(8, &[(1, 1), (4, 4)]);
        let mut pl = place_at(&nl, &grid, &[(1, 1), (4, 4)]);
        let opts = PlacerOpts::default();
        let sink = DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost() * 2.0;

        let err = state.check_place(None).unwrap_err();
        assert!(matches!(err, PlaceError::Inconsistent { errors: 1 }));
        assert!(sink.has_errors());
    }

    #[test]
    fn forward_inverse_disagreement_is_detected() {
        let (nl, grid) = single_net_world(8, &[(1, 1), (4, 4)]);
        let mut pl = place_at(&nl, &grid, &[(1, 1), (4, 4)]);
        // Corrupt the forward map only.
        pl.block_locs[1] = GridLoc::new(5, 5, 0);

        let opts = PlacerOpts::default();
        let sink = DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost();

        assert!(state.check_place(None).is_err());
    }

    #[test]
    fn macro_out_of_formation_is_detected() {
        let (nl, grid) = single_net_world(8, &[(2, 2), (2, 3), (5, 5)]);
        let mut pl = place_at(&nl, &grid, &[(2, 2), (2, 4), (5, 5)]);
        pl.add_macro(vec![
            MacroMember {
                block: BlockId::from_raw(0),
                offset: MacroOffset::default(),
            },
            MacroMember {
                block: BlockId::from_raw(1),
                // Expects the tail directly above the head, but it sits at
                // (2, 4).
                offset: MacroOffset::new(0, 1, 0),
            },
        ]);

        let opts = PlacerOpts::default();
        let sink = DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost();

        assert!(state.check_place(None).is_err());
    }

    #[test]
    fn macro_in_formation_passes() {
        let (nl, grid) = single_net_world(8, &[(2, 2), (2, 3), (5, 5)]);
        let mut pl = place_at(&nl, &grid, &[(2, 2), (2, 3), (5, 5)]);
        pl.add_macro(vec![
            MacroMember {
                block: BlockId::from_raw(0),
                offset: MacroOffset::default(),
            },
            MacroMember {
                block: BlockId::from_raw(1),
                offset: MacroOffset::new(0, 1, 0),
            },
        ]);

        let opts = PlacerOpts::default();
        let sink = DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost();

        assert!(state.check_place(None).is_ok());
    }
}
