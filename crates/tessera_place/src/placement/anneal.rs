//! The annealing controller: temperature schedules, inner loops, and the
//! top-level [`try_place`] driver.
//!
//! The controller estimates a starting temperature, then alternates
//! criticality refreshes with inner loops of swap trials, adapting the
//! temperature, range limit, move limit, and criticality exponent to the
//! observed acceptance rate. A zero-temperature quench finishes the run,
//! followed by a full consistency check.

use crate::data::Netlist;
use crate::error::{CostKind, PlaceError};
use crate::loc::Placement;
use crate::opts::{AnnealingSchedule, EffortScaling, PlaceAlgorithm, PlacerOpts, ScheduleKind};
use crate::placement::moves::{MoveGenerator, MoveOutcome};
use crate::placement::{Costs, PlacerState, ERROR_TOL};
use crate::sta::TimingContext;
use std::time::Instant;
use tessera_device::DeviceGrid;
use tessera_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};

/// Swap attempts between from-scratch cost recomputations, bounding the
/// round-off that incremental updates can accumulate.
const MAX_MOVES_BEFORE_RECOMPUTE: usize = 500_000;

/// Cap on the inverse timing-cost normalizer. Keeps very lax timing
/// constraints from producing a gigantic multiplier when auto-normalizing;
/// the exact value matters little but must stay well above normal inverse
/// timing costs.
const MAX_INV_TIMING_COST: f64 = 1e9;

/// The terminal range limit. An rlim of 1 still permits adjacent swaps; 0
/// would allow none.
const FINAL_RLIM: f64 = 1.0;

/// The evolving annealing controls.
#[derive(Debug, Clone)]
pub(crate) struct AnnealingState {
    /// Current temperature.
    pub t: f64,
    /// Current range limit for move proposals.
    pub rlim: f64,
    /// Precomputed `1 / (initial_rlim - FINAL_RLIM)` for criticality-exponent
    /// interpolation (0 when the grid starts at the terminal limit).
    pub inverse_delta_rlim: f64,
    /// Temperature decay factor.
    pub alpha: f64,
    /// Restart temperature recorded by the Dusty schedule.
    pub restart_t: f64,
    /// Current criticality exponent.
    pub crit_exponent: f64,
    /// Maximum moves per temperature.
    pub move_lim_max: usize,
    /// Current moves per temperature (the Dusty schedule scales this).
    pub move_lim: usize,
}

impl AnnealingState {
    fn new(
        sched: &AnnealingSchedule,
        t: f64,
        rlim: f64,
        move_lim_max: usize,
        crit_exponent: f64,
    ) -> Self {
        let move_lim_max = move_lim_max.max(1);
        let move_lim = if sched.kind == ScheduleKind::Dusty {
            ((move_lim_max as f64 * sched.success_target) as usize).max(1)
        } else {
            move_lim_max
        };
        Self {
            t,
            rlim,
            inverse_delta_rlim: if rlim > FINAL_RLIM {
                1.0 / (rlim - FINAL_RLIM)
            } else {
                0.0
            },
            alpha: sched.alpha_min,
            restart_t: t,
            crit_exponent,
            move_lim_max,
            move_lim,
        }
    }
}

/// Running per-temperature statistics over accepted moves.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PlacerStats {
    pub av_cost: f64,
    pub av_bb_cost: f64,
    pub av_timing_cost: f64,
    pub sum_of_squares: f64,
    pub success_sum: usize,
}

impl PlacerStats {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn record_success(&mut self, costs: &Costs) {
        self.success_sum += 1;
        self.av_cost += costs.cost;
        self.av_bb_cost += costs.bb_cost;
        self.av_timing_cost += costs.timing_cost;
        self.sum_of_squares += costs.cost * costs.cost;
    }

    /// Turns the running sums into averages and returns
    /// `(success_rate, std_dev)` for the finished temperature.
    fn finalize(&mut self, costs: &Costs, move_lim: usize) -> (f64, f64) {
        let success_rat = self.success_sum as f64 / move_lim as f64;
        if self.success_sum == 0 {
            self.av_cost = costs.cost;
            self.av_bb_cost = costs.bb_cost;
            self.av_timing_cost = costs.timing_cost;
        } else {
            self.av_cost /= self.success_sum as f64;
            self.av_bb_cost /= self.success_sum as f64;
            self.av_timing_cost /= self.success_sum as f64;
        }
        let std_dev = get_std_dev(self.success_sum, self.sum_of_squares, self.av_cost);
        (success_rat, std_dev)
    }
}

/// Standard deviation of `n` samples given their sum of squares and average.
///
/// Done in double precision throughout; round-off makes small variances come
/// out slightly negative, which must read as zero.
fn get_std_dev(n: usize, sum_x_squared: f64, av_x: f64) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let variance = (sum_x_squared - n as f64 * av_x * av_x) / (n - 1) as f64;
    if variance > 0.0 {
        variance.sqrt()
    } else {
        0.0
    }
}

/// Final metrics of a completed placement run.
#[derive(Debug, Clone)]
pub struct PlacementSummary {
    /// Final combined cost (normalized when timing-driven).
    pub cost: f64,
    /// Final bounding-box wirelength cost.
    pub bb_cost: f64,
    /// Final timing cost (0 for wirelength-only runs).
    pub timing_cost: f64,
    /// Temperature steps taken, including the quench.
    pub num_temps: usize,
    /// Total swap attempts over the whole run.
    pub total_moves: usize,
    /// Accepted swap count.
    pub swaps_accepted: usize,
    /// Rejected swap count.
    pub swaps_rejected: usize,
    /// Aborted swap count.
    pub swaps_aborted: usize,
    /// Estimated critical path delay in seconds (`NaN` when wirelength-only).
    pub critical_path_delay: f32,
    /// Setup total negative slack in seconds (`NaN` when wirelength-only).
    pub total_negative_slack: f32,
    /// Setup worst negative slack in seconds (`NaN` when wirelength-only).
    pub worst_negative_slack: f32,
}

/// Anneals `placement` toward minimum cost and returns the run's metrics.
///
/// The placement must be legal on entry; every accepted move preserves
/// legality, and a full consistency check runs before returning. Timing-
/// driven runs require a [`TimingContext`]; wirelength-only runs ignore any
/// provided one. With a fixed `opts.seed` the entire anneal is reproducible.
#[allow(clippy::too_many_arguments)]
pub fn try_place(
    netlist: &Netlist,
    grid: &DeviceGrid,
    placement: &mut Placement,
    opts: &PlacerOpts,
    sched: &AnnealingSchedule,
    move_generator: &mut dyn MoveGenerator,
    mut timing_ctx: Option<TimingContext<'_>>,
    sink: &DiagnosticSink,
) -> Result<PlacementSummary, PlaceError> {
    opts.validate()?;
    let timing_driven = opts.algorithm == PlaceAlgorithm::PathTimingDriven;
    if timing_driven && timing_ctx.is_none() {
        return Err(PlaceError::InvalidOption {
            reason: "timing-driven placement requires a timing context".into(),
        });
    }
    if !timing_driven {
        timing_ctx = None;
    }

    let mut state = PlacerState::new(netlist, grid, placement, opts, sink);
    let mut first_crit_exponent = 0.0;
    let mut outer_crit_iter_count = 1usize;

    state.costs.bb_cost = state.comp_bb_cost();
    if timing_driven {
        first_crit_exponent = opts.td_place_exp_first;
        log::info!(
            "there are {} point-to-point connections in this circuit",
            netlist.count_connections()
        );

        let tc = timing_ctx.as_mut().expect("checked above");
        state.init_timing_costs(first_crit_exponent, tc)?;

        state.prev_inverse.timing_cost = 1.0 / state.costs.timing_cost;
        state.prev_inverse.bb_cost = 1.0 / state.costs.bb_cost;
        // The combined cost works on normalized values and is reset to 1 at
        // each temperature.
        state.costs.cost = 1.0;
    } else {
        state.costs.cost = state.costs.bb_cost;
        state.costs.timing_cost = 0.0;
    }

    state.check_place(timing_ctx.as_ref())?;
    log::info!(
        "initial placement cost: {:.6e} bb_cost: {:.6e} td_cost: {:.6e}",
        state.costs.cost,
        state.costs.bb_cost,
        state.costs.timing_cost
    );

    let num_blocks = netlist.block_count();
    let mut move_lim = match opts.effort_scaling {
        // Proportional to num_blocks^(4/3).
        EffortScaling::Circuit => {
            (sched.inner_num * (num_blocks as f64).powf(4.0 / 3.0)) as usize
        }
        // Proportional to device_size^(2/3) * num_blocks^(2/3); on
        // low-utilization devices this searches the larger space harder.
        EffortScaling::DeviceCircuit => {
            let device_size = (grid.width() * grid.height()) as f64;
            (sched.inner_num * device_size.powf(2.0 / 3.0) * (num_blocks as f64).powf(2.0 / 3.0))
                as usize
        }
    };
    // A zero move limit would divide by zero below; one move per temperature
    // is still far too few to optimize anything, but it is well-defined.
    if move_lim == 0 {
        move_lim = 1;
    }
    log::info!("moves per temperature: {move_lim}");

    let inner_recompute_limit = if opts.inner_loop_recompute_divider != 0 {
        (0.5 + move_lim as f64 / opts.inner_loop_recompute_divider as f64) as usize
    } else {
        // No inner-loop recomputes.
        move_lim + 1
    };
    let quench_recompute_limit = if opts.quench_recompute_divider != 0 {
        (0.5 + move_lim as f64 / opts.quench_recompute_divider as f64) as usize
    } else {
        move_lim + 1
    };

    let first_rlim = (grid.width().max(grid.height()) - 1) as f64;
    let first_t = state.starting_t(
        sched,
        move_lim,
        first_rlim,
        move_generator,
        timing_ctx.as_mut(),
    )?;
    let mut astate = AnnealingState::new(sched, first_t, first_rlim, move_lim, first_crit_exponent);

    let mut stats = PlacerStats::default();
    let mut tot_iter = 0usize;
    let mut num_temps = 0usize;

    print_place_status_header();

    loop {
        let temp_start = Instant::now();
        if timing_driven {
            state.costs.cost = 1.0;
        }

        state.outer_loop_recompute_criticalities(
            astate.crit_exponent,
            &mut outer_crit_iter_count,
            timing_ctx.as_mut(),
        );

        state.placement_inner_loop(
            astate.t,
            astate.rlim,
            astate.move_lim,
            astate.crit_exponent,
            inner_recompute_limit,
            &mut stats,
            move_generator,
            timing_ctx.as_mut(),
        )?;

        tot_iter += astate.move_lim;
        let (success_rat, std_dev) = stats.finalize(&state.costs, astate.move_lim);
        num_temps += 1;

        let (cpd, stns, swns) = timing_metrics(timing_ctx.as_ref());
        print_place_status(
            num_temps,
            temp_start.elapsed().as_secs_f64(),
            &astate,
            &stats,
            cpd,
            stns,
            swns,
            success_rat,
            std_dev,
            tot_iter,
        );

        if !update_annealing_state(
            &mut astate,
            success_rat,
            &state.costs,
            opts,
            sched,
            grid,
            netlist.net_count(),
        ) {
            break;
        }
    }

    // Quench: freeze out and accept only strictly improving moves.
    {
        let quench_start = Instant::now();
        state.outer_loop_recompute_criticalities(
            astate.crit_exponent,
            &mut outer_crit_iter_count,
            timing_ctx.as_mut(),
        );
        astate.t = 0.0;

        state.placement_inner_loop(
            astate.t,
            astate.rlim,
            move_lim,
            astate.crit_exponent,
            quench_recompute_limit,
            &mut stats,
            move_generator,
            timing_ctx.as_mut(),
        )?;

        tot_iter += move_lim;
        num_temps += 1;
        let (success_rat, std_dev) = stats.finalize(&state.costs, move_lim);
        let (cpd, stns, swns) = timing_metrics(timing_ctx.as_ref());
        print_place_status(
            num_temps,
            quench_start.elapsed().as_secs_f64(),
            &astate,
            &stats,
            cpd,
            stns,
            swns,
            success_rat,
            std_dev,
            tot_iter,
        );
    }

    log::info!("swaps called: {}", state.num_ts_called);
    state.check_place(timing_ctx.as_ref())?;

    let (mut cpd, mut stns, mut swns) = (f32::NAN, f32::NAN, f32::NAN);
    if let Some(tc) = timing_ctx.as_mut() {
        // Final timing estimate against the settled placement.
        state.recompute_criticalities(astate.crit_exponent, tc);
        (cpd, stns, swns) = timing_metrics(timing_ctx.as_ref());
        log::info!(
            "placement estimated critical path delay: {:.4} ns, sTNS: {:.4} ns, sWNS: {:.4} ns",
            1e9 * f64::from(cpd),
            1e9 * f64::from(stns),
            1e9 * f64::from(swns)
        );
    }

    log::info!(
        "placement cost: {:.6e}, bb_cost: {:.6e}, td_cost: {:.6e}",
        state.costs.cost,
        state.costs.bb_cost,
        state.costs.timing_cost
    );

    let total_attempts = state.swaps_accepted + state.swaps_rejected + state.swaps_aborted;
    if total_attempts > 0 {
        log::info!(
            "placement total # of swap attempts: {total_attempts} \
             (accepted {:4.1}%, rejected {:4.1}%, aborted {:4.1}%)",
            100.0 * state.swaps_accepted as f64 / total_attempts as f64,
            100.0 * state.swaps_rejected as f64 / total_attempts as f64,
            100.0 * state.swaps_aborted as f64 / total_attempts as f64,
        );
    }

    Ok(PlacementSummary {
        cost: state.costs.cost,
        bb_cost: state.costs.bb_cost,
        timing_cost: state.costs.timing_cost,
        num_temps,
        total_moves: tot_iter,
        swaps_accepted: state.swaps_accepted,
        swaps_rejected: state.swaps_rejected,
        swaps_aborted: state.swaps_aborted,
        critical_path_delay: cpd,
        total_negative_slack: stns,
        worst_negative_slack: swns,
    })
}

impl PlacerState<'_> {
    /// Finds the starting temperature (hot condition).
    ///
    /// Tries one move per block at infinite temperature (so essentially
    /// everything is accepted) and returns 20 times the standard deviation
    /// of the accepted costs, adapting the starting point to the circuit.
    fn starting_t(
        &mut self,
        sched: &AnnealingSchedule,
        max_moves: usize,
        rlim: f64,
        move_generator: &mut dyn MoveGenerator,
        mut tctx: Option<&mut TimingContext<'_>>,
    ) -> Result<f64, PlaceError> {
        if sched.kind == ScheduleKind::User {
            return Ok(sched.init_t);
        }

        let move_lim = max_moves.min(self.netlist.block_count());
        let mut num_accepted = 0usize;
        let mut av = 0.0;
        let mut sum_of_squares = 0.0;

        for _ in 0..move_lim {
            match self.try_swap(f64::INFINITY, rlim, move_generator, tctx.as_deref_mut())? {
                MoveOutcome::Accepted => {
                    num_accepted += 1;
                    av += self.costs.cost;
                    sum_of_squares += self.costs.cost * self.costs.cost;
                    self.swaps_accepted += 1;
                }
                MoveOutcome::Aborted => self.swaps_aborted += 1,
                MoveOutcome::Rejected => self.swaps_rejected += 1,
            }
        }

        if num_accepted != 0 {
            av /= num_accepted as f64;
        } else {
            av = 0.0;
        }
        let std_dev = get_std_dev(num_accepted, sum_of_squares, av);

        if num_accepted != move_lim {
            self.sink.emit(Diagnostic::warning(
                DiagnosticCode::new(Category::Placement, 1),
                format!("starting temperature: {num_accepted} of {move_lim} configurations accepted"),
            ));
        }

        Ok(20.0 * std_dev)
    }

    /// Runs one temperature's worth of swap trials.
    #[allow(clippy::too_many_arguments)]
    fn placement_inner_loop(
        &mut self,
        t: f64,
        rlim: f64,
        move_lim: usize,
        crit_exponent: f64,
        inner_recompute_limit: usize,
        stats: &mut PlacerStats,
        move_generator: &mut dyn MoveGenerator,
        mut tctx: Option<&mut TimingContext<'_>>,
    ) -> Result<(), PlaceError> {
        stats.reset();
        let mut inner_crit_iter_count = 1usize;

        for inner_iter in 0..move_lim {
            match self.try_swap(t, rlim, move_generator, tctx.as_deref_mut())? {
                MoveOutcome::Accepted => {
                    stats.record_success(&self.costs);
                    self.swaps_accepted += 1;
                }
                MoveOutcome::Aborted => self.swaps_aborted += 1,
                MoveOutcome::Rejected => self.swaps_rejected += 1,
            }

            if let Some(tc) = tctx.as_deref_mut() {
                // Timing analysis is expensive; refresh criticalities only
                // every inner_recompute_limit trials, and never on the last
                // one (the outer loop refreshes next).
                if inner_crit_iter_count >= inner_recompute_limit && inner_iter != move_lim - 1 {
                    inner_crit_iter_count = 0;
                    self.recompute_criticalities(crit_exponent, tc);
                }
                inner_crit_iter_count += 1;
            }

            // Bound accumulated round-off so incremental totals keep agreeing
            // with from-scratch recomputation.
            self.moves_since_recompute += 1;
            if self.moves_since_recompute > MAX_MOVES_BEFORE_RECOMPUTE {
                self.recompute_costs_from_scratch(tctx.as_deref_mut())?;
                self.moves_since_recompute = 0;
            }
        }
        Ok(())
    }

    /// Refreshes criticalities (and the timing-cost total) from a new STA
    /// pass, then clears the invalidation set.
    pub(crate) fn recompute_criticalities(
        &mut self,
        crit_exponent: f64,
        tc: &mut TimingContext<'_>,
    ) {
        tc.timing_info.update();
        tc.criticalities
            .update_criticalities(&*tc.timing_info, crit_exponent as f32);

        let timing = self.timing.as_mut().expect("timing-driven state");
        let total = timing.update_td_costs(self.netlist, &*tc.criticalities);
        self.costs.timing_cost = total;

        tc.invalidator.reset();
    }

    /// Computes initial connection delays and timing costs from the initial
    /// placement, after a first STA pass.
    fn init_timing_costs(
        &mut self,
        crit_exponent: f64,
        tc: &mut TimingContext<'_>,
    ) -> Result<(), PlaceError> {
        tc.timing_info.update();
        tc.criticalities
            .update_criticalities(&*tc.timing_info, crit_exponent as f32);

        let timing = self.timing.as_mut().expect("timing-driven state");
        let total =
            timing.comp_td_costs(self.netlist, self.placement, tc.delay_model, &*tc.criticalities)?;
        self.costs.timing_cost = total;

        tc.invalidator.reset();
        Ok(())
    }

    /// Once per temperature: possibly refresh criticalities, then freeze the
    /// inverse normalizers used to blend the two cost deltas.
    fn outer_loop_recompute_criticalities(
        &mut self,
        crit_exponent: f64,
        outer_crit_iter_count: &mut usize,
        tctx: Option<&mut TimingContext<'_>>,
    ) {
        let Some(tc) = tctx else {
            return;
        };

        if *outer_crit_iter_count >= self.opts.recompute_crit_iter
            || self.opts.inner_loop_recompute_divider != 0
        {
            self.recompute_criticalities(crit_exponent, tc);
            *outer_crit_iter_count = 0;
        }
        *outer_crit_iter_count += 1;

        self.prev_inverse.bb_cost = 1.0 / self.costs.bb_cost;
        self.prev_inverse.timing_cost = (1.0 / self.costs.timing_cost).min(MAX_INV_TIMING_COST);
    }

    /// Re-derives both totals from scratch and replaces the incremental
    /// values, failing if either drifted beyond tolerance.
    fn recompute_costs_from_scratch(
        &mut self,
        tctx: Option<&mut TimingContext<'_>>,
    ) -> Result<(), PlaceError> {
        let new_bb_cost = self.recompute_bb_cost();
        if (new_bb_cost - self.costs.bb_cost).abs() > self.costs.bb_cost * ERROR_TOL {
            return Err(PlaceError::CostDrift {
                kind: CostKind::BoundingBox,
                incremental: self.costs.bb_cost,
                recomputed: new_bb_cost,
                tolerance: ERROR_TOL,
            });
        }
        self.costs.bb_cost = new_bb_cost;

        if let Some(tc) = tctx {
            let timing = self.timing.as_mut().expect("timing-driven state");
            let new_timing_cost = timing.comp_td_costs(
                self.netlist,
                self.placement,
                tc.delay_model,
                &*tc.criticalities,
            )?;
            if (new_timing_cost - self.costs.timing_cost).abs()
                > self.costs.timing_cost * ERROR_TOL
            {
                return Err(PlaceError::CostDrift {
                    kind: CostKind::Timing,
                    incremental: self.costs.timing_cost,
                    recomputed: new_timing_cost,
                    tolerance: ERROR_TOL,
                });
            }
            self.costs.timing_cost = new_timing_cost;
        } else {
            self.costs.cost = self.costs.bb_cost;
        }
        Ok(())
    }
}

/// Advances the annealing state per the selected schedule.
///
/// Returns `false` when the schedule's exit criterion is met. The User
/// schedule only decays the temperature; Auto picks its decay from the
/// success rate; Dusty additionally restarts from a warmer temperature and
/// slows its decay when progress stalls, and scales the move limit to chase
/// its target success rate.
fn update_annealing_state(
    state: &mut AnnealingState,
    success_rat: f64,
    costs: &Costs,
    opts: &PlacerOpts,
    sched: &AnnealingSchedule,
    grid: &DeviceGrid,
    num_nets: usize,
) -> bool {
    if sched.kind == ScheduleKind::User {
        state.t *= sched.alpha_t;
        return state.t >= sched.exit_t;
    }

    // NaN when there are no nets; treated as an exit condition below.
    let t_exit = 0.005 * costs.cost / num_nets as f64;

    if sched.kind == ScheduleKind::Dusty {
        let restart_temp = state.t < t_exit || t_exit.is_nan();
        if success_rat < sched.success_min || restart_temp {
            if state.alpha > sched.alpha_max {
                return false;
            }
            // Take a half step back from the restart temperature and slow
            // the decay.
            state.t = state.restart_t / state.alpha.sqrt();
            state.alpha = 1.0 - (1.0 - state.alpha) * sched.alpha_decay;
        } else {
            if success_rat > sched.success_target {
                state.restart_t = state.t;
            }
            state.t *= state.alpha;
        }
        state.move_lim = ((state.move_lim_max as f64 * (sched.success_target / success_rat))
            as usize)
            .clamp(1, state.move_lim_max);
    } else {
        // Auto schedule.
        state.alpha = if success_rat > 0.96 {
            0.5
        } else if success_rat > 0.8 {
            0.9
        } else if success_rat > 0.15 || state.rlim > 1.0 {
            0.95
        } else {
            0.8
        };
        state.t *= state.alpha;

        if state.t < t_exit || t_exit.is_nan() {
            return false;
        }
    }

    update_rlim(&mut state.rlim, success_rat, grid);

    if opts.algorithm == PlaceAlgorithm::PathTimingDriven {
        // As the range limit shrinks the search localizes; focus the timing
        // cost on the most critical connections by raising the exponent.
        state.crit_exponent = (1.0 - (state.rlim - FINAL_RLIM) * state.inverse_delta_rlim)
            * (opts.td_place_exp_last - opts.td_place_exp_first)
            + opts.td_place_exp_first;
    }
    true
}

/// Scales the range limit to steer the acceptance rate toward 0.44.
fn update_rlim(rlim: &mut f64, success_rat: f64, grid: &DeviceGrid) {
    *rlim *= 1.0 - 0.44 + success_rat;
    let upper_lim = (grid.width().max(grid.height()) - 1) as f64;
    *rlim = rlim.min(upper_lim).max(FINAL_RLIM);
}

fn timing_metrics(tctx: Option<&TimingContext<'_>>) -> (f32, f32, f32) {
    match tctx {
        Some(tc) => (
            tc.timing_info.least_slack_critical_path_delay(),
            tc.timing_info.setup_total_negative_slack(),
            tc.timing_info.setup_worst_negative_slack(),
        ),
        None => (f32::NAN, f32::NAN, f32::NAN),
    }
}

fn print_place_status_header() {
    log::info!(
        "Tnum   Time       T Av Cost Av BB Cost Av TD Cost CPD(ns) sTNS(ns) sWNS(ns) \
         Ac Rate Std Dev  R lim Crit Exp Tot Moves  Alpha"
    );
}

#[allow(clippy::too_many_arguments)]
fn print_place_status(
    num_temps: usize,
    elapsed_sec: f64,
    state: &AnnealingState,
    stats: &PlacerStats,
    cpd: f32,
    stns: f32,
    swns: f32,
    acc_rate: f64,
    std_dev: f64,
    tot_moves: usize,
) {
    log::info!(
        "{:4} {:6.1} {:7.1e} {:7.3} {:10.2} {:10.4e} {:7.3} {:8.3} {:8.3} {:7.3} {:7.4} {:6.1} \
         {:8.2} {:9} {:6.3}",
        num_temps,
        elapsed_sec,
        state.t,
        stats.av_cost,
        stats.av_bb_cost,
        stats.av_timing_cost,
        1e9 * f64::from(cpd),
        1e9 * f64::from(stns),
        1e9 * f64::from(swns),
        acc_rate,
        std_dev,
        state.rlim,
        state.crit_exponent,
        tot_moves,
        state.alpha
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Netlist;
    use crate::ids::BlockId;
    use crate::loc::GridLoc;
    use crate::placement::moves::UniformMoveGenerator;
    use crate::testutil::{
        place_at, single_net_world, uniform_grid, FlatCriticalities, RecordingInvalidator,
        StubTimingInfo,
    };
    use tessera_device::{BlockTypeId, DeltaDelayModel, TileType};

    /// A 10x10 world with a handful of small nets for end-to-end runs.
    fn clustered_world() -> (Netlist, DeviceGrid, Vec<(i32, i32)>) {
        let mut nl = Netlist::new();
        let bt = BlockTypeId::from_raw(0);
        let blocks: Vec<_> = (0..12)
            .map(|i| nl.add_block(format!("b{i}"), bt, false))
            .collect();
        // A few fanout-varied nets over the 12 blocks.
        let nets: [&[usize]; 5] = [
            &[0, 1, 2],
            &[1, 3, 4, 5, 6],
            &[2, 7],
            &[5, 8, 9, 10],
            &[10, 11, 0],
        ];
        for (i, members) in nets.iter().enumerate() {
            let net = nl.add_net(format!("n{i}"), false);
            for (j, &b) in members.iter().enumerate() {
                nl.add_pin(blocks[b], net, j);
            }
        }
        let grid = uniform_grid(10, 6);
        // A scattered but legal initial placement.
        let positions: Vec<(i32, i32)> = (0..12).map(|i| (1 + (i % 4) * 2, 1 + (i / 4) * 3)).collect();
        (nl, grid, positions)
    }

    fn user_sched(init_t: f64) -> AnnealingSchedule {
        AnnealingSchedule {
            kind: ScheduleKind::User,
            init_t,
            alpha_t: 0.5,
            exit_t: init_t / 16.0,
            ..Default::default()
        }
    }

    #[test]
    fn std_dev_guards() {
        assert_eq!(get_std_dev(0, 0.0, 0.0), 0.0);
        assert_eq!(get_std_dev(1, 25.0, 5.0), 0.0);
        // Two samples 1 and 3: mean 2, variance 2.
        let sd = get_std_dev(2, 10.0, 2.0);
        assert!((sd - 2.0f64.sqrt()).abs() < 1e-12);
        // Round-off can make tiny variances negative; must clamp to zero.
        assert_eq!(get_std_dev(3, 12.0 - 1e-13, 2.0), 0.0);
    }

    #[test]
    fn user_schedule_decays_until_exit() {
        let grid = uniform_grid(8, 4);
        let opts = PlacerOpts::default();
        let sched = user_sched(8.0);
        let mut astate = AnnealingState::new(&sched, 8.0, 7.0, 100, 0.0);

        let costs = Costs {
            cost: 100.0,
            bb_cost: 100.0,
            timing_cost: 0.0,
        };
        let mut steps = 0;
        while update_annealing_state(&mut astate, 0.5, &costs, &opts, &sched, &grid, 10) {
            steps += 1;
            assert!(steps < 100, "user schedule failed to terminate");
        }
        // 8 -> 4 -> 2 -> 1 -> 0.5 < exit_t
        assert!(astate.t < sched.exit_t);
        // The User schedule leaves the range limit alone.
        assert_eq!(astate.rlim, 7.0);
    }

    #[test]
    fn auto_schedule_alpha_tracks_success_rate() {
        let grid = uniform_grid(8, 4);
        let opts = PlacerOpts::default();
        let sched = AnnealingSchedule::default();
        let costs = Costs {
            cost: 100.0,
            bb_cost: 100.0,
            timing_cost: 0.0,
        };

        let mut astate = AnnealingState::new(&sched, 1000.0, 7.0, 100, 0.0);
        assert!(update_annealing_state(&mut astate, 0.97, &costs, &opts, &sched, &grid, 10));
        assert_eq!(astate.alpha, 0.5);

        assert!(update_annealing_state(&mut astate, 0.85, &costs, &opts, &sched, &grid, 10));
        assert_eq!(astate.alpha, 0.9);

        assert!(update_annealing_state(&mut astate, 0.3, &costs, &opts, &sched, &grid, 10));
        assert_eq!(astate.alpha, 0.95);
    }

    #[test]
    fn auto_schedule_exits_at_low_temperature() {
        let grid = uniform_grid(8, 4);
        let opts = PlacerOpts::default();
        let sched = AnnealingSchedule::default();
        let costs = Costs {
            cost: 100.0,
            bb_cost: 100.0,
            timing_cost: 0.0,
        };
        // t_exit = 0.005 * 100 / 10 = 0.05; t decays below it immediately.
        let mut astate = AnnealingState::new(&sched, 0.05, 7.0, 100, 0.0);
        assert!(!update_annealing_state(&mut astate, 0.3, &costs, &opts, &sched, &grid, 10));
    }

    #[test]
    fn rlim_steers_toward_044_acceptance() {
        let grid = uniform_grid(12, 4);
        let mut rlim = 8.0;
        // High success rate grows the limit...
        update_rlim(&mut rlim, 0.9, &grid);
        assert!(rlim > 8.0);
        // ...low success rate shrinks it...
        let mut rlim2 = 8.0;
        update_rlim(&mut rlim2, 0.1, &grid);
        assert!(rlim2 < 8.0);
        // ...and it stays within [1, max(W,H)-1].
        let mut tiny = 0.4;
        update_rlim(&mut tiny, 0.0, &grid);
        assert_eq!(tiny, 1.0);
        let mut huge = 100.0;
        update_rlim(&mut huge, 1.0, &grid);
        assert_eq!(huge, 11.0);
    }

    #[test]
    fn crit_exponent_interpolates_with_rlim() {
        let grid = uniform_grid(12, 4);
        let opts = PlacerOpts {
            algorithm: PlaceAlgorithm::PathTimingDriven,
            td_place_exp_first: 1.0,
            td_place_exp_last: 8.0,
            ..Default::default()
        };
        let sched = AnnealingSchedule::default();
        let costs = Costs {
            cost: 100.0,
            bb_cost: 100.0,
            timing_cost: 1.0,
        };

        let first_rlim = 11.0;
        let mut astate = AnnealingState::new(&sched, 1000.0, first_rlim, 100, 1.0);
        // Drive the success rate low so rlim shrinks each step.
        for _ in 0..60 {
            if !update_annealing_state(&mut astate, 0.05, &costs, &opts, &sched, &grid, 10) {
                break;
            }
        }
        assert!(astate.rlim <= 1.0 + 1e-9);
        assert!((astate.crit_exponent - 8.0).abs() < 1e-6);
    }

    #[test]
    fn dusty_schedule_restarts_when_stalled() {
        let grid = uniform_grid(8, 4);
        let opts = PlacerOpts::default();
        let sched = AnnealingSchedule {
            kind: ScheduleKind::Dusty,
            ..Default::default()
        };
        let costs = Costs {
            cost: 100.0,
            bb_cost: 100.0,
            timing_cost: 0.0,
        };

        let mut astate = AnnealingState::new(&sched, 10.0, 7.0, 100, 0.0);
        let alpha_before = astate.alpha;
        // Success below success_min triggers a restart from restart_t.
        assert!(update_annealing_state(&mut astate, 0.01, &costs, &opts, &sched, &grid, 10));
        assert!((astate.t - 10.0 / alpha_before.sqrt()).abs() < 1e-9);
        assert!(astate.alpha > alpha_before);

        // Once alpha exceeds alpha_max, a stall terminates the schedule.
        astate.alpha = sched.alpha_max + 0.01;
        assert!(!update_annealing_state(&mut astate, 0.01, &costs, &opts, &sched, &grid, 10));
    }

    #[test]
    fn dusty_schedule_scales_move_limit() {
        let grid = uniform_grid(8, 4);
        let opts = PlacerOpts::default();
        let sched = AnnealingSchedule {
            kind: ScheduleKind::Dusty,
            success_target: 0.25,
            ..Default::default()
        };
        let costs = Costs {
            cost: 100.0,
            bb_cost: 100.0,
            timing_cost: 0.0,
        };

        let mut astate = AnnealingState::new(&sched, 10.0, 7.0, 100, 0.0);
        assert_eq!(astate.move_lim, 25);
        // Healthy success rate halves the move limit toward the target.
        assert!(update_annealing_state(&mut astate, 0.5, &costs, &opts, &sched, &grid, 10));
        assert_eq!(astate.move_lim, 50);
        // The limit never exceeds its maximum.
        assert!(update_annealing_state(&mut astate, 0.12, &costs, &opts, &sched, &grid, 10));
        assert_eq!(astate.move_lim, 100);
    }

    #[test]
    fn starting_t_user_schedule_is_fixed() {
        let (nl, grid, positions) = clustered_world();
        let mut pl = place_at(&nl, &grid, &positions);
        let opts = PlacerOpts::default();
        let sink = tessera_diagnostics::DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost();
        state.costs.cost = state.costs.bb_cost;

        let sched = user_sched(42.0);
        let mut gen = UniformMoveGenerator::new();
        let t = state.starting_t(&sched, 100, 9.0, &mut gen, None).unwrap();
        assert_eq!(t, 42.0);
        assert_eq!(state.num_ts_called, 0);
    }

    #[test]
    fn starting_t_accepts_nearly_everything_when_hot() {
        let (nl, grid, positions) = clustered_world();
        let mut pl = place_at(&nl, &grid, &positions);
        let opts = PlacerOpts::default();
        let sink = tessera_diagnostics::DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost();
        state.costs.cost = state.costs.bb_cost;

        let sched = AnnealingSchedule::default();
        let mut gen = UniformMoveGenerator::new();
        let t = state.starting_t(&sched, 1000, 9.0, &mut gen, None).unwrap();

        let attempts = state.swaps_accepted + state.swaps_rejected + state.swaps_aborted;
        assert_eq!(attempts, nl.block_count());
        // Rejections are impossible at infinite temperature; only aborts may
        // reduce the accept count.
        assert_eq!(state.swaps_rejected, 0);
        assert!(state.swaps_accepted * 100 >= attempts * 99);
        assert!(t >= 0.0);
    }

    #[test]
    fn quench_cost_is_monotone_nonincreasing() {
        let (nl, grid, positions) = clustered_world();
        let mut pl = place_at(&nl, &grid, &positions);
        let opts = PlacerOpts::default();
        let sink = tessera_diagnostics::DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost();
        state.costs.cost = state.costs.bb_cost;

        let mut gen = UniformMoveGenerator::new();
        let mut prev = state.costs.cost;
        for _ in 0..10_000 {
            state.try_swap(0.0, 3.0, &mut gen, None).unwrap();
            assert!(state.costs.cost <= prev);
            prev = state.costs.cost;
        }
    }

    #[test]
    fn recompute_from_scratch_accepts_consistent_costs() {
        let (nl, grid, positions) = clustered_world();
        let mut pl = place_at(&nl, &grid, &positions);
        let opts = PlacerOpts::default();
        let sink = tessera_diagnostics::DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost();
        state.costs.cost = state.costs.bb_cost;

        assert!(state.recompute_costs_from_scratch(None).is_ok());
    }

    #[test]
    fn recompute_from_scratch_flags_drift() {
        let (nl, grid, positions) = clustered_world();
        let mut pl = place_at(&nl, &grid, &positions);
        let opts = PlacerOpts::default();
        let sink = tessera_diagnostics::DiagnosticSink::new();
        let mut state = PlacerState::new(&nl, &grid, &mut pl, &opts, &sink);
        state.costs.bb_cost = state.comp_bb_cost() * 1.5;

        let err = state.recompute_costs_from_scratch(None).unwrap_err();
        assert!(matches!(
            err,
            PlaceError::CostDrift {
                kind: CostKind::BoundingBox,
                ..
            }
        ));
    }

    #[test]
    fn try_place_bounding_box_full_run() {
        let (nl, grid, positions) = clustered_world();
        let mut pl = place_at(&nl, &grid, &positions);
        let opts = PlacerOpts {
            seed: 42,
            ..Default::default()
        };
        let sched = AnnealingSchedule::default();
        let mut gen = UniformMoveGenerator::new();
        let sink = tessera_diagnostics::DiagnosticSink::new();

        let summary =
            try_place(&nl, &grid, &mut pl, &opts, &sched, &mut gen, None, &sink).unwrap();

        assert!(summary.num_temps >= 2);
        assert!(summary.total_moves > 0);
        assert!(summary.bb_cost > 0.0);
        assert!(summary.critical_path_delay.is_nan());
        assert!(!sink.has_errors());
        // The swap counters also include the starting-temperature probe
        // trials, so they cover at least every counted move.
        assert!(
            summary.swaps_accepted + summary.swaps_rejected + summary.swaps_aborted
                >= summary.total_moves
        );
    }

    #[test]
    fn try_place_is_deterministic_under_a_seed() {
        let (nl, grid, positions) = clustered_world();
        let opts = PlacerOpts {
            seed: 7,
            ..Default::default()
        };
        let sched = user_sched(1.0);

        let mut run = || {
            let mut pl = place_at(&nl, &grid, &positions);
            let mut gen = UniformMoveGenerator::new();
            let sink = tessera_diagnostics::DiagnosticSink::new();
            try_place(&nl, &grid, &mut pl, &opts, &sched, &mut gen, None, &sink).unwrap();
            serde_json::to_string(&pl).unwrap()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn try_place_trivial_two_by_two_is_stable() {
        // One 2-pin net with both blocks in the same tile of a 2x2 grid:
        // bb_cost is 0.5 and no move can change it.
        let bt = BlockTypeId::from_raw(0);
        let mut nl = Netlist::new();
        let a = nl.add_block("a", bt, false);
        let b = nl.add_block("b", bt, false);
        let n = nl.add_net("n", false);
        nl.add_pin(a, n, 0);
        nl.add_pin(b, n, 1);

        let grid = DeviceGrid::uniform(2, 2, 4, TileType::uniform("clb", bt, 2, 4));
        let mut pl = crate::loc::Placement::new(&nl, &grid);
        pl.place_block(a, GridLoc::new(1, 1, 0));
        pl.place_block(b, GridLoc::new(1, 1, 1));

        let opts = PlacerOpts::default();
        let sched = AnnealingSchedule {
            inner_num: 50.0,
            ..user_sched(10.0)
        };
        let mut gen = UniformMoveGenerator::new();
        let sink = tessera_diagnostics::DiagnosticSink::new();

        let summary =
            try_place(&nl, &grid, &mut pl, &opts, &sched, &mut gen, None, &sink).unwrap();
        assert!((summary.bb_cost - 0.5).abs() < 1e-9);
        assert!(summary.total_moves >= 100);
    }

    #[test]
    fn try_place_timing_driven_full_run() {
        let (nl, grid, positions) = clustered_world();
        let mut pl = place_at(&nl, &grid, &positions);
        let opts = PlacerOpts {
            algorithm: PlaceAlgorithm::PathTimingDriven,
            seed: 11,
            ..Default::default()
        };
        let sched = AnnealingSchedule::default();
        let mut gen = UniformMoveGenerator::new();
        let sink = tessera_diagnostics::DiagnosticSink::new();

        let model = DeltaDelayModel::linear(10, 10, 1e-10);
        let mut timing_info = StubTimingInfo::new();
        let mut crits = FlatCriticalities::new(&nl, 0.6);
        let mut invalidator = RecordingInvalidator::default();
        let tc = TimingContext {
            delay_model: &model,
            timing_info: &mut timing_info,
            criticalities: &mut crits,
            invalidator: &mut invalidator,
        };

        let summary =
            try_place(&nl, &grid, &mut pl, &opts, &sched, &mut gen, Some(tc), &sink).unwrap();

        assert!(summary.timing_cost > 0.0);
        assert!(!summary.critical_path_delay.is_nan());
        assert!(!sink.has_errors());
        // The analyzer was re-run at least at init, per temperature, and for
        // the final estimate.
        assert!(timing_info.updates >= 3);
        assert!(invalidator.resets >= 3);
    }

    #[test]
    fn try_place_timing_driven_requires_context() {
        let (nl, grid, positions) = clustered_world();
        let mut pl = place_at(&nl, &grid, &positions);
        let opts = PlacerOpts {
            algorithm: PlaceAlgorithm::PathTimingDriven,
            ..Default::default()
        };
        let sched = AnnealingSchedule::default();
        let mut gen = UniformMoveGenerator::new();
        let sink = tessera_diagnostics::DiagnosticSink::new();

        let err = try_place(&nl, &grid, &mut pl, &opts, &sched, &mut gen, None, &sink)
            .unwrap_err();
        assert!(matches!(err, PlaceError::InvalidOption { .. }));
    }

    #[test]
    fn try_place_rejects_invalid_options() {
        let (nl, grid, positions) = clustered_world();
        let mut pl = place_at(&nl, &grid, &positions);
        let opts = PlacerOpts {
            timing_tradeoff: 3.0,
            ..Default::default()
        };
        let sched = AnnealingSchedule::default();
        let mut gen = UniformMoveGenerator::new();
        let sink = tessera_diagnostics::DiagnosticSink::new();

        let err = try_place(&nl, &grid, &mut pl, &opts, &sched, &mut gen, None, &sink)
            .unwrap_err();
        assert!(matches!(err, PlaceError::InvalidOption { .. }));
    }
}
