//! Shared fixtures and collaborator test doubles for engine tests.

use crate::data::Netlist;
use crate::ids::{NetId, PinId};
use crate::loc::{GridLoc, Placement};
use crate::sta::{CriticalityProvider, SetupTimingInfo, TimingInvalidator};
use tessera_device::{BlockTypeId, DeviceGrid, TileType};

/// A square grid of single-capacity logic tiles with uniform channel widths.
pub(crate) fn uniform_grid(size: usize, chan: i32) -> DeviceGrid {
    DeviceGrid::uniform(
        size,
        size,
        chan,
        TileType::uniform("clb", BlockTypeId::from_raw(0), 1, 16),
    )
}

/// One block per entry of `positions`, all on a single net driven by the
/// first block, over a `size x size` grid with width-4 channels.
pub(crate) fn single_net_world(size: usize, positions: &[(i32, i32)]) -> (Netlist, DeviceGrid) {
    let mut nl = Netlist::new();
    let bt = BlockTypeId::from_raw(0);
    let net = nl.add_net("n0", false);
    for i in 0..positions.len() {
        let b = nl.add_block(format!("b{i}"), bt, false);
        nl.add_pin(b, net, 0);
    }
    (nl, uniform_grid(size, 4))
}

/// Places block `i` at `positions[i]` (sub-tile 0) on both maps.
pub(crate) fn place_at(netlist: &Netlist, grid: &DeviceGrid, positions: &[(i32, i32)]) -> Placement {
    let mut pl = Placement::new(netlist, grid);
    for (i, &(x, y)) in positions.iter().enumerate() {
        pl.place_block(crate::ids::BlockId::from_raw(i as u32), GridLoc::new(x, y, 0));
    }
    pl
}

/// A timing analyzer stub reporting fixed path metrics.
pub(crate) struct StubTimingInfo {
    pub cpd: f32,
    pub stns: f32,
    pub swns: f32,
    pub updates: usize,
}

impl StubTimingInfo {
    pub(crate) fn new() -> Self {
        Self {
            cpd: 1e-9,
            stns: 0.0,
            swns: 0.0,
            updates: 0,
        }
    }
}

impl SetupTimingInfo for StubTimingInfo {
    fn update(&mut self) {
        self.updates += 1;
    }

    fn least_slack_critical_path_delay(&self) -> f32 {
        self.cpd
    }

    fn setup_total_negative_slack(&self) -> f32 {
        self.stns
    }

    fn setup_worst_negative_slack(&self) -> f32 {
        self.swns
    }
}

/// A criticality provider returning one flat value for every connection.
///
/// Reports every sink pin as modified whenever the flat value changes
/// (including the first refresh), mirroring how a real provider surfaces the
/// changed-pin set after each analysis.
pub(crate) struct FlatCriticalities {
    current: f32,
    /// The value the next `update_criticalities` call switches to.
    pub pending: f32,
    all_sinks: Vec<PinId>,
    modified: Vec<PinId>,
    updates: usize,
}

impl FlatCriticalities {
    pub(crate) fn new(netlist: &Netlist, value: f32) -> Self {
        let all_sinks = netlist
            .net_ids()
            .flat_map(|n| netlist.net_sinks(n).to_vec())
            .collect();
        Self {
            current: value,
            pending: value,
            all_sinks,
            modified: Vec::new(),
            updates: 0,
        }
    }
}

impl CriticalityProvider for FlatCriticalities {
    fn update_criticalities(&mut self, _timing_info: &dyn SetupTimingInfo, _crit_exponent: f32) {
        let changed = self.updates == 0 || self.pending != self.current;
        self.current = self.pending;
        self.updates += 1;
        if changed {
            self.modified = self.all_sinks.clone();
        } else {
            self.modified.clear();
        }
    }

    fn criticality(&self, _net: NetId, _sink: usize) -> f32 {
        self.current
    }

    fn pins_with_modified_criticality(&self) -> &[PinId] {
        &self.modified
    }
}

/// An invalidator that records every notification it receives.
#[derive(Default)]
pub(crate) struct RecordingInvalidator {
    pub invalidated: Vec<PinId>,
    pub resets: usize,
}

impl TimingInvalidator for RecordingInvalidator {
    fn invalidate_connection(&mut self, pin: PinId) {
        self.invalidated.push(pin);
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}
