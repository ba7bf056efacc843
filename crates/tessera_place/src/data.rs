//! Core placement netlist data structures.
//!
//! Defines the clustered netlist the placer optimizes: blocks (with a logical
//! type and a fixed flag), nets (an ordered pin list whose first entry is the
//! driver), and pins (block connections to nets, with the physical tile pin
//! they map to). The [`Netlist`] is immutable during annealing; only block
//! locations change.

use crate::ids::{BlockId, NetId, PinId};
use serde::{Deserialize, Serialize};
use tessera_device::BlockTypeId;

/// The clustered netlist for placement.
///
/// Contains all blocks, nets, and pins in the design after clustering. A
/// net's pin 0 is its driver; sink pins are addressed by their 1-based index
/// within the net. Nets marked ignored (globals, clocks) contribute no cost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netlist {
    blocks: Vec<Block>,
    nets: Vec<Net>,
    pins: Vec<Pin>,
}

/// Whether a pin drives its net or is driven by it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PinKind {
    /// The pin sources the net (pin index 0).
    Driver,
    /// The pin is a destination of the net (pin index >= 1).
    Sink,
}

/// A logic block in the placement netlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// The unique ID of this block.
    pub id: BlockId,
    /// Human-readable block name (e.g., "clb_12", "io_pad_3").
    pub name: String,
    /// The logical type of this block, constraining legal tile positions.
    pub block_type: BlockTypeId,
    /// All pins on this block, in physical pin order.
    pub pins: Vec<PinId>,
    /// Whether this block's location is fixed (e.g., constrained I/O pads).
    pub is_fixed: bool,
}

/// A net in the placement netlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    /// The unique ID of this net.
    pub id: NetId,
    /// Human-readable net name.
    pub name: String,
    /// All pins on this net; index 0 is the driver, the rest are sinks.
    pub pins: Vec<PinId>,
    /// Whether this net is excluded from cost computation (globals, clocks).
    pub is_ignored: bool,
}

/// A pin connecting a block to a net.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    /// The unique ID of this pin.
    pub id: PinId,
    /// The block that owns this pin.
    pub block: BlockId,
    /// The net this pin belongs to.
    pub net: NetId,
    /// This pin's index within its net (0 = driver).
    pub net_index: usize,
    /// The physical pin number on the block's tile, for pin-offset lookup.
    pub tile_pin: usize,
}

impl Netlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a block and returns its ID.
    pub fn add_block(
        &mut self,
        name: impl Into<String>,
        block_type: BlockTypeId,
        is_fixed: bool,
    ) -> BlockId {
        let id = BlockId::from_raw(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            name: name.into(),
            block_type,
            pins: Vec::new(),
            is_fixed,
        });
        id
    }

    /// Adds a net and returns its ID.
    pub fn add_net(&mut self, name: impl Into<String>, is_ignored: bool) -> NetId {
        let id = NetId::from_raw(self.nets.len() as u32);
        self.nets.push(Net {
            id,
            name: name.into(),
            pins: Vec::new(),
            is_ignored,
        });
        id
    }

    /// Connects `block` to `net` through a new pin and returns the pin's ID.
    ///
    /// The first pin added to a net becomes its driver; later pins are sinks
    /// in order of addition. `tile_pin` is the physical pin number used for
    /// pin-offset lookup on the block's tile.
    pub fn add_pin(&mut self, block: BlockId, net: NetId, tile_pin: usize) -> PinId {
        let id = PinId::from_raw(self.pins.len() as u32);
        let net_index = self.nets[net.as_raw() as usize].pins.len();
        self.pins.push(Pin {
            id,
            block,
            net,
            net_index,
            tile_pin,
        });
        self.nets[net.as_raw() as usize].pins.push(id);
        self.blocks[block.as_raw() as usize].pins.push(id);
        id
    }

    /// Returns the block with the given ID.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.as_raw() as usize]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.as_raw() as usize]
    }

    /// Returns the pin with the given ID.
    pub fn pin(&self, id: PinId) -> &Pin {
        &self.pins[id.as_raw() as usize]
    }

    /// Returns the number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Returns the number of pins.
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Iterates over all block IDs.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId::from_raw)
    }

    /// Iterates over all net IDs.
    pub fn net_ids(&self) -> impl Iterator<Item = NetId> {
        (0..self.nets.len() as u32).map(NetId::from_raw)
    }

    /// Returns all pins on the given block.
    pub fn block_pins(&self, block: BlockId) -> &[PinId] {
        &self.blocks[block.as_raw() as usize].pins
    }

    /// Returns the logical type of the given block.
    pub fn block_type(&self, block: BlockId) -> BlockTypeId {
        self.blocks[block.as_raw() as usize].block_type
    }

    /// Returns all pins on the given net (driver first).
    pub fn net_pins(&self, net: NetId) -> &[PinId] {
        &self.nets[net.as_raw() as usize].pins
    }

    /// Returns the sink pins of the given net.
    pub fn net_sinks(&self, net: NetId) -> &[PinId] {
        &self.nets[net.as_raw() as usize].pins[1..]
    }

    /// Returns the number of sinks on the given net.
    pub fn num_sinks(&self, net: NetId) -> usize {
        self.nets[net.as_raw() as usize].pins.len() - 1
    }

    /// Returns the driver pin of the given net.
    pub fn net_driver(&self, net: NetId) -> PinId {
        self.nets[net.as_raw() as usize].pins[0]
    }

    /// Returns the block driving the given net.
    pub fn net_driver_block(&self, net: NetId) -> BlockId {
        self.pin(self.net_driver(net)).block
    }

    /// Returns whether the given net is excluded from cost computation.
    pub fn net_is_ignored(&self, net: NetId) -> bool {
        self.nets[net.as_raw() as usize].is_ignored
    }

    /// Returns the net the given pin belongs to.
    pub fn pin_net(&self, pin: PinId) -> NetId {
        self.pins[pin.as_raw() as usize].net
    }

    /// Returns the block owning the given pin.
    pub fn pin_block(&self, pin: PinId) -> BlockId {
        self.pins[pin.as_raw() as usize].block
    }

    /// Returns whether the given pin drives or sinks its net.
    pub fn pin_kind(&self, pin: PinId) -> PinKind {
        if self.pins[pin.as_raw() as usize].net_index == 0 {
            PinKind::Driver
        } else {
            PinKind::Sink
        }
    }

    /// Returns the given pin's index within its net (0 = driver).
    pub fn pin_net_index(&self, pin: PinId) -> usize {
        self.pins[pin.as_raw() as usize].net_index
    }

    /// Counts the point-to-point connections on non-ignored nets.
    pub fn count_connections(&self) -> usize {
        self.nets
            .iter()
            .filter(|n| !n.is_ignored)
            .map(|n| n.pins.len() - 1)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block_netlist() -> Netlist {
        let mut nl = Netlist::new();
        let bt = BlockTypeId::from_raw(0);
        let b0 = nl.add_block("clb_0", bt, false);
        let b1 = nl.add_block("clb_1", bt, false);
        let n = nl.add_net("net_0", false);
        nl.add_pin(b0, n, 0);
        nl.add_pin(b1, n, 1);
        nl
    }

    #[test]
    fn empty_netlist() {
        let nl = Netlist::new();
        assert_eq!(nl.block_count(), 0);
        assert_eq!(nl.net_count(), 0);
        assert_eq!(nl.pin_count(), 0);
        assert_eq!(nl.count_connections(), 0);
    }

    #[test]
    fn driver_and_sink_ordering() {
        let nl = two_block_netlist();
        let n = NetId::from_raw(0);
        assert_eq!(nl.net_pins(n).len(), 2);
        assert_eq!(nl.net_sinks(n).len(), 1);
        assert_eq!(nl.num_sinks(n), 1);

        let driver = nl.net_driver(n);
        assert_eq!(nl.pin_kind(driver), PinKind::Driver);
        assert_eq!(nl.pin_net_index(driver), 0);
        assert_eq!(nl.net_driver_block(n), BlockId::from_raw(0));

        let sink = nl.net_sinks(n)[0];
        assert_eq!(nl.pin_kind(sink), PinKind::Sink);
        assert_eq!(nl.pin_net_index(sink), 1);
        assert_eq!(nl.pin_block(sink), BlockId::from_raw(1));
    }

    #[test]
    fn block_pins_recorded() {
        let nl = two_block_netlist();
        assert_eq!(nl.block_pins(BlockId::from_raw(0)).len(), 1);
        assert_eq!(nl.block_pins(BlockId::from_raw(1)).len(), 1);
        assert_eq!(nl.pin(nl.block_pins(BlockId::from_raw(1))[0]).tile_pin, 1);
    }

    #[test]
    fn ignored_nets_excluded_from_connections() {
        let mut nl = two_block_netlist();
        let clk = nl.add_net("clk", true);
        nl.add_pin(BlockId::from_raw(0), clk, 2);
        nl.add_pin(BlockId::from_raw(1), clk, 3);

        assert!(nl.net_is_ignored(clk));
        assert!(!nl.net_is_ignored(NetId::from_raw(0)));
        assert_eq!(nl.count_connections(), 1);
    }

    #[test]
    fn multi_sink_connections() {
        let mut nl = Netlist::new();
        let bt = BlockTypeId::from_raw(0);
        let src = nl.add_block("src", bt, false);
        let n = nl.add_net("fanout", false);
        nl.add_pin(src, n, 0);
        for i in 0..4 {
            let b = nl.add_block(format!("dst_{i}"), bt, false);
            nl.add_pin(b, n, 1);
        }
        assert_eq!(nl.num_sinks(n), 4);
        assert_eq!(nl.count_connections(), 4);
    }

    #[test]
    fn fixed_flag() {
        let mut nl = Netlist::new();
        let io = nl.add_block("pad", BlockTypeId::from_raw(1), true);
        assert!(nl.block(io).is_fixed);
    }

    #[test]
    fn id_iterators() {
        let nl = two_block_netlist();
        assert_eq!(nl.block_ids().count(), 2);
        assert_eq!(nl.net_ids().count(), 1);
    }

    #[test]
    fn serde_roundtrip() {
        let nl = two_block_netlist();
        let json = serde_json::to_string(&nl).unwrap();
        let restored: Netlist = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.block_count(), 2);
        assert_eq!(restored.net_count(), 1);
        assert_eq!(restored.net_sinks(NetId::from_raw(0)).len(), 1);
    }
}
