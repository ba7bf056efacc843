//! Device model for the Tessera FPGA placement engine.
//!
//! This crate describes the physical surface the placer optimizes over: the
//! [`DeviceGrid`] of tile positions with per-channel routing capacities, the
//! [`TileType`] descriptions (sub-tile capacity, logical-type compatibility,
//! pin geometry), and the [`DelayModel`] contract used for timing-driven
//! placement, with the standard delta-lookup implementation
//! [`DeltaDelayModel`].

#![warn(missing_docs)]

pub mod delay;
pub mod grid;
pub mod ids;
pub mod tiles;

pub use delay::{DelayModel, DeltaDelayModel};
pub use grid::DeviceGrid;
pub use ids::{BlockTypeId, TileTypeId};
pub use tiles::{SubTile, TileType};
