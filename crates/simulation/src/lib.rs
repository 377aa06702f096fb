//! Deterministic, headless procedural-city simulation engine.
//!
//! The crate is a pure-functional pipeline over a single authoritative
//! [`grid::World`] value: the procedural generator builds it, the daily
//! [`sim::Simulator`] advances it, and the analysis passes (traffic, goods,
//! land value, services, districts) derive transient results from it.
//! Everything is reproducible bit-for-bit from a single `u64` seed.

pub mod autobuild;
pub mod config;
pub mod districts;
pub mod goods;
pub mod grid;
pub mod hash;
pub mod land_value;
pub mod pathfind;
pub mod procgen;
pub mod rng;
pub mod services;
pub mod sim;
pub mod stats;
pub mod traffic;

pub use config::{DistrictPolicy, SimConfig};
pub use grid::{Overlay, Terrain, Tile, Tool, ToolApplyResult, World};
pub use hash::hash_world;
pub use procgen::{generate_world, ProcGenConfig};
pub use sim::Simulator;
pub use stats::Stats;
