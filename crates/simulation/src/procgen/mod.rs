//! Deterministic procedural world synthesis.
//!
//! `generate_world` is a fixed pipeline; the stage order is part of the
//! contract because reordering it changes world hashes:
//!
//! 1. height field (value noise + terrain preset mask)
//! 2. erosion (thermal transport, D8 rivers, smoothing)
//! 3. height quantization
//! 4. terrain assignment from water/sand thresholds
//! 5. road skeleton (hubs + MST, or a layout override) and hierarchy
//! 6. zone/park seeding
//! 7. district assignment
//! 8. road connection masks

mod districting;
mod erosion;
mod heightfield;
mod roads;
mod zoning;

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::grid::{Terrain, World};
use crate::rng::{hash_coords_32, seed_mix32};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, Default,
)]
pub enum TerrainPreset {
    #[default]
    Classic,
    Island,
    Archipelago,
    InlandSea,
    RiverValley,
    MountainRing,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, Default,
)]
pub enum RoadLayout {
    #[default]
    Organic,
    Grid,
    Radial,
    SpaceColonization,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, Default,
)]
pub enum DistrictingMode {
    #[default]
    Voronoi,
    RoadFlow,
    BlockGraph,
}

/// Erosion stage tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ErosionConfig {
    pub enabled: bool,
    pub rivers_enabled: bool,

    pub thermal_iterations: i32,
    /// Minimum slope before material moves.
    pub thermal_talus: f32,
    /// Fraction of the excess slope exchanged per pass.
    pub thermal_rate: f32,

    /// Tiles with at least this much D8 flow accumulation carve a river bed.
    pub river_min_accum: i32,
    pub river_carve: f32,
    pub river_carve_power: f32,

    pub smooth_iterations: i32,
    pub smooth_rate: f32,

    /// Heights snap to 1/quantize_scale steps so floating-point drift can
    /// never leak into hashes.
    pub quantize_scale: i32,
}

impl Default for ErosionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rivers_enabled: true,
            thermal_iterations: 12,
            thermal_talus: 0.012,
            thermal_rate: 0.18,
            river_min_accum: 48,
            river_carve: 0.035,
            river_carve_power: 0.45,
            smooth_iterations: 2,
            smooth_rate: 0.5,
            quantize_scale: 4096,
        }
    }
}

/// World generator tuning. All fields are deterministic inputs; the same
/// `(w, h, seed, config)` always yields the same world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ProcGenConfig {
    /// Noise frequency; larger values produce busier terrain.
    pub terrain_scale: f32,
    pub water_level: f32,
    pub sand_level: f32,

    pub terrain_preset: TerrainPreset,
    /// Blend strength for the preset mask, 0..=5.
    pub terrain_preset_strength: f32,

    pub erosion: ErosionConfig,

    /// Road skeleton hubs placed on land.
    pub hubs: i32,
    /// Extra (non-MST) hub connections.
    pub extra_connections: i32,

    pub road_layout: RoadLayout,
    pub road_hierarchy_enabled: bool,
    /// 0..=3; scales how much of the network gets upgraded to higher classes.
    pub road_hierarchy_strength: f32,

    /// Chance that an eligible road-adjacent tile is seeded as a zone.
    pub zone_chance: f32,
    pub park_chance: f32,

    pub districting_mode: DistrictingMode,
}

impl Default for ProcGenConfig {
    fn default() -> Self {
        Self {
            terrain_scale: 0.02,
            water_level: 0.32,
            sand_level: 0.38,
            terrain_preset: TerrainPreset::Classic,
            terrain_preset_strength: 1.0,
            erosion: ErosionConfig::default(),
            hubs: 4,
            extra_connections: 1,
            road_layout: RoadLayout::Organic,
            road_hierarchy_enabled: true,
            road_hierarchy_strength: 1.0,
            zone_chance: 0.28,
            park_chance: 0.04,
            districting_mode: DistrictingMode::Voronoi,
        }
    }
}

// Per-tile hash salts for the independent generator rolls.
const SALT_VARIATION: u32 = 0x5641_5249; // "VARI"
pub(crate) const SALT_ZONE_ROLL: u32 = 0x5A4F_4E45; // "ZONE"
pub(crate) const SALT_ZONE_KIND: u32 = 0x4B49_4E44; // "KIND"
pub(crate) const SALT_PARK_ROLL: u32 = 0x5041_524B; // "PARK"

/// Generate a world from scratch. Pure and deterministic; degenerate inputs
/// (zero-sized maps, extreme parameters) still produce a valid world.
pub fn generate_world(w: i32, h: i32, seed: u64, cfg: &ProcGenConfig) -> World {
    let mut world = World::new(w, h, seed);
    let (w, h) = (world.width(), world.height());
    if w == 0 || h == 0 {
        return world;
    }

    // 1-2. Height field and erosion.
    let mut heights = heightfield::generate(w, h, seed, cfg);
    if cfg.erosion.enabled {
        erosion::thermal(&mut heights, w, h, &cfg.erosion);
        if cfg.erosion.rivers_enabled {
            erosion::carve_rivers(&mut heights, w, h, &cfg.erosion);
        }
        erosion::smooth(&mut heights, w, h, &cfg.erosion);
    }

    // 3. Quantize so later float math can never drift hashes.
    erosion::quantize(&mut heights, cfg.erosion.quantize_scale);

    // 4. Terrain thresholds + stable per-tile variation bits.
    let mix = seed_mix32(seed);
    for y in 0..h {
        for x in 0..w {
            let idx = world.idx(x, y);
            let height = heights[idx];
            let t = world.at_mut(x, y);
            t.height = height;
            t.terrain = if height < cfg.water_level {
                Terrain::Water
            } else if height < cfg.sand_level {
                Terrain::Sand
            } else {
                Terrain::Grass
            };
            t.variation = (hash_coords_32(x, y, mix ^ SALT_VARIATION) & 0xFF) as u8;
        }
    }

    // 5. Road skeleton and hierarchy.
    roads::build_road_network(&mut world, cfg);

    // 6. Zones and parks.
    zoning::seed_zones(&mut world, cfg);

    // 7. Districts.
    districting::assign_districts(&mut world, cfg);

    // 8. Connection masks, then make the stats snapshot coherent.
    world.recompute_road_masks();
    world.recount_static_stats();
    world
}
