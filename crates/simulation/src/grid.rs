use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::stats::Stats;

/// Size in bytes of the canonical little-endian tile record used by world
/// hashing and the save formats.
pub const TILE_RECORD_SIZE: usize = 11;

/// Number of administrative districts.
pub const DISTRICT_COUNT: usize = 8;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, Default,
)]
pub enum Terrain {
    Water,
    Sand,
    #[default]
    Grass,
}

impl Terrain {
    pub fn as_u8(self) -> u8 {
        match self {
            Terrain::Water => 0,
            Terrain::Sand => 1,
            Terrain::Grass => 2,
        }
    }

    pub fn from_u8(v: u8) -> Option<Terrain> {
        match v {
            0 => Some(Terrain::Water),
            1 => Some(Terrain::Sand),
            2 => Some(Terrain::Grass),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Terrain::Water => "Water",
            Terrain::Sand => "Sand",
            Terrain::Grass => "Grass",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, Default,
)]
pub enum Overlay {
    #[default]
    None,
    Road,
    Residential,
    Commercial,
    Industrial,
    Park,
    School,
    Hospital,
    PoliceStation,
    FireStation,
}

impl Overlay {
    pub fn as_u8(self) -> u8 {
        match self {
            Overlay::None => 0,
            Overlay::Road => 1,
            Overlay::Residential => 2,
            Overlay::Commercial => 3,
            Overlay::Industrial => 4,
            Overlay::Park => 5,
            Overlay::School => 6,
            Overlay::Hospital => 7,
            Overlay::PoliceStation => 8,
            Overlay::FireStation => 9,
        }
    }

    pub fn from_u8(v: u8) -> Option<Overlay> {
        match v {
            0 => Some(Overlay::None),
            1 => Some(Overlay::Road),
            2 => Some(Overlay::Residential),
            3 => Some(Overlay::Commercial),
            4 => Some(Overlay::Industrial),
            5 => Some(Overlay::Park),
            6 => Some(Overlay::School),
            7 => Some(Overlay::Hospital),
            8 => Some(Overlay::PoliceStation),
            9 => Some(Overlay::FireStation),
            _ => None,
        }
    }

    pub fn is_zone(self) -> bool {
        matches!(
            self,
            Overlay::Residential | Overlay::Commercial | Overlay::Industrial
        )
    }

    pub fn is_civic(self) -> bool {
        matches!(
            self,
            Overlay::School | Overlay::Hospital | Overlay::PoliceStation | Overlay::FireStation
        )
    }

    /// Zones and civic buildings both require an adjacent road at placement.
    pub fn needs_road_access(self) -> bool {
        self.is_zone() || self.is_civic()
    }

    /// Occupant capacity for a building of this overlay at the given level.
    ///
    /// Commercial (8/level) and industrial (12/level) mirror the goods-flow
    /// bases; the remaining overlays sit on the same scale.
    pub fn capacity(self, level: u8) -> u16 {
        let l = u16::from(level.clamp(1, MAX_LEVEL));
        match self {
            Overlay::Residential => 10 * l,
            Overlay::Commercial => 8 * l,
            Overlay::Industrial => 12 * l,
            Overlay::School => 6 * l,
            Overlay::Hospital => 10 * l,
            Overlay::PoliceStation | Overlay::FireStation => 8 * l,
            _ => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Overlay::None => "None",
            Overlay::Road => "Road",
            Overlay::Residential => "Residential",
            Overlay::Commercial => "Commercial",
            Overlay::Industrial => "Industrial",
            Overlay::Park => "Park",
            Overlay::School => "School",
            Overlay::Hospital => "Hospital",
            Overlay::PoliceStation => "PoliceStation",
            Overlay::FireStation => "FireStation",
        }
    }
}

/// Player/bot edit tools. `apply_tool` maps these onto overlay edits with
/// cost and placement checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tool {
    Inspect,
    Road,
    Residential,
    Commercial,
    Industrial,
    Park,
    School,
    Hospital,
    PoliceStation,
    FireStation,
    Bulldoze,
}

impl Tool {
    /// The overlay this tool places, if any.
    pub fn overlay(self) -> Option<Overlay> {
        match self {
            Tool::Road => Some(Overlay::Road),
            Tool::Residential => Some(Overlay::Residential),
            Tool::Commercial => Some(Overlay::Commercial),
            Tool::Industrial => Some(Overlay::Industrial),
            Tool::Park => Some(Overlay::Park),
            Tool::School => Some(Overlay::School),
            Tool::Hospital => Some(Overlay::Hospital),
            Tool::PoliceStation => Some(Overlay::PoliceStation),
            Tool::FireStation => Some(Overlay::FireStation),
            Tool::Inspect | Tool::Bulldoze => None,
        }
    }
}

/// Outcome of an edit operation. Refusals are normal business results, not
/// errors; the caller decides how to surface them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolApplyResult {
    Applied,
    Noop,
    OutOfBounds,
    BlockedWater,
    BlockedNoRoad,
    BlockedOccupied,
    InsufficientFunds,
}

/// Maximum building/road level.
pub const MAX_LEVEL: u8 = 3;

/// Road class derived from a road tile's `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadLevel {
    Street,
    Avenue,
    Highway,
}

impl RoadLevel {
    pub fn from_level(level: u8) -> RoadLevel {
        match level {
            0 | 1 => RoadLevel::Street,
            2 => RoadLevel::Avenue,
            _ => RoadLevel::Highway,
        }
    }

    /// Travel time per road step in milli-units; a street step is 1000.
    pub fn milli_per_step(self) -> i32 {
        match self {
            RoadLevel::Street => 1000,
            RoadLevel::Avenue => 700,
            RoadLevel::Highway => 500,
        }
    }

    /// Multiplier applied to the base per-tile capacity.
    pub fn capacity_multiplier(self) -> i32 {
        match self {
            RoadLevel::Street => 1,
            RoadLevel::Avenue => 2,
            RoadLevel::Highway => 4,
        }
    }

    /// How strongly traffic on this road spills into adjacent land value.
    /// Higher classes contain their flow better.
    pub fn traffic_spill_multiplier(self) -> f32 {
        match self {
            RoadLevel::Street => 1.0,
            RoadLevel::Avenue => 0.6,
            RoadLevel::Highway => 0.35,
        }
    }
}

/// Capacity of one road tile at `level`, from the soft base capacity.
pub fn road_capacity_for_level(base_capacity: i32, level: u8) -> i32 {
    base_capacity * RoadLevel::from_level(level).capacity_multiplier()
}

pub fn clamp_road_level(level: i32) -> u8 {
    level.clamp(1, i32::from(MAX_LEVEL)) as u8
}

// Tool costs.
const COST_ROAD_PER_LEVEL: i64 = 1;
const COST_PARK: i64 = 3;
const COST_ZONE: i64 = 5;
const COST_CIVIC: i64 = 12;

/// One cell of the world grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub overlay: Overlay,

    /// Normalized elevation in [0, 1].
    pub height: f32,

    /// Stable per-tile random bits for shading/variation. When
    /// `overlay == Road`, the low 4 bits store the N/E/S/W road-connection
    /// mask (bit 0 = N, 1 = E, 2 = S, 3 = W) used for auto-tiling and
    /// traversability checks.
    pub variation: u8,

    /// 1..=3: building intensity for zones/civic, road class for roads.
    pub level: u8,

    /// Residents for Residential, workers for job and civic overlays.
    pub occupants: u16,

    /// Administrative district id, 0..=7.
    pub district: u8,
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            terrain: Terrain::Grass,
            overlay: Overlay::None,
            height: 0.0,
            variation: 0,
            level: 1,
            occupants: 0,
            district: 0,
        }
    }
}

impl Tile {
    /// Canonical little-endian record, shared by hashing and the save codec.
    pub fn to_bytes(&self) -> [u8; TILE_RECORD_SIZE] {
        let mut b = [0u8; TILE_RECORD_SIZE];
        b[0] = self.terrain.as_u8();
        b[1] = self.overlay.as_u8();
        b[2..6].copy_from_slice(&self.height.to_le_bytes());
        b[6] = self.variation;
        b[7] = self.level;
        b[8..10].copy_from_slice(&self.occupants.to_le_bytes());
        b[10] = self.district;
        b
    }

    /// Decode a canonical record. Returns None on out-of-range enum bytes.
    pub fn from_bytes(b: &[u8; TILE_RECORD_SIZE]) -> Option<Tile> {
        Some(Tile {
            terrain: Terrain::from_u8(b[0])?,
            overlay: Overlay::from_u8(b[1])?,
            height: f32::from_le_bytes([b[2], b[3], b[4], b[5]]),
            variation: b[6],
            level: b[7],
            occupants: u16::from_le_bytes([b[8], b[9]]),
            district: b[10],
        })
    }
}

/// Cardinal neighbor offsets in the engine-wide expansion order N, E, S, W.
pub const DIRS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// The authoritative world state: a width x height tile grid plus stats.
///
/// The world exclusively owns its tiles. Analysis results (traffic, goods,
/// land value, ...) are transient values produced by pure functions and are
/// never stored back into the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    w: i32,
    h: i32,
    seed: u64,
    tiles: Vec<Tile>,
    stats: Stats,
}

impl World {
    pub fn new(w: i32, h: i32, seed: u64) -> Self {
        let w = w.max(0);
        let h = h.max(0);
        Self {
            w,
            h,
            seed,
            tiles: vec![Tile::default(); (w as usize) * (h as usize)],
            stats: Stats::default(),
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.h
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.w && y < self.h
    }

    #[inline]
    pub fn idx(&self, x: i32, y: i32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    #[inline]
    pub fn at(&self, x: i32, y: i32) -> &Tile {
        &self.tiles[self.idx(x, y)]
    }

    #[inline]
    pub fn at_mut(&mut self, x: i32, y: i32) -> &mut Tile {
        let i = self.idx(x, y);
        &mut self.tiles[i]
    }

    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    #[inline]
    pub fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    #[inline]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    #[inline]
    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    /// Terrain permits building (not water).
    pub fn is_buildable(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y) && self.at(x, y).terrain != Terrain::Water
    }

    /// Buildable and currently empty.
    pub fn is_empty_land(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let t = self.at(x, y);
        t.terrain != Terrain::Water && t.overlay == Overlay::None
    }

    pub fn has_adjacent_road(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        DIRS.iter().any(|&(dx, dy)| {
            self.in_bounds(x + dx, y + dy) && self.at(x + dx, y + dy).overlay == Overlay::Road
        })
    }

    // -----------------------------------------------------------------------
    // Edit operations
    // -----------------------------------------------------------------------

    /// Apply an edit tool at (x, y), charging the stats' money.
    pub fn apply_tool(&mut self, tool: Tool, x: i32, y: i32) -> ToolApplyResult {
        if !self.in_bounds(x, y) {
            return ToolApplyResult::OutOfBounds;
        }
        match tool {
            Tool::Inspect => ToolApplyResult::Noop,
            Tool::Bulldoze => {
                let before = self.at(x, y).overlay;
                self.bulldoze(x, y);
                if before != Overlay::None && self.at(x, y).overlay == Overlay::None {
                    ToolApplyResult::Applied
                } else {
                    ToolApplyResult::Noop
                }
            }
            Tool::Road => self.apply_road(x, y, 1, false),
            Tool::Park => {
                if self.at(x, y).terrain == Terrain::Water {
                    return ToolApplyResult::BlockedWater;
                }
                if self.at(x, y).overlay == Overlay::Park {
                    return ToolApplyResult::Noop;
                }
                if self.at(x, y).overlay != Overlay::None {
                    return ToolApplyResult::BlockedOccupied;
                }
                if !self.spend(COST_PARK) {
                    return ToolApplyResult::InsufficientFunds;
                }
                let t = self.at_mut(x, y);
                t.overlay = Overlay::Park;
                t.level = 1;
                t.occupants = 0;
                ToolApplyResult::Applied
            }
            _ => {
                let overlay = match tool.overlay() {
                    Some(o) => o,
                    None => return ToolApplyResult::Noop,
                };
                self.place_building(overlay, x, y)
            }
        }
    }

    /// Place or upgrade a road tile at the given level. Never downgrades an
    /// existing higher-level road.
    pub fn apply_road(
        &mut self,
        x: i32,
        y: i32,
        level: u8,
        allow_bridges: bool,
    ) -> ToolApplyResult {
        if !self.in_bounds(x, y) {
            return ToolApplyResult::OutOfBounds;
        }
        let level = level.clamp(1, MAX_LEVEL);
        let t = *self.at(x, y);

        if t.terrain == Terrain::Water && !allow_bridges {
            return ToolApplyResult::BlockedWater;
        }
        if t.overlay == Overlay::Road {
            if t.level >= level {
                return ToolApplyResult::Noop;
            }
            let cost = COST_ROAD_PER_LEVEL * i64::from(level - t.level);
            if !self.spend(cost) {
                return ToolApplyResult::InsufficientFunds;
            }
            self.at_mut(x, y).level = level;
            return ToolApplyResult::Applied;
        }
        if t.overlay != Overlay::None {
            return ToolApplyResult::BlockedOccupied;
        }
        if !self.spend(COST_ROAD_PER_LEVEL * i64::from(level)) {
            return ToolApplyResult::InsufficientFunds;
        }
        let tile = self.at_mut(x, y);
        tile.overlay = Overlay::Road;
        tile.level = level;
        tile.occupants = 0;
        self.update_road_masks_around(x, y);
        ToolApplyResult::Applied
    }

    fn place_building(&mut self, overlay: Overlay, x: i32, y: i32) -> ToolApplyResult {
        debug_assert!(overlay.needs_road_access());
        let t = *self.at(x, y);
        if t.terrain == Terrain::Water {
            return ToolApplyResult::BlockedWater;
        }
        if !self.has_adjacent_road(x, y) {
            return ToolApplyResult::BlockedNoRoad;
        }

        let cost = if overlay.is_civic() {
            COST_CIVIC
        } else {
            COST_ZONE
        };

        if t.overlay == overlay {
            // Repeated placement upgrades the building.
            if t.level >= MAX_LEVEL {
                return ToolApplyResult::Noop;
            }
            if !self.spend(cost) {
                return ToolApplyResult::InsufficientFunds;
            }
            self.at_mut(x, y).level += 1;
            return ToolApplyResult::Applied;
        }
        if t.overlay != Overlay::None {
            return ToolApplyResult::BlockedOccupied;
        }
        if !self.spend(cost) {
            return ToolApplyResult::InsufficientFunds;
        }
        let tile = self.at_mut(x, y);
        tile.overlay = overlay;
        tile.level = 1;
        tile.occupants = 0;
        ToolApplyResult::Applied
    }

    pub fn bulldoze(&mut self, x: i32, y: i32) {
        if !self.in_bounds(x, y) {
            return;
        }
        // A bridge road is the only overlay water can carry.
        if self.at(x, y).terrain == Terrain::Water && self.at(x, y).overlay != Overlay::Road {
            return;
        }
        let was_road = self.at(x, y).overlay == Overlay::Road;
        let t = self.at_mut(x, y);
        t.overlay = Overlay::None;
        t.level = 1;
        t.occupants = 0;
        if was_road {
            self.update_road_masks_around(x, y);
        }
    }

    /// Unconditionally set a road overlay (generator-internal; no cost).
    pub fn set_road(&mut self, x: i32, y: i32) {
        if !self.in_bounds(x, y) {
            return;
        }
        let t = self.at_mut(x, y);
        t.overlay = Overlay::Road;
        t.level = 1;
        t.occupants = 0;
    }

    /// Unconditionally set an overlay (generator-internal; no cost/checks
    /// beyond the water invariant).
    pub fn set_overlay(&mut self, overlay: Overlay, x: i32, y: i32) {
        if !self.in_bounds(x, y) {
            return;
        }
        if self.at(x, y).terrain == Terrain::Water && overlay != Overlay::Road {
            return;
        }
        let t = self.at_mut(x, y);
        t.overlay = overlay;
        t.level = t.level.clamp(1, MAX_LEVEL);
        t.occupants = 0;
    }

    /// Assign a tile to a district.
    pub fn apply_district(&mut self, x: i32, y: i32, district: u8) -> ToolApplyResult {
        if !self.in_bounds(x, y) {
            return ToolApplyResult::OutOfBounds;
        }
        let d = district.min(DISTRICT_COUNT as u8 - 1);
        if self.at(x, y).district == d {
            return ToolApplyResult::Noop;
        }
        self.at_mut(x, y).district = d;
        ToolApplyResult::Applied
    }

    /// Assign every tile in the inclusive rectangle to a district.
    pub fn fill_district_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, district: u8) {
        if self.w == 0 || self.h == 0 {
            return;
        }
        let (x0, x1) = (x0.min(x1).max(0), x0.max(x1).min(self.w - 1));
        let (y0, y1) = (y0.min(y1).max(0), y0.max(y1).min(self.h - 1));
        let d = district.min(DISTRICT_COUNT as u8 - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.at_mut(x, y).district = d;
            }
        }
    }

    fn spend(&mut self, cost: i64) -> bool {
        if cost <= 0 {
            return true;
        }
        if self.stats.money < cost {
            return false;
        }
        self.stats.money -= cost;
        true
    }

    // -----------------------------------------------------------------------
    // Road connection masks
    // -----------------------------------------------------------------------

    /// The 4-bit mask of road neighbors (bit 0 = N, 1 = E, 2 = S, 3 = W).
    pub fn compute_road_mask(&self, x: i32, y: i32) -> u8 {
        let mut mask = 0u8;
        for (bit, &(dx, dy)) in DIRS.iter().enumerate() {
            let (nx, ny) = (x + dx, y + dy);
            if self.in_bounds(nx, ny) && self.at(nx, ny).overlay == Overlay::Road {
                mask |= 1 << bit;
            }
        }
        mask
    }

    fn apply_road_mask(&mut self, x: i32, y: i32) {
        if !self.in_bounds(x, y) || self.at(x, y).overlay != Overlay::Road {
            return;
        }
        let mask = self.compute_road_mask(x, y);
        let t = self.at_mut(x, y);
        t.variation = (t.variation & 0xF0) | mask;
    }

    /// Refresh masks for (x, y) and its 4 neighbors after a single-tile edit.
    pub fn update_road_masks_around(&mut self, x: i32, y: i32) {
        self.apply_road_mask(x, y);
        for &(dx, dy) in DIRS.iter() {
            self.apply_road_mask(x + dx, y + dy);
        }
    }

    /// Recompute the connection mask of every road tile. Used after loading
    /// saves and bulk edits.
    pub fn recompute_road_masks(&mut self) {
        for y in 0..self.h {
            for x in 0..self.w {
                self.apply_road_mask(x, y);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stats recounting
    // -----------------------------------------------------------------------

    /// Recount the stats that are a direct function of the tile grid:
    /// population, capacities, and road/park tile counts.
    pub fn recount_static_stats(&mut self) {
        let mut population = 0i32;
        let mut housing = 0i32;
        let mut jobs = 0i32;
        let mut roads = 0i32;
        let mut parks = 0i32;

        for t in &self.tiles {
            match t.overlay {
                Overlay::Road => roads += 1,
                Overlay::Park => parks += 1,
                Overlay::Residential => {
                    population += i32::from(t.occupants);
                    housing += i32::from(Overlay::Residential.capacity(t.level));
                }
                Overlay::Commercial | Overlay::Industrial => {
                    jobs += i32::from(t.overlay.capacity(t.level));
                }
                _ => {}
            }
        }

        self.stats.population = population;
        self.stats.housing_capacity = housing;
        self.stats.jobs_capacity = jobs;
        self.stats.roads = roads;
        self.stats.parks = parks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_world(w: i32, h: i32) -> World {
        let mut world = World::new(w, h, 1);
        world.stats_mut().money = 10_000;
        world
    }

    #[test]
    fn tile_record_roundtrip() {
        let t = Tile {
            terrain: Terrain::Sand,
            overlay: Overlay::Hospital,
            height: 0.625,
            variation: 0xA7,
            level: 2,
            occupants: 1234,
            district: 5,
        };
        let b = t.to_bytes();
        assert_eq!(b.len(), TILE_RECORD_SIZE);
        assert_eq!(Tile::from_bytes(&b), Some(t));
    }

    #[test]
    fn tile_record_rejects_bad_enums() {
        let mut b = Tile::default().to_bytes();
        b[0] = 9;
        assert_eq!(Tile::from_bytes(&b), None);
        let mut b = Tile::default().to_bytes();
        b[1] = 200;
        assert_eq!(Tile::from_bytes(&b), None);
    }

    #[test]
    fn zone_requires_adjacent_road() {
        let mut world = flat_world(16, 16);
        assert_eq!(
            world.apply_tool(Tool::Residential, 5, 5),
            ToolApplyResult::BlockedNoRoad
        );
        assert_eq!(world.apply_road(5, 4, 1, false), ToolApplyResult::Applied);
        assert_eq!(
            world.apply_tool(Tool::Residential, 5, 5),
            ToolApplyResult::Applied
        );
    }

    #[test]
    fn blocked_no_road_two_tiles_away() {
        // A plus of roads at (10,10); (12,12) is not adjacent to any of it.
        let mut world = flat_world(24, 24);
        for &(x, y) in &[(10, 10), (11, 10), (9, 10), (10, 11), (10, 9)] {
            assert_eq!(world.apply_road(x, y, 1, false), ToolApplyResult::Applied);
        }
        assert_eq!(
            world.apply_tool(Tool::Residential, 10, 11),
            ToolApplyResult::BlockedOccupied
        );
        assert_eq!(
            world.apply_tool(Tool::Residential, 11, 11),
            ToolApplyResult::Applied
        );
        assert_eq!(
            world.apply_tool(Tool::Residential, 12, 12),
            ToolApplyResult::BlockedNoRoad
        );
    }

    #[test]
    fn water_blocks_everything_but_bridges() {
        let mut world = flat_world(8, 8);
        world.at_mut(3, 3).terrain = Terrain::Water;
        assert_eq!(
            world.apply_tool(Tool::Road, 3, 3),
            ToolApplyResult::BlockedWater
        );
        assert_eq!(
            world.apply_tool(Tool::Park, 3, 3),
            ToolApplyResult::BlockedWater
        );
        assert_eq!(world.apply_road(3, 3, 1, true), ToolApplyResult::Applied);
        assert_eq!(world.at(3, 3).overlay, Overlay::Road);
    }

    #[test]
    fn repeated_zone_placement_upgrades() {
        let mut world = flat_world(8, 8);
        world.apply_road(2, 2, 1, false);
        assert_eq!(
            world.apply_tool(Tool::Commercial, 2, 3),
            ToolApplyResult::Applied
        );
        assert_eq!(world.at(2, 3).level, 1);
        assert_eq!(
            world.apply_tool(Tool::Commercial, 2, 3),
            ToolApplyResult::Applied
        );
        assert_eq!(world.at(2, 3).level, 2);
        world.apply_tool(Tool::Commercial, 2, 3);
        assert_eq!(world.at(2, 3).level, 3);
        assert_eq!(
            world.apply_tool(Tool::Commercial, 2, 3),
            ToolApplyResult::Noop
        );
    }

    #[test]
    fn insufficient_funds_refuses() {
        let mut world = World::new(8, 8, 1);
        world.stats_mut().money = 0;
        assert_eq!(
            world.apply_tool(Tool::Road, 1, 1),
            ToolApplyResult::InsufficientFunds
        );
        world.stats_mut().money = 1;
        assert_eq!(world.apply_tool(Tool::Road, 1, 1), ToolApplyResult::Applied);
        assert_eq!(world.stats().money, 0);
    }

    #[test]
    fn civic_placement_needs_road_and_costs_more() {
        let mut world = flat_world(8, 8);
        assert_eq!(
            world.apply_tool(Tool::School, 4, 4),
            ToolApplyResult::BlockedNoRoad
        );
        world.apply_road(4, 3, 1, false);
        let money_before = world.stats().money;
        assert_eq!(world.apply_tool(Tool::School, 4, 4), ToolApplyResult::Applied);
        assert_eq!(world.stats().money, money_before - 12);
        assert_eq!(world.at(4, 4).overlay, Overlay::School);
    }

    #[test]
    fn road_masks_match_adjacency_after_edits() {
        let mut world = flat_world(16, 16);
        for &(x, y) in &[(5, 5), (6, 5), (7, 5), (6, 4), (6, 6)] {
            world.apply_road(x, y, 1, false);
        }
        world.bulldoze(7, 5);

        // The incremental path must agree with a full recompute.
        let incremental: Vec<u8> = world.tiles().iter().map(|t| t.variation & 0x0F).collect();
        let mut full = world.clone();
        full.recompute_road_masks();
        let recomputed: Vec<u8> = full.tiles().iter().map(|t| t.variation & 0x0F).collect();
        assert_eq!(incremental, recomputed);

        for y in 0..16 {
            for x in 0..16 {
                if world.at(x, y).overlay == Overlay::Road {
                    assert_eq!(
                        world.at(x, y).variation & 0x0F,
                        world.compute_road_mask(x, y),
                        "mask mismatch at ({x},{y})"
                    );
                }
            }
        }
    }

    #[test]
    fn district_fill_and_assign() {
        let mut world = flat_world(8, 8);
        world.fill_district_rect(0, 0, 3, 3, 2);
        assert_eq!(world.at(1, 1).district, 2);
        assert_eq!(world.at(4, 4).district, 0);
        assert_eq!(world.apply_district(4, 4, 7), ToolApplyResult::Applied);
        assert_eq!(world.apply_district(4, 4, 7), ToolApplyResult::Noop);
        // Out-of-range ids clamp to the last district.
        world.apply_district(5, 5, 200);
        assert_eq!(world.at(5, 5).district, 7);
    }

    #[test]
    fn recount_static_stats_sums_tiles() {
        let mut world = flat_world(8, 8);
        world.apply_road(2, 2, 1, false);
        world.apply_road(3, 2, 1, false);
        world.apply_tool(Tool::Residential, 2, 3);
        world.at_mut(2, 3).occupants = 7;
        world.apply_tool(Tool::Industrial, 3, 3);
        world.apply_tool(Tool::Park, 5, 5);
        world.recount_static_stats();

        let s = world.stats();
        assert_eq!(s.roads, 2);
        assert_eq!(s.parks, 1);
        assert_eq!(s.population, 7);
        assert_eq!(s.housing_capacity, 10);
        assert_eq!(s.jobs_capacity, 12);
    }

    #[test]
    fn capacity_table() {
        assert_eq!(Overlay::Residential.capacity(1), 10);
        assert_eq!(Overlay::Commercial.capacity(3), 24);
        assert_eq!(Overlay::Industrial.capacity(2), 24);
        assert_eq!(Overlay::Road.capacity(3), 0);
        // Levels clamp into 1..=3.
        assert_eq!(Overlay::Residential.capacity(0), 10);
        assert_eq!(Overlay::Residential.capacity(9), 30);
    }

    #[test]
    fn degenerate_world_sizes() {
        let world = World::new(0, 0, 5);
        assert_eq!(world.tile_count(), 0);
        assert!(!world.in_bounds(0, 0));
        let mut w1 = World::new(1, 1, 5);
        w1.recompute_road_masks();
        w1.recount_static_stats();
        assert_eq!(w1.stats().roads, 0);
    }
}
