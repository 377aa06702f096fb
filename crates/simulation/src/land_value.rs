//! Land value / amenity analysis: deterministic, derived-only, headless.
//!
//! Amenity fields are BFS distance transforms with linear decay; the final
//! value composes park and water bonuses against pollution, traffic spill
//! and connectivity penalties, clamped to [0, 1].

use serde::{Deserialize, Serialize};

use crate::grid::{Overlay, RoadLevel, Terrain, World};
use crate::pathfind::{
    has_adjacent_road_connected_to_edge, multi_source_distance_field, DIST_INF,
};
use crate::traffic::TrafficResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandValueConfig {
    // Manhattan influence radii.
    pub park_radius: i32,
    pub water_radius: i32,
    pub pollution_radius: i32,

    // Weights applied to the normalized influences.
    pub base: f32,
    pub park_bonus: f32,
    pub water_bonus: f32,
    pub pollution_penalty: f32,
    pub traffic_penalty: f32,

    /// Applied when the tile has no adjacent road at all.
    pub no_road_penalty: f32,
    /// Applied when the outside-connection rule is on but unmet.
    pub disconnected_penalty: f32,

    /// Parks only count when road-connected to the map edge.
    pub require_outside_connection: bool,
}

impl Default for LandValueConfig {
    fn default() -> Self {
        Self {
            park_radius: 8,
            water_radius: 6,
            pollution_radius: 7,
            base: 0.35,
            park_bonus: 0.35,
            water_bonus: 0.15,
            pollution_penalty: 0.30,
            traffic_penalty: 0.25,
            no_road_penalty: 0.08,
            disconnected_penalty: 0.18,
            require_outside_connection: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LandValueResult {
    pub w: i32,
    pub h: i32,

    // Flat [y*w + x] fields, all normalized to [0, 1].
    pub value: Vec<f32>,
    pub park_amenity: Vec<f32>,
    pub water_amenity: Vec<f32>,
    /// Bad = 1.
    pub pollution: Vec<f32>,
    /// Bad = 1 (road-adjacent congestion proxy).
    pub traffic: Vec<f32>,
}

impl LandValueResult {
    /// Mean land value over land tiles (water excluded).
    pub fn average_over_land(&self, world: &World) -> f32 {
        let mut sum = 0.0f64;
        let mut count = 0u32;
        for (i, t) in world.tiles().iter().enumerate() {
            if t.terrain != Terrain::Water {
                sum += f64::from(self.value[i]);
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            (sum / f64::from(count)) as f32
        }
    }
}

fn amenity_score(dist: i32, radius: i32) -> f32 {
    if radius <= 0 || dist < 0 || dist > radius || dist >= DIST_INF {
        return 0.0;
    }
    (1.0 - dist as f32 / radius as f32).clamp(0.0, 1.0)
}

/// Compute per-tile land value plus its component fields.
///
/// When `traffic` is provided, road congestion bleeds into adjacent tiles
/// as a penalty. When the outside-connection rule is on, `road_to_edge`
/// gates which parks count and which tiles take the disconnected penalty.
pub fn compute_land_value(
    world: &World,
    cfg: &LandValueConfig,
    traffic: Option<&TrafficResult>,
    road_to_edge: Option<&[u8]>,
) -> LandValueResult {
    let mut out = LandValueResult {
        w: world.width(),
        h: world.height(),
        ..LandValueResult::default()
    };
    let (w, h) = (out.w, out.h);
    if w <= 0 || h <= 0 {
        return out;
    }
    let n = world.tile_count();
    out.value = vec![0.0; n];
    out.park_amenity = vec![0.0; n];
    out.water_amenity = vec![0.0; n];
    out.pollution = vec![0.0; n];
    out.traffic = vec![0.0; n];

    let use_edge_mask = cfg.require_outside_connection
        && road_to_edge.map_or(false, |m| m.len() == n);
    let edge_mask = road_to_edge.filter(|_| use_edge_mask);

    // --- Amenity sources ---
    let mut park_sources = Vec::new();
    let mut water_sources = Vec::new();
    let mut industry_sources = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            let idx = world.idx(x, y);
            if t.terrain == Terrain::Water {
                water_sources.push(idx);
                continue;
            }
            match t.overlay {
                Overlay::Industrial => industry_sources.push(idx),
                Overlay::Park => {
                    // Parks only count with road access, optionally edge-connected.
                    if !world.has_adjacent_road(x, y) {
                        continue;
                    }
                    if let Some(m) = edge_mask {
                        if !has_adjacent_road_connected_to_edge(world, m, x, y) {
                            continue;
                        }
                    }
                    park_sources.push(idx);
                }
                _ => {}
            }
        }
    }

    // Parks and pollution do not cross water (islands stay isolated); water
    // proximity itself is geometric.
    let dist_park =
        multi_source_distance_field(world, &park_sources, cfg.park_radius.max(0), true);
    let dist_industry =
        multi_source_distance_field(world, &industry_sources, cfg.pollution_radius.max(0), true);
    let dist_water =
        multi_source_distance_field(world, &water_sources, cfg.water_radius.max(0), false);

    // --- Traffic penalty field ---
    let traffic_field = traffic.filter(|t| t.max_traffic > 0 && t.road_traffic.len() == n);
    if let Some(tr) = traffic_field {
        let denom = (tr.max_traffic as f32).max(1.0);
        for y in 0..h {
            for x in 0..w {
                let mut max_tv = 0.0f32;
                let mut consider = |tx: i32, ty: i32| {
                    if !world.in_bounds(tx, ty) {
                        return;
                    }
                    let rt = world.at(tx, ty);
                    if rt.overlay != Overlay::Road {
                        return;
                    }
                    let tidx = world.idx(tx, ty);
                    let eff = f32::from(tr.road_traffic[tidx])
                        * RoadLevel::from_level(rt.level).traffic_spill_multiplier();
                    max_tv = max_tv.max(eff);
                };
                consider(x, y);
                consider(x + 1, y);
                consider(x - 1, y);
                consider(x, y + 1);
                consider(x, y - 1);

                if max_tv > 0.0 {
                    let norm = (max_tv / denom).clamp(0.0, 1.0);
                    // Emphasize low flows so the field is readable early.
                    out.traffic[world.idx(x, y)] = norm.powf(0.45);
                }
            }
        }
    }

    // --- Compose ---
    for y in 0..h {
        for x in 0..w {
            let idx = world.idx(x, y);
            if world.at(x, y).terrain == Terrain::Water {
                continue; // all fields stay zero on water
            }

            let park = amenity_score(dist_park[idx], cfg.park_radius);
            let water = amenity_score(dist_water[idx], cfg.water_radius);
            let pollution = amenity_score(dist_industry[idx], cfg.pollution_radius);
            let traffic_pen = out.traffic[idx];

            out.park_amenity[idx] = park;
            out.water_amenity[idx] = water;
            out.pollution[idx] = pollution;

            let mut v = cfg.base;
            v += cfg.park_bonus * park;
            v += cfg.water_bonus * water;
            v -= cfg.pollution_penalty * pollution;
            v -= cfg.traffic_penalty * traffic_pen;

            if !world.has_adjacent_road(x, y) {
                v -= cfg.no_road_penalty;
            } else if let Some(m) = edge_mask {
                if !has_adjacent_road_connected_to_edge(world, m, x, y) {
                    v -= cfg.disconnected_penalty;
                }
            }

            out.value[idx] = v.clamp(0.0, 1.0);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Tool;
    use crate::pathfind::compute_roads_connected_to_edge;
    use crate::traffic::{compute_commute_traffic, TrafficConfig};

    fn park_world() -> World {
        let mut world = World::new(24, 24, 3);
        world.stats_mut().money = 100_000;
        for x in 0..24 {
            world.apply_road(x, 12, 1, false);
        }
        world.apply_tool(Tool::Park, 12, 11);
        world
    }

    #[test]
    fn parks_raise_nearby_value_with_decay() {
        let world = park_world();
        let cfg = LandValueConfig::default();
        let mask = compute_roads_connected_to_edge(&world);
        let r = compute_land_value(&world, &cfg, None, Some(&mask));

        assert_eq!(r.park_amenity[world.idx(12, 11)], 1.0);
        let near = r.park_amenity[world.idx(12, 10)];
        let far = r.park_amenity[world.idx(12, 5)];
        assert!(near > far);
        assert!(r.value[world.idx(12, 10)] > r.value[world.idx(0, 0)]);
    }

    #[test]
    fn disconnected_parks_do_not_count() {
        let mut world = World::new(24, 24, 3);
        world.stats_mut().money = 100_000;
        // Interior road island; a park beside it.
        for x in 8..16 {
            world.apply_road(x, 12, 1, false);
        }
        world.apply_tool(Tool::Park, 10, 11);
        let mask = compute_roads_connected_to_edge(&world);

        let cfg = LandValueConfig::default();
        let gated = compute_land_value(&world, &cfg, None, Some(&mask));
        assert_eq!(gated.park_amenity[world.idx(10, 11)], 0.0);

        let open = LandValueConfig {
            require_outside_connection: false,
            ..cfg
        };
        let ungated = compute_land_value(&world, &open, None, Some(&mask));
        assert_eq!(ungated.park_amenity[world.idx(10, 11)], 1.0);
    }

    #[test]
    fn industry_depresses_neighbors() {
        let mut world = park_world();
        world.apply_tool(Tool::Industrial, 5, 13);
        let cfg = LandValueConfig {
            require_outside_connection: false,
            ..LandValueConfig::default()
        };
        let r = compute_land_value(&world, &cfg, None, None);
        assert_eq!(r.pollution[world.idx(5, 13)], 1.0);
        assert!(r.value[world.idx(5, 14)] < r.value[world.idx(18, 14)]);
    }

    #[test]
    fn water_tiles_hold_zero_fields() {
        let mut world = park_world();
        world.at_mut(2, 2).terrain = Terrain::Water;
        let cfg = LandValueConfig::default();
        let r = compute_land_value(&world, &cfg, None, None);
        assert_eq!(r.value[world.idx(2, 2)], 0.0);
        // Neighbors pick up the water bonus instead.
        assert!(r.water_amenity[world.idx(3, 2)] > 0.0);
    }

    #[test]
    fn traffic_spills_onto_adjacent_tiles() {
        let mut world = park_world();
        world.apply_tool(Tool::Residential, 2, 13);
        world.at_mut(2, 13).occupants = 30;
        world.apply_tool(Tool::Commercial, 20, 13);

        let traffic =
            compute_commute_traffic(&world, &TrafficConfig::default(), 1.0, None);
        assert!(traffic.max_traffic > 0);

        let cfg = LandValueConfig::default();
        let quiet = compute_land_value(&world, &cfg, None, None);
        let loud = compute_land_value(&world, &cfg, Some(&traffic), None);
        // A tile beside the arterial loses value once traffic is considered.
        let idx = world.idx(10, 13);
        assert!(loud.value[idx] < quiet.value[idx]);
        assert!(loud.traffic[idx] > 0.0);
    }

    #[test]
    fn values_stay_normalized() {
        let world = park_world();
        let cfg = LandValueConfig::default();
        let r = compute_land_value(&world, &cfg, None, None);
        for i in 0..world.tile_count() {
            assert!((0.0..=1.0).contains(&r.value[i]));
        }
        let avg = r.average_over_land(&world);
        assert!((0.0..=1.0).contains(&avg));
    }
}
