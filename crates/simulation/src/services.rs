//! Service accessibility: a two-step floating catchment (E2SFCA-style)
//! approximation over the road network.
//!
//! Step 1 computes a provider-to-demand ratio per facility from the demand
//! reachable within the catchment radius; step 2 sums reachable ratios per
//! demand tile with a linear distance decay. Scores clamp to [0, 1].

use serde::{Deserialize, Serialize};

use crate::grid::{Overlay, World, DIRS};
use crate::pathfind::{
    compute_roads_connected_to_edge, has_adjacent_road_connected_to_edge,
    pick_adjacent_road_tile,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    Education,
    Health,
    Safety,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [
        ServiceKind::Education,
        ServiceKind::Health,
        ServiceKind::Safety,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Education => "education",
            ServiceKind::Health => "health",
            ServiceKind::Safety => "safety",
        }
    }

    /// Which civic overlays provide this service.
    pub fn provides(self, overlay: Overlay) -> bool {
        match self {
            ServiceKind::Education => overlay == Overlay::School,
            ServiceKind::Health => overlay == Overlay::Hospital,
            ServiceKind::Safety => {
                matches!(overlay, Overlay::PoliceStation | Overlay::FireStation)
            }
        }
    }
}

/// How demand is measured in the catchment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ServiceDemandMode {
    /// Residential occupants (population-weighted).
    #[default]
    Occupants,
    /// Residential tile count.
    Tiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub require_outside_connection: bool,
    /// Catchment radius in road steps.
    pub catchment_radius_steps: i32,
    pub demand_mode: ServiceDemandMode,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            require_outside_connection: true,
            catchment_radius_steps: 18,
            demand_mode: ServiceDemandMode::Occupants,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServicesResult {
    pub w: i32,
    pub h: i32,

    /// Per-tile satisfaction in [0, 1] for each service kind; zero for
    /// tiles without demand.
    pub education: Vec<f32>,
    pub health: Vec<f32>,
    pub safety: Vec<f32>,

    /// Demand-weighted aggregates in [0, 1]; 1 when there is no demand.
    pub education_satisfaction: f32,
    pub health_satisfaction: f32,
    pub safety_satisfaction: f32,
    pub overall_satisfaction: f32,
}

impl ServicesResult {
    pub fn field(&self, kind: ServiceKind) -> &[f32] {
        match kind {
            ServiceKind::Education => &self.education,
            ServiceKind::Health => &self.health,
            ServiceKind::Safety => &self.safety,
        }
    }

    pub fn satisfaction(&self, kind: ServiceKind) -> f32 {
        match kind {
            ServiceKind::Education => self.education_satisfaction,
            ServiceKind::Health => self.health_satisfaction,
            ServiceKind::Safety => self.safety_satisfaction,
        }
    }
}

struct Facility {
    road_idx: usize,
    capacity: f32,
}

struct DemandPoint {
    tile_idx: usize,
    road_idx: usize,
    weight: f32,
}

/// BFS over traversable road tiles from one seed, capped at `radius`.
/// Returns -1 for unreached tiles.
fn road_bfs_from(
    world: &World,
    seed: usize,
    radius: i32,
    traversable: &dyn Fn(usize) -> bool,
) -> Vec<i32> {
    let n = world.tile_count();
    let w = world.width() as usize;
    let mut dist = vec![-1i32; n];
    if !traversable(seed) {
        return dist;
    }
    dist[seed] = 0;
    let mut queue = vec![seed];
    let mut head = 0usize;
    while head < queue.len() {
        let idx = queue[head];
        head += 1;
        if dist[idx] >= radius {
            continue;
        }
        let x = (idx % w) as i32;
        let y = (idx / w) as i32;
        for &(dx, dy) in DIRS.iter() {
            let (nx, ny) = (x + dx, y + dy);
            if !world.in_bounds(nx, ny) {
                continue;
            }
            let nidx = world.idx(nx, ny);
            if dist[nidx] != -1 || !traversable(nidx) {
                continue;
            }
            dist[nidx] = dist[idx] + 1;
            queue.push(nidx);
        }
    }
    dist
}

/// Compute per-tile and aggregate service accessibility.
pub fn compute_services(
    world: &World,
    cfg: &ServicesConfig,
    precomputed_road_to_edge: Option<&[u8]>,
) -> ServicesResult {
    let mut out = ServicesResult {
        w: world.width(),
        h: world.height(),
        ..ServicesResult::default()
    };
    let (w, h) = (out.w, out.h);
    let n = world.tile_count();
    out.education = vec![0.0; n];
    out.health = vec![0.0; n];
    out.safety = vec![0.0; n];
    out.education_satisfaction = 1.0;
    out.health_satisfaction = 1.0;
    out.safety_satisfaction = 1.0;
    out.overall_satisfaction = 1.0;
    if w <= 0 || h <= 0 {
        return out;
    }

    let mask_local;
    let mask: Option<&[u8]> = if cfg.require_outside_connection {
        match precomputed_road_to_edge {
            Some(m) if m.len() == n => Some(m),
            _ => {
                mask_local = compute_roads_connected_to_edge(world);
                Some(&mask_local)
            }
        }
    } else {
        None
    };

    let traversable = |idx: usize| -> bool {
        let x = (idx % w as usize) as i32;
        let y = (idx / w as usize) as i32;
        if world.at(x, y).overlay != Overlay::Road {
            return false;
        }
        match mask {
            Some(m) => m[idx] == 1,
            None => true,
        }
    };

    let zone_has_access = |x: i32, y: i32| -> bool {
        if !world.has_adjacent_road(x, y) {
            return false;
        }
        match mask {
            Some(m) => has_adjacent_road_connected_to_edge(world, m, x, y),
            None => true,
        }
    };

    // --- Demand points (shared across service kinds) ---
    let mut demand: Vec<DemandPoint> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            if t.overlay != Overlay::Residential || !zone_has_access(x, y) {
                continue;
            }
            let weight = match cfg.demand_mode {
                ServiceDemandMode::Occupants => f32::from(t.occupants),
                ServiceDemandMode::Tiles => 1.0,
            };
            if weight <= 0.0 {
                continue;
            }
            let Some(road) = pick_adjacent_road_tile(world, mask, x, y) else {
                continue;
            };
            demand.push(DemandPoint {
                tile_idx: world.idx(x, y),
                road_idx: world.idx(road.x, road.y),
                weight,
            });
        }
    }

    let radius = cfg.catchment_radius_steps.max(0);
    let total_weight: f32 = demand.iter().map(|d| d.weight).sum();

    let mut kind_scores = [1.0f32; 3];
    for (k, kind) in ServiceKind::ALL.iter().enumerate() {
        // --- Facilities of this kind with road access ---
        let mut facilities: Vec<Facility> = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let t = world.at(x, y);
                if !kind.provides(t.overlay) || !zone_has_access(x, y) {
                    continue;
                }
                let Some(road) = pick_adjacent_road_tile(world, mask, x, y) else {
                    continue;
                };
                facilities.push(Facility {
                    road_idx: world.idx(road.x, road.y),
                    capacity: f32::from(t.overlay.capacity(t.level)),
                });
            }
        }

        // Step 1: per-facility catchment distances and supply ratios.
        let mut fields: Vec<Vec<i32>> = Vec::with_capacity(facilities.len());
        let mut ratios: Vec<f32> = Vec::with_capacity(facilities.len());
        for f in &facilities {
            let dist = road_bfs_from(world, f.road_idx, radius, &traversable);
            let mut demand_in_reach = 0.0f32;
            for d in &demand {
                let dd = dist[d.road_idx];
                if dd >= 0 && dd <= radius {
                    demand_in_reach += d.weight;
                }
            }
            // With no demand in reach the facility is trivially abundant.
            ratios.push(if demand_in_reach > 0.0 {
                f.capacity / demand_in_reach
            } else {
                f.capacity
            });
            fields.push(dist);
        }

        // Step 2: demand tiles sum reachable ratios with linear decay.
        let field = match kind {
            ServiceKind::Education => &mut out.education,
            ServiceKind::Health => &mut out.health,
            ServiceKind::Safety => &mut out.safety,
        };
        let mut weighted_sum = 0.0f32;
        for d in &demand {
            let mut score = 0.0f32;
            for (fi, dist) in fields.iter().enumerate() {
                let dd = dist[d.road_idx];
                if dd >= 0 && dd <= radius && radius > 0 {
                    let decay = 1.0 - dd as f32 / radius as f32;
                    score += ratios[fi] * decay.clamp(0.0, 1.0);
                } else if dd == 0 {
                    score += ratios[fi];
                }
            }
            let score = score.clamp(0.0, 1.0);
            field[d.tile_idx] = score;
            weighted_sum += score * d.weight;
        }

        kind_scores[k] = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            1.0
        };
    }

    out.education_satisfaction = kind_scores[0];
    out.health_satisfaction = kind_scores[1];
    out.safety_satisfaction = kind_scores[2];
    out.overall_satisfaction = (kind_scores[0] + kind_scores[1] + kind_scores[2]) / 3.0;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Tool;

    fn serviced_world() -> World {
        let mut world = World::new(32, 9, 5);
        world.stats_mut().money = 1_000_000;
        for x in 0..32 {
            world.apply_road(x, 4, 1, false);
        }
        world.apply_tool(Tool::Residential, 4, 5);
        world.at_mut(4, 5).occupants = 5;
        world.apply_tool(Tool::School, 6, 5);
        world
    }

    #[test]
    fn school_serves_nearby_residents() {
        let world = serviced_world();
        let r = compute_services(&world, &ServicesConfig::default(), None);
        let idx = world.idx(4, 5);
        assert!(r.education[idx] > 0.0);
        assert!(r.education_satisfaction > 0.0);
        // No hospitals or safety anywhere.
        assert_eq!(r.health[idx], 0.0);
        assert_eq!(r.health_satisfaction, 0.0);
        assert_eq!(r.safety_satisfaction, 0.0);
    }

    #[test]
    fn distance_decay_reduces_scores() {
        let mut world = serviced_world();
        world.apply_tool(Tool::Residential, 28, 5);
        world.at_mut(28, 5).occupants = 5;
        let r = compute_services(&world, &ServicesConfig::default(), None);
        // The distant home scores below the adjacent one.
        assert!(r.education[world.idx(28, 5)] < r.education[world.idx(4, 5)]);
    }

    #[test]
    fn out_of_radius_scores_zero() {
        let mut world = serviced_world();
        world.apply_tool(Tool::Residential, 28, 5);
        world.at_mut(28, 5).occupants = 5;
        let cfg = ServicesConfig {
            catchment_radius_steps: 4,
            ..ServicesConfig::default()
        };
        let r = compute_services(&world, &cfg, None);
        assert_eq!(r.education[world.idx(28, 5)], 0.0);
        assert!(r.education[world.idx(4, 5)] > 0.0);
    }

    #[test]
    fn police_and_fire_both_provide_safety() {
        let mut world = serviced_world();
        world.apply_tool(Tool::PoliceStation, 8, 5);
        let r1 = compute_services(&world, &ServicesConfig::default(), None);
        assert!(r1.safety_satisfaction > 0.0);

        world.apply_tool(Tool::FireStation, 10, 5);
        let r2 = compute_services(&world, &ServicesConfig::default(), None);
        assert!(r2.safety_satisfaction >= r1.safety_satisfaction);
    }

    #[test]
    fn overcrowded_facility_dilutes_ratio() {
        let mut world = serviced_world();
        // A big population overwhelms one level-1 school (capacity 6).
        world.at_mut(4, 5).occupants = 300;
        let crowded = compute_services(&world, &ServicesConfig::default(), None);
        let mut quiet_world = serviced_world();
        quiet_world.at_mut(4, 5).occupants = 3;
        let quiet = compute_services(&quiet_world, &ServicesConfig::default(), None);
        assert!(
            crowded.education_satisfaction < quiet.education_satisfaction,
            "crowding should dilute the provider ratio"
        );
    }

    #[test]
    fn tiles_demand_mode_ignores_occupancy() {
        let mut world = serviced_world();
        world.at_mut(4, 5).occupants = 500;
        let cfg = ServicesConfig {
            demand_mode: ServiceDemandMode::Tiles,
            ..ServicesConfig::default()
        };
        let r = compute_services(&world, &cfg, None);
        // One demand tile against capacity 6: fully served.
        assert_eq!(r.education[world.idx(4, 5)], 1.0);
    }

    #[test]
    fn no_demand_means_full_satisfaction() {
        let mut world = World::new(16, 16, 1);
        world.stats_mut().money = 1000;
        for x in 0..16 {
            world.apply_road(x, 8, 1, false);
        }
        let r = compute_services(&world, &ServicesConfig::default(), None);
        assert_eq!(r.education_satisfaction, 1.0);
        assert_eq!(r.overall_satisfaction, 1.0);
    }

    #[test]
    fn results_are_deterministic() {
        let world = serviced_world();
        let a = compute_services(&world, &ServicesConfig::default(), None);
        let b = compute_services(&world, &ServicesConfig::default(), None);
        assert_eq!(a.education, b.education);
        assert_eq!(a.overall_satisfaction, b.overall_satisfaction);
    }
}
