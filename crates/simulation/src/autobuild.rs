//! Heuristic city planner: places zones, parks and road spurs each day,
//! optionally upgrades congested roads, then advances the simulation.
//!
//! All tie-breaking flows through per-day hashes of the world seed, so a
//! given `(world, config, days)` run is exactly reproducible.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::grid::{
    clamp_road_level, road_capacity_for_level, Overlay, Terrain, Tool, ToolApplyResult, World,
    DIRS,
};
use crate::land_value::{compute_land_value, LandValueConfig, LandValueResult};
use crate::pathfind::{
    compute_roads_connected_to_edge, find_road_build_path, has_adjacent_road_connected_to_edge,
    Point, RoadBuildCostModel, RoadBuildPathConfig,
};
use crate::rng::{day_seed, hash_coords_32};
use crate::sim::Simulator;
use crate::stats::Stats;
use crate::traffic::{compute_commute_traffic, TrafficConfig};

// Per-decision hash salts.
const SALT_RES: u32 = 0x0052_4553; // "RES"
const SALT_COM: u32 = 0x0043_4F4D; // "COM"
const SALT_IND: u32 = 0x0049_4E44; // "IND"
const SALT_PARK: u32 = 0x5041_524B; // "PARK"
const SALT_ROAD: u32 = 0x524F_4144; // "ROAD"
const SALT_SPUR: u32 = 0x5350_5552; // "SPUR"
const SALT_UPGRADE: u32 = 0x5550_4752; // "UPGR"
const SALT_MIX: u32 = 0x004D_4958; // "MIX"

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoBuildConfig {
    pub zones_per_day: i32,
    pub roads_per_day: i32,
    pub parks_per_day: i32,

    /// Road class for new roads and spurs.
    pub road_level: i32,
    pub allow_bridges: bool,

    /// Stop spending once the treasury falls to this floor.
    pub min_money_reserve: i64,

    /// Build a park once there are this many zone tiles per existing park.
    pub park_per_zone_tiles: i32,

    pub auto_upgrade_roads: bool,
    pub congestion_upgrade_threshold: f32,
    pub road_upgrades_per_day: i32,

    /// Recompute the placement land-value field every N days.
    pub land_value_recalc_days: i32,

    /// Honor the simulator's outside-connection rule when picking sites.
    pub respect_outside_connection: bool,
    /// Plant a road link to the map edge before the first day.
    pub ensure_outside_connection: bool,

    pub max_road_spur_length: i32,
}

impl Default for AutoBuildConfig {
    fn default() -> Self {
        Self {
            zones_per_day: 6,
            roads_per_day: 2,
            parks_per_day: 1,
            road_level: 1,
            allow_bridges: false,
            min_money_reserve: 50,
            park_per_zone_tiles: 14,
            auto_upgrade_roads: true,
            congestion_upgrade_threshold: 0.25,
            road_upgrades_per_day: 4,
            land_value_recalc_days: 5,
            respect_outside_connection: true,
            ensure_outside_connection: true,
            max_road_spur_length: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoBuildReport {
    pub days_requested: i32,
    pub days_simulated: i32,
    pub zones_built: i32,
    pub roads_built: i32,
    pub parks_built: i32,
    pub roads_upgraded: i32,
    pub failed_builds: i32,
}

fn has_any_road(world: &World) -> bool {
    world.tiles().iter().any(|t| t.overlay == Overlay::Road)
}

fn count_zone_tiles(world: &World) -> i32 {
    world.tiles().iter().filter(|t| t.overlay.is_zone()).count() as i32
}

fn any_edge_connected(mask: &[u8]) -> bool {
    mask.iter().any(|&v| v != 0)
}

#[derive(Debug, Clone, Copy, Default)]
struct AdjCounts {
    roads: i32,
    parks: i32,
    res: i32,
    com: i32,
    ind: i32,
}

fn count_adj(world: &World, x: i32, y: i32) -> AdjCounts {
    let mut a = AdjCounts::default();
    for &(dx, dy) in DIRS.iter() {
        let (nx, ny) = (x + dx, y + dy);
        if !world.in_bounds(nx, ny) {
            continue;
        }
        match world.at(nx, ny).overlay {
            Overlay::Road => a.roads += 1,
            Overlay::Park => a.parks += 1,
            Overlay::Residential => a.res += 1,
            Overlay::Commercial => a.com += 1,
            Overlay::Industrial => a.ind += 1,
            _ => {}
        }
    }
    a
}

fn is_candidate_build_tile(
    world: &World,
    x: i32,
    y: i32,
    sim_cfg: &SimConfig,
    cfg: &AutoBuildConfig,
    road_to_edge: Option<&[u8]>,
) -> bool {
    if !world.is_empty_land(x, y) || !world.has_adjacent_road(x, y) {
        return false;
    }
    if sim_cfg.require_outside_connection && cfg.respect_outside_connection {
        match road_to_edge {
            Some(m) if !m.is_empty() => {
                if !has_adjacent_road_connected_to_edge(world, m, x, y) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

fn land_value_at(lv: &LandValueResult, world: &World, x: i32, y: i32) -> f32 {
    let idx = world.idx(x, y);
    if lv.value.len() == world.tile_count() {
        lv.value[idx].clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Best zone candidate for the day by the scoring table; deterministic
/// jitter and tie-breaks come from the per-day hash.
fn pick_best_zone_candidate(
    world: &World,
    zone_tool: Tool,
    sim_cfg: &SimConfig,
    cfg: &AutoBuildConfig,
    road_to_edge: Option<&[u8]>,
    lv: &LandValueResult,
    day: i32,
) -> Option<Point> {
    let (w, h) = (world.width(), world.height());
    let salt = match zone_tool {
        Tool::Residential => SALT_RES,
        Tool::Commercial => SALT_COM,
        _ => SALT_IND,
    };
    let seed_base = day_seed(world.seed(), day, salt);

    let mut best: Option<(i32, u32, Point)> = None;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            if !is_candidate_build_tile(world, x, y, sim_cfg, cfg, road_to_edge) {
                continue;
            }
            let adj = count_adj(world, x, y);
            let lv01 = land_value_at(lv, world, x, y);

            let mut score = match zone_tool {
                Tool::Residential => {
                    (lv01 * 1000.0) as i32 + adj.parks * 120 + adj.res * 80 - adj.ind * 180
                }
                Tool::Commercial => {
                    (lv01 * 900.0) as i32 + adj.res * 110 + adj.com * 70 - adj.ind * 120
                }
                _ => {
                    ((1.0 - lv01) * 900.0) as i32 + adj.ind * 120
                        - adj.res * 200
                        - adj.parks * 140
                }
            };

            let tie = hash_coords_32(x, y, seed_base);
            score += (tie & 0x3F) as i32;

            let better = match best {
                None => true,
                Some((bs, bt, _)) => score > bs || (score == bs && tie < bt),
            };
            if better {
                best = Some((score, tie, Point::new(x, y)));
            }
        }
    }
    best.map(|(_, _, p)| p)
}

fn pick_best_park_candidate(
    world: &World,
    sim_cfg: &SimConfig,
    cfg: &AutoBuildConfig,
    road_to_edge: Option<&[u8]>,
    lv: &LandValueResult,
    day: i32,
) -> Option<Point> {
    let (w, h) = (world.width(), world.height());
    let seed = day_seed(world.seed(), day, SALT_PARK);

    let mut best: Option<(i32, u32, Point)> = None;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            if !is_candidate_build_tile(world, x, y, sim_cfg, cfg, road_to_edge) {
                continue;
            }
            let adj = count_adj(world, x, y);
            let zone_adj = adj.res + adj.com + adj.ind;
            if zone_adj == 0 {
                continue; // parks are only useful near zones
            }
            let lv01 = land_value_at(lv, world, x, y);
            let mut score = zone_adj * 180 + (lv01 * 300.0) as i32 - adj.ind * 120;
            let tie = hash_coords_32(x, y, seed);
            score += (tie & 0x3F) as i32;

            let better = match best {
                None => true,
                Some((bs, bt, _)) => score > bs || (score == bs && tie < bt),
            };
            if better {
                best = Some((score, tie, Point::new(x, y)));
            }
        }
    }
    best.map(|(_, _, p)| p)
}

/// Frontier road with adjacent empty land, plus a deterministic direction.
fn pick_road_expansion_start(
    world: &World,
    sim_cfg: &SimConfig,
    cfg: &AutoBuildConfig,
    road_to_edge: Option<&[u8]>,
    day: i32,
) -> Option<(Point, usize)> {
    let (w, h) = (world.width(), world.height());
    let seed_base = day_seed(world.seed(), day, SALT_ROAD);
    let use_mask = sim_cfg.require_outside_connection
        && cfg.respect_outside_connection
        && road_to_edge.map_or(false, |m| m.len() == world.tile_count() && any_edge_connected(m));

    let expandable = |x: i32, y: i32| -> bool {
        if !world.in_bounds(x, y) {
            return false;
        }
        let t = world.at(x, y);
        if t.overlay != Overlay::None {
            return false;
        }
        t.terrain != Terrain::Water || cfg.allow_bridges
    };

    let mut best: Option<(i32, u32, Point)> = None;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let t = world.at(x, y);
            if t.overlay != Overlay::Road {
                continue;
            }
            if use_mask {
                if let Some(m) = road_to_edge {
                    if m[world.idx(x, y)] == 0 {
                        continue;
                    }
                }
            }
            let empties = DIRS
                .iter()
                .filter(|&&(dx, dy)| expandable(x + dx, y + dy))
                .count() as i32;
            if empties == 0 {
                continue;
            }
            // Frontier roads first; lower classes expand outward sooner.
            let level = i32::from(clamp_road_level(i32::from(t.level)));
            let tie = hash_coords_32(x, y, seed_base);
            let score = empties * 100 - level * 10 + (tie & 0x1F) as i32;

            let better = match best {
                None => true,
                Some((bs, bt, _)) => score > bs || (score == bs && tie < bt),
            };
            if better {
                best = Some((score, tie, Point::new(x, y)));
            }
        }
    }

    let (_, tie, p) = best?;
    let start_dir = ((tie >> 8) & 3) as usize;
    for k in 0..4 {
        let d = (start_dir + k) & 3;
        let (dx, dy) = DIRS[d];
        if expandable(p.x + dx, p.y + dy) {
            return Some((p, d));
        }
    }
    None
}

fn build_road_spur(
    world: &mut World,
    cfg: &AutoBuildConfig,
    start: Point,
    dir: usize,
    day: i32,
) -> i32 {
    let seed = day_seed(world.seed(), day, SALT_SPUR);
    let hash = hash_coords_32(start.x, start.y, seed);
    let max_len = cfg.max_road_spur_length.max(1);
    let len = 2 + (hash % (max_len.max(2) as u32 - 1)) as i32;
    let level = clamp_road_level(cfg.road_level);

    let (dx, dy) = DIRS[dir & 3];
    let mut placed = 0;
    let (mut x, mut y) = (start.x, start.y);
    for _ in 0..len {
        x += dx;
        y += dy;
        match world.apply_road(x, y, level, cfg.allow_bridges) {
            ToolApplyResult::Applied => placed += 1,
            ToolApplyResult::Noop => {}
            _ => break,
        }
    }
    placed
}

/// Connect the network (or the map center) to the nearest buildable edge
/// tile with a road-building path.
fn ensure_outside_road_connection(
    world: &mut World,
    sim_cfg: &SimConfig,
    cfg: &AutoBuildConfig,
) -> bool {
    if !sim_cfg.require_outside_connection {
        return true;
    }
    let mask = compute_roads_connected_to_edge(world);
    if any_edge_connected(&mask) {
        return true;
    }

    // Prefer an existing road; else the center; else any land tile.
    let (w, h) = (world.width(), world.height());
    let mut start: Option<Point> = None;
    'outer: for y in 0..h {
        for x in 0..w {
            if world.at(x, y).overlay == Overlay::Road {
                start = Some(Point::new(x, y));
                break 'outer;
            }
        }
    }
    if start.is_none() {
        let c = Point::new(w / 2, h / 2);
        if world.is_buildable(c.x, c.y) {
            start = Some(c);
        } else {
            'land: for y in 0..h {
                for x in 0..w {
                    if world.is_buildable(x, y) {
                        start = Some(Point::new(x, y));
                        break 'land;
                    }
                }
            }
        }
    }
    let Some(start) = start else { return false };

    // Closest admissible edge tile.
    let mut goal: Option<(i32, Point)> = None;
    let mut consider = |world: &World, x: i32, y: i32| {
        if !world.in_bounds(x, y) {
            return;
        }
        let t = world.at(x, y);
        if t.terrain == Terrain::Water && !cfg.allow_bridges {
            return;
        }
        let d = (x - start.x).abs() + (y - start.y).abs();
        if goal.map_or(true, |(bd, _)| d < bd) {
            goal = Some((d, Point::new(x, y)));
        }
    };
    for x in 0..w {
        consider(world, x, 0);
        consider(world, x, h - 1);
    }
    for y in 0..h {
        consider(world, 0, y);
        consider(world, w - 1, y);
    }
    let Some((_, goal)) = goal else { return false };

    let path_cfg = RoadBuildPathConfig {
        target_level: clamp_road_level(cfg.road_level),
        allow_bridges: cfg.allow_bridges,
        cost_model: RoadBuildCostModel::NewTiles,
        ..RoadBuildPathConfig::default()
    };
    let Some((path, _)) = find_road_build_path(world, start, goal, &path_cfg) else {
        return false;
    };
    for p in path {
        let r = world.apply_road(p.x, p.y, path_cfg.target_level, cfg.allow_bridges);
        if !matches!(r, ToolApplyResult::Applied | ToolApplyResult::Noop) {
            return false; // could not afford to finish the link
        }
    }
    any_edge_connected(&compute_roads_connected_to_edge(world))
}

/// Upgrade the most overloaded roads, ordered by volume/capacity ratio.
fn upgrade_most_congested_roads(
    world: &mut World,
    sim_cfg: &SimConfig,
    cfg: &AutoBuildConfig,
    road_to_edge: Option<&[u8]>,
    day: i32,
    upgraded: &mut i32,
    failed: &mut i32,
) {
    if *upgraded >= cfg.road_upgrades_per_day {
        return;
    }
    let s = world.stats();
    if s.population <= 0 || s.employed <= 0 {
        return;
    }
    let employed_share = s.employed as f32 / s.population as f32;
    if employed_share <= 0.0 {
        return;
    }

    let tc = TrafficConfig {
        require_outside_connection: sim_cfg.require_outside_connection,
        congestion_aware_routing: true,
        congestion_iterations: 3,
        ..TrafficConfig::default()
    };
    let traffic = compute_commute_traffic(world, &tc, employed_share, road_to_edge);
    if traffic.road_traffic.is_empty() {
        return;
    }

    struct Candidate {
        x: i32,
        y: i32,
        ratio: f32,
        tie: u32,
    }

    let seed = day_seed(world.seed(), day, SALT_UPGRADE);
    let mut candidates: Vec<Candidate> = Vec::new();
    for y in 0..world.height() {
        for x in 0..world.width() {
            let t = world.at(x, y);
            if t.overlay != Overlay::Road || t.level >= 3 {
                continue;
            }
            let v = traffic.road_traffic[world.idx(x, y)];
            if v == 0 {
                continue;
            }
            let cap = road_capacity_for_level(tc.road_tile_capacity, t.level).max(1);
            let ratio = f32::from(v) / cap as f32;
            if ratio < 1.05 {
                continue; // only meaningfully loaded roads
            }
            candidates.push(Candidate {
                x,
                y,
                ratio,
                tie: hash_coords_32(x, y, seed),
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.ratio
            .partial_cmp(&a.ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.tie.cmp(&b.tie))
    });

    for c in candidates {
        if *upgraded >= cfg.road_upgrades_per_day {
            break;
        }
        if world.stats().money <= cfg.min_money_reserve {
            break;
        }
        let next = clamp_road_level(i32::from(world.at(c.x, c.y).level) + 1);
        match world.apply_road(c.x, c.y, next, true) {
            ToolApplyResult::Applied => *upgraded += 1,
            ToolApplyResult::InsufficientFunds => {
                *failed += 1;
                break;
            }
            _ => {}
        }
    }
}

/// Run the bot for `days`, calling `sim.step_once` after each build phase.
/// Daily stats snapshots append to `daily_stats` when provided.
pub fn run_auto_build(
    world: &mut World,
    sim: &mut Simulator,
    cfg: &AutoBuildConfig,
    days: i32,
    mut daily_stats: Option<&mut Vec<Stats>>,
) -> AutoBuildReport {
    let mut report = AutoBuildReport {
        days_requested: days.max(0),
        ..AutoBuildReport::default()
    };
    if days <= 0 {
        return report;
    }

    sim.refresh_derived_stats(world);

    if sim.config().require_outside_connection && cfg.ensure_outside_connection {
        let sim_cfg = sim.config().clone();
        if !ensure_outside_road_connection(world, &sim_cfg, cfg) {
            log::debug!("auto-build: could not establish an outside connection");
        }
    }

    let mut lv = LandValueResult::default();
    let mut last_lv_day = i32::MIN;

    for _ in 0..days {
        let sim_cfg = sim.config().clone();
        let day = world.stats().day;

        let road_to_edge = if sim_cfg.require_outside_connection {
            Some(compute_roads_connected_to_edge(world))
        } else {
            None
        };
        let mask = road_to_edge.as_deref();

        // Refresh the placement land-value field occasionally.
        let stale = lv.value.len() != world.tile_count()
            || cfg.land_value_recalc_days <= 1
            || day - last_lv_day >= cfg.land_value_recalc_days;
        if stale {
            let lvc = LandValueConfig {
                require_outside_connection: sim_cfg.require_outside_connection,
                ..LandValueConfig::default()
            };
            lv = compute_land_value(world, &lvc, None, mask);
            last_lv_day = day;
        }

        let s = *world.stats();
        let can_spend = s.money > cfg.min_money_reserve;

        // Parks when happiness sags or the park ratio lags the zones.
        let zone_tiles = count_zone_tiles(world);
        let want_park = can_spend
            && cfg.parks_per_day > 0
            && (s.happiness < 0.45
                || (zone_tiles > 0 && s.parks * cfg.park_per_zone_tiles < zone_tiles));
        if want_park {
            for _ in 0..cfg.parks_per_day {
                if world.stats().money <= cfg.min_money_reserve {
                    break;
                }
                let Some(p) =
                    pick_best_park_candidate(world, &sim_cfg, cfg, mask, &lv, day)
                else {
                    break;
                };
                match world.apply_tool(Tool::Park, p.x, p.y) {
                    ToolApplyResult::Applied => report.parks_built += 1,
                    ToolApplyResult::InsufficientFunds => {
                        report.failed_builds += 1;
                        break;
                    }
                    _ => report.failed_builds += 1,
                }
            }
        }

        // Zone target from the jobs/housing balance.
        let job_pressure = if s.housing_capacity <= 0 {
            if s.jobs_capacity_accessible > 0 {
                2.0
            } else {
                0.0
            }
        } else {
            s.jobs_capacity_accessible as f32 / s.housing_capacity as f32
        };
        let zone_tool = if job_pressure > 1.10 || s.demand_residential > 0.55 {
            Tool::Residential
        } else if job_pressure < 0.80 {
            if s.goods_satisfaction < 0.80 {
                Tool::Industrial
            } else {
                Tool::Commercial
            }
        } else {
            let mix = hash_coords_32(day, s.population, day_seed(world.seed(), day, SALT_MIX));
            match mix % 10 {
                0..=4 => Tool::Residential,
                5..=7 => Tool::Commercial,
                _ => Tool::Industrial,
            }
        };

        if can_spend && cfg.zones_per_day > 0 {
            for z in 0..cfg.zones_per_day {
                if world.stats().money <= cfg.min_money_reserve {
                    break;
                }
                let Some(p) = pick_best_zone_candidate(
                    world,
                    zone_tool,
                    &sim_cfg,
                    cfg,
                    mask,
                    &lv,
                    day + z,
                ) else {
                    break;
                };
                match world.apply_tool(zone_tool, p.x, p.y) {
                    ToolApplyResult::Applied => report.zones_built += 1,
                    ToolApplyResult::InsufficientFunds => {
                        report.failed_builds += 1;
                        break;
                    }
                    _ => report.failed_builds += 1,
                }
            }
        }

        // Road growth: seed a cross on empty maps, else grow spurs.
        if can_spend && cfg.roads_per_day > 0 {
            for rd in 0..cfg.roads_per_day {
                if world.stats().money <= cfg.min_money_reserve {
                    break;
                }
                if !has_any_road(world) {
                    let (cx, cy) = (world.width() / 2, world.height() / 2);
                    let level = clamp_road_level(cfg.road_level);
                    for &(dx, dy) in [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)].iter() {
                        if world.apply_road(cx + dx, cy + dy, level, cfg.allow_bridges)
                            == ToolApplyResult::Applied
                        {
                            report.roads_built += 1;
                        }
                    }
                    break;
                }
                let Some((start, dir)) =
                    pick_road_expansion_start(world, &sim_cfg, cfg, mask, day + rd)
                else {
                    break;
                };
                let placed = build_road_spur(world, cfg, start, dir, day + rd);
                report.roads_built += placed;
                if placed == 0 {
                    report.failed_builds += 1;
                    break;
                }
            }
        }

        // Congestion-triggered upgrades.
        if cfg.auto_upgrade_roads
            && can_spend
            && s.traffic_congestion >= cfg.congestion_upgrade_threshold
            && cfg.road_upgrades_per_day > 0
        {
            let mut upgraded = 0;
            let mut failed = 0;
            upgrade_most_congested_roads(
                world, &sim_cfg, cfg, mask, day, &mut upgraded, &mut failed,
            );
            report.roads_upgraded += upgraded;
            report.failed_builds += failed;
        }

        sim.step_once(world);
        report.days_simulated += 1;
        if let Some(out) = daily_stats.as_mut() {
            out.push(*world.stats());
        }
    }

    report
}
