//! Commute traffic assignment over the road grid.
//!
//! The model assigns residential commuters to their nearest reachable job
//! access point. Free-flow assignment uses a multi-source BFS predecessor
//! tree; the optional congestion-aware mode rebuilds a shortest-travel-time
//! tree per pass with BPR per-tile times and blends flows with the method of
//! successive averages, which spreads commuters across alternate routes.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::grid::{road_capacity_for_level, Overlay, RoadLevel, World, DIRS};
use crate::pathfind::{
    compute_roads_connected_to_edge, has_adjacent_road_connected_to_edge,
    pick_adjacent_road_tile,
};
use crate::rng::{hash_coords_32, hash_to_unit, seed_mix32};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficConfig {
    /// Only road components touching the map edge are usable when set.
    pub require_outside_connection: bool,

    /// Soft capacity per street tile for the congestion metric; higher road
    /// classes multiply it.
    pub road_tile_capacity: i32,

    pub include_commercial_jobs: bool,
    pub include_industrial_jobs: bool,

    /// Incremental BPR + MSA assignment instead of pure shortest paths.
    pub congestion_aware_routing: bool,
    /// Assignment passes (>= 1); more passes approach equilibrium.
    pub congestion_iterations: i32,

    // BPR curve: t = t0 * (1 + alpha * (v/c)^beta).
    pub congestion_alpha: f32,
    pub congestion_beta: f32,
    /// Scales the capacity used for congestion costs (1.0 = true capacity).
    pub congestion_capacity_scale: f32,
    /// Clamp on v/c to keep integer path costs bounded.
    pub congestion_ratio_clamp: f32,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            require_outside_connection: true,
            road_tile_capacity: 28,
            include_commercial_jobs: true,
            include_industrial_jobs: true,
            congestion_aware_routing: false,
            congestion_iterations: 4,
            congestion_alpha: 0.15,
            congestion_beta: 4.0,
            congestion_capacity_scale: 1.0,
            congestion_ratio_clamp: 3.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrafficResult {
    /// Per-tile commuter counts; non-road tiles are always 0.
    pub road_traffic: Vec<u16>,

    pub total_commuters: i32,
    pub reachable_commuters: i32,
    pub unreachable_commuters: i32,

    /// Commuter-weighted, in road steps along the chosen routes.
    pub avg_commute: f32,
    pub p95_commute: f32,

    /// Commuter-weighted, in street-step-equivalent travel time (a street
    /// step is 1.0); faster road classes lower this but not `avg_commute`.
    pub avg_commute_time: f32,
    pub p95_commute_time: f32,

    /// 0..1 ratio of traffic above capacity.
    pub congestion: f32,
    pub congested_road_tiles: i32,
    pub max_traffic: i32,

    pub used_congestion_aware_routing: bool,
    pub routing_passes: i32,
}

struct Origin {
    road_idx: usize,
    commuters: i32,
}

/// One routed origin: (steps, free-flow milli time, commuters).
type Sample = (i32, i64, i32);

struct Assignment {
    flow: Vec<f64>,
    samples: Vec<Sample>,
    reachable: i32,
    unreachable: i32,
}

fn free_milli(world: &World, idx: usize) -> i64 {
    let w = world.width() as usize;
    let x = (idx % w) as i32;
    let y = (idx / w) as i32;
    i64::from(RoadLevel::from_level(world.at(x, y).level).milli_per_step())
}

/// Route every origin down the predecessor tree, accumulating per-tile flow
/// and per-origin route metrics.
fn assign_routes(world: &World, origins: &[Origin], dist: &[i64], parent: &[i32]) -> Assignment {
    let n = dist.len();
    let mut out = Assignment {
        flow: vec![0.0; n],
        samples: Vec::with_capacity(origins.len()),
        reachable: 0,
        unreachable: 0,
    };

    for o in origins {
        if dist[o.road_idx] < 0 {
            out.unreachable += o.commuters;
            continue;
        }
        out.reachable += o.commuters;

        let mut steps = 0i32;
        let mut milli = 0i64;
        let mut cur = o.road_idx as i32;
        let mut guard = 0usize;
        while cur >= 0 && guard <= n {
            guard += 1;
            let ui = cur as usize;
            out.flow[ui] += f64::from(o.commuters);
            let next = parent[ui];
            if next >= 0 {
                steps += 1;
                // Entering the next tile toward the sink.
                milli += free_milli(world, next as usize);
            }
            cur = next;
        }
        out.samples.push((steps, milli, o.commuters));
    }

    out
}

/// Multi-source BFS tree from the sink access tiles (uniform step costs).
fn bfs_tree(
    world: &World,
    sinks: &[usize],
    traversable: &dyn Fn(usize) -> bool,
) -> (Vec<i64>, Vec<i32>) {
    let n = world.tile_count();
    let w = world.width() as usize;
    let mut dist = vec![-1i64; n];
    let mut parent = vec![-1i32; n];
    let mut queue: Vec<usize> = Vec::with_capacity(n / 2);

    for &s in sinks {
        if dist[s] == -1 {
            dist[s] = 0;
            parent[s] = -1;
            queue.push(s);
        }
    }

    let mut head = 0usize;
    while head < queue.len() {
        let idx = queue[head];
        head += 1;
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
            parent[nidx] = idx as i32;
            queue.push(nidx);
        }
    }

    (dist, parent)
}

/// BPR travel time for entering one road tile, in milli street-steps.
fn bpr_entry_milli(world: &World, idx: usize, flow: f64, cfg: &TrafficConfig) -> i64 {
    let w = world.width() as usize;
    let x = (idx % w) as i32;
    let y = (idx / w) as i32;
    let level = world.at(x, y).level;
    let free = RoadLevel::from_level(level).milli_per_step() as f32;
    let cap = (road_capacity_for_level(cfg.road_tile_capacity.max(1), level) as f32
        * cfg.congestion_capacity_scale)
        .max(1.0);
    let ratio = ((flow as f32) / cap).clamp(0.0, cfg.congestion_ratio_clamp.max(0.0));
    let t = free * (1.0 + cfg.congestion_alpha * ratio.powf(cfg.congestion_beta));
    t.round() as i64
}

/// Multi-source Dijkstra tree from the sinks under BPR travel times.
///
/// The heap orders by (cost, tile index) so equal-cost expansions settle in
/// a fixed order.
fn travel_time_tree(
    world: &World,
    sinks: &[usize],
    flow: &[f64],
    cfg: &TrafficConfig,
    traversable: &dyn Fn(usize) -> bool,
) -> (Vec<i64>, Vec<i32>) {
    let n = world.tile_count();
    let w = world.width() as usize;
    let mut dist = vec![-1i64; n];
    let mut parent = vec![-1i32; n];
    let mut settled = vec![false; n];
    let mut heap: BinaryHeap<Reverse<(i64, usize)>> = BinaryHeap::new();

    for &s in sinks {
        if dist[s] == -1 {
            dist[s] = 0;
            heap.push(Reverse((0, s)));
        }
    }

    while let Some(Reverse((cost, idx))) = heap.pop() {
        if settled[idx] || cost != dist[idx] {
            continue;
        }
        settled[idx] = true;

        let entry = bpr_entry_milli(world, idx, flow[idx], cfg);
        let x = (idx % w) as i32;
        let y = (idx / w) as i32;
        for &(dx, dy) in DIRS.iter() {
            let (nx, ny) = (x + dx, y + dy);
            if !world.in_bounds(nx, ny) {
                continue;
            }
            let nidx = world.idx(nx, ny);
            if settled[nidx] || !traversable(nidx) {
                continue;
            }
            // Stepping from the neighbor into this tile on the way to a sink.
            let cand = cost + entry;
            if dist[nidx] == -1 || cand < dist[nidx] {
                dist[nidx] = cand;
                parent[nidx] = idx as i32;
                heap.push(Reverse((cand, nidx)));
            }
        }
    }

    (dist, parent)
}

/// Weighted 95th percentile of `(value, weight)` samples.
fn weighted_p95(samples: &mut [(i64, i32)], total: i32) -> f32 {
    if total <= 0 || samples.is_empty() {
        return 0.0;
    }
    samples.sort_unstable();
    let target = (f64::from(total) * 0.95).ceil() as i64;
    let mut accum = 0i64;
    let mut p95 = 0i64;
    for &(v, c) in samples.iter() {
        accum += i64::from(c);
        p95 = v;
        if accum >= target {
            break;
        }
    }
    p95 as f32
}

/// Compute the commute traffic heatmap and aggregate metrics.
///
/// `employed_share` is the fraction of residents that commute (employment
/// rate net of transit mode share). A precomputed road-to-edge mask can be
/// passed to avoid recomputation; it is validated against the world size.
pub fn compute_commute_traffic(
    world: &World,
    cfg: &TrafficConfig,
    employed_share: f32,
    precomputed_road_to_edge: Option<&[u8]>,
) -> TrafficResult {
    let mut r = TrafficResult::default();
    let (w, h) = (world.width(), world.height());
    if w <= 0 || h <= 0 {
        return r;
    }
    let n = world.tile_count();
    r.road_traffic = vec![0u16; n];

    let employed_share = employed_share.clamp(0.0, 1.0);
    if employed_share <= 0.0 {
        return r;
    }

    // Outside-connection mask.
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

    // --- Job access points (the BFS/Dijkstra sources) ---
    let mut is_sink = vec![false; n];
    let mut sinks: Vec<usize> = Vec::with_capacity(n / 16);
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            let wanted = match t.overlay {
                Overlay::Commercial => cfg.include_commercial_jobs,
                Overlay::Industrial => cfg.include_industrial_jobs,
                _ => false,
            };
            if !wanted || !zone_has_access(x, y) {
                continue;
            }
            for &(dx, dy) in DIRS.iter() {
                let (rx, ry) = (x + dx, y + dy);
                if !world.in_bounds(rx, ry) {
                    continue;
                }
                let idx = world.idx(rx, ry);
                if traversable(idx) && !is_sink[idx] {
                    is_sink[idx] = true;
                    sinks.push(idx);
                }
            }
        }
    }

    // --- Residential origins with dithered commuter counts ---
    let mix = seed_mix32(world.seed());
    let mut origins: Vec<Origin> = Vec::with_capacity(n / 16);
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            if t.overlay != Overlay::Residential || t.occupants == 0 {
                continue;
            }
            if !zone_has_access(x, y) {
                continue;
            }
            let Some(road) = pick_adjacent_road_tile(world, mask, x, y) else {
                continue;
            };

            let desired = f32::from(t.occupants) * employed_share;
            let mut commuters = desired.floor() as i32;
            let frac = desired - commuters as f32;
            if frac > 0.0 && commuters < i32::from(t.occupants) {
                // Deterministic Bernoulli dithering keeps totals unbiased
                // without introducing run-to-run noise.
                let u = hash_to_unit(hash_coords_32(x, y, mix));
                if u < frac {
                    commuters += 1;
                }
            }
            let commuters = commuters.clamp(0, i32::from(t.occupants));
            if commuters <= 0 {
                continue;
            }
            r.total_commuters += commuters;
            origins.push(Origin {
                road_idx: world.idx(road.x, road.y),
                commuters,
            });
        }
    }

    if r.total_commuters == 0 {
        return r;
    }
    if sinks.is_empty() {
        r.unreachable_commuters = r.total_commuters;
        return r;
    }

    // --- Pass 1: free-flow assignment on the BFS tree ---
    let (dist, parent) = bfs_tree(world, &sinks, &traversable);
    let mut assignment = assign_routes(world, &origins, &dist, &parent);
    let mut flow = assignment.flow.clone();

    // --- Congestion-aware refinement (BPR travel times + MSA blending) ---
    let mut passes = 1;
    if cfg.congestion_aware_routing && cfg.congestion_iterations > 1 {
        for pass in 2..=cfg.congestion_iterations {
            let (tdist, tparent) = travel_time_tree(world, &sinks, &flow, cfg, &traversable);
            assignment = assign_routes(world, &origins, &tdist, &tparent);
            let step = 1.0 / f64::from(pass);
            for i in 0..flow.len() {
                flow[i] += (assignment.flow[i] - flow[i]) * step;
            }
            passes = pass;
        }
    }

    r.used_congestion_aware_routing = cfg.congestion_aware_routing && passes > 1;
    r.routing_passes = passes;
    r.reachable_commuters = assignment.reachable;
    r.unreachable_commuters = assignment.unreachable;

    // --- Publish per-tile flows (saturating u16) ---
    for (i, &f) in flow.iter().enumerate() {
        let v = f.round().max(0.0) as u32;
        r.road_traffic[i] = v.min(u32::from(u16::MAX)) as u16;
        r.max_traffic = r.max_traffic.max(r.road_traffic[i] as i32);
    }

    // --- Route metrics from the final assignment ---
    if assignment.reachable > 0 {
        let mut sum_steps = 0i64;
        let mut sum_milli = 0i64;
        for &(steps, milli, commuters) in &assignment.samples {
            sum_steps += i64::from(steps) * i64::from(commuters);
            sum_milli += milli * i64::from(commuters);
        }
        let reach = f64::from(assignment.reachable);
        r.avg_commute = (sum_steps as f64 / reach) as f32;
        r.avg_commute_time = (sum_milli as f64 / reach / 1000.0) as f32;

        let mut step_samples: Vec<(i64, i32)> = assignment
            .samples
            .iter()
            .map(|&(s, _, c)| (i64::from(s), c))
            .collect();
        r.p95_commute = weighted_p95(&mut step_samples, assignment.reachable);

        let mut time_samples: Vec<(i64, i32)> = assignment
            .samples
            .iter()
            .map(|&(_, m, c)| (m, c))
            .collect();
        r.p95_commute_time = weighted_p95(&mut time_samples, assignment.reachable) / 1000.0;
    }

    // --- Congestion metric over the published flows ---
    let mut total_traffic = 0u64;
    let mut over = 0u64;
    for (i, &tv) in r.road_traffic.iter().enumerate() {
        if tv == 0 {
            continue;
        }
        let x = (i % w as usize) as i32;
        let y = (i / w as usize) as i32;
        let cap = road_capacity_for_level(cfg.road_tile_capacity.max(0), world.at(x, y).level);
        total_traffic += u64::from(tv);
        if i64::from(tv) > i64::from(cap) {
            over += (i64::from(tv) - i64::from(cap)) as u64;
            r.congested_road_tiles += 1;
        }
    }
    if total_traffic > 0 {
        r.congestion = ((over as f64) / (total_traffic as f64)).clamp(0.0, 1.0) as f32;
    }

    r
}
