//! Goods flow: industrial supply routed along roads to commercial demand,
//! with optional imports and exports through the map edge.
//!
//! Deterministic, tile-based and derived-only; the result is never stored
//! back into the world. Consumers are served in increasing distance order so
//! scarce supply goes to the nearest commercial areas first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grid::{Overlay, RoadLevel, World, DIRS};
use crate::pathfind::{
    compute_roads_connected_to_edge, has_adjacent_road_connected_to_edge,
    pick_adjacent_road_tile,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoodsConfig {
    /// Mirror of the simulator's outside-connection rule.
    pub require_outside_connection: bool,

    /// Unmet commercial demand may be imported from the map edge.
    pub allow_imports: bool,
    /// Import capacity throttle in [0, 100].
    pub import_capacity_pct: i32,

    /// Surplus industrial production may be exported to the map edge.
    pub allow_exports: bool,
    /// Export capacity throttle in [0, 100].
    pub export_capacity_pct: i32,

    /// Scales applied to the base supply (12/level) and demand (8/level).
    pub supply_scale: f32,
    pub demand_scale: f32,
}

impl Default for GoodsConfig {
    fn default() -> Self {
        Self {
            require_outside_connection: true,
            allow_imports: true,
            import_capacity_pct: 100,
            allow_exports: true,
            export_capacity_pct: 100,
            supply_scale: 1.0,
            demand_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GoodsResult {
    /// Per-tile road traffic caused by shipments; non-road tiles are 0.
    pub road_goods_traffic: Vec<u16>,

    /// delivered/demand per commercial tile mapped to 0..255; 255 elsewhere.
    pub commercial_fill: Vec<u8>,

    pub goods_produced: i32,
    pub goods_demand: i32,
    pub goods_delivered: i32,
    pub goods_imported: i32,
    pub goods_exported: i32,
    pub unreachable_demand: i32,

    /// delivered/demand clamped to [0,1]; 1 when demand is 0.
    pub satisfaction: f32,

    pub max_road_goods_traffic: i32,
}

/// Kind of an aggregated origin-destination flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GoodsOdKind {
    Local,
    Import,
    Export,
}

impl GoodsOdKind {
    pub fn name(self) -> &'static str {
        match self {
            GoodsOdKind::Local => "local",
            GoodsOdKind::Import => "import",
            GoodsOdKind::Export => "export",
        }
    }
}

/// Aggregated OD flow between two road access tiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsOdEdge {
    pub src_road_idx: i32,
    pub dst_road_idx: i32,
    pub amount: i32,

    /// Amount-weighted totals; divide by `amount` for means.
    pub total_steps: u64,
    pub total_cost_milli: u64,
    pub min_steps: i32,
    pub max_steps: i32,
    pub min_cost_milli: i32,
    pub max_cost_milli: i32,

    pub kind: GoodsOdKind,
}

/// Optional debug/telemetry output: OD flows aggregated by endpoints.
#[derive(Debug, Clone, Default)]
pub struct GoodsFlowDebug {
    pub w: i32,
    pub h: i32,
    pub od: Vec<GoodsOdEdge>,
}

fn base_industrial_supply(level: u8) -> i32 {
    12 * i32::from(level.clamp(0, 3))
}

fn base_commercial_demand(level: u8) -> i32 {
    8 * i32::from(level.clamp(0, 3))
}

struct Source {
    road_idx: usize,
    remaining: i32,
}

struct Consumer {
    x: i32,
    y: i32,
    road_idx: usize,
    demand: i32,
    dist: i64,
    owner: i32,
}

/// Multi-source BFS over traversable roads with owner labels. Returns
/// (dist, parent, owner); dist/owner are -1 where unreached.
fn owner_bfs(
    world: &World,
    seeds: &[(usize, i32)],
    traversable: &dyn Fn(usize) -> bool,
) -> (Vec<i64>, Vec<i32>, Vec<i32>) {
    let n = world.tile_count();
    let w = world.width() as usize;
    let mut dist = vec![-1i64; n];
    let mut parent = vec![-1i32; n];
    let mut owner = vec![-1i32; n];
    let mut queue: Vec<usize> = Vec::with_capacity(n / 4);

    for &(idx, own) in seeds {
        if dist[idx] == -1 {
            dist[idx] = 0;
            owner[idx] = own;
            queue.push(idx);
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
            owner[nidx] = owner[idx];
            queue.push(nidx);
        }
    }

    (dist, parent, owner)
}

/// Accumulate `amount` along a predecessor chain and return (steps, milli).
fn add_along_parent_chain(
    world: &World,
    traffic: &mut [u16],
    start: usize,
    parent: &[i32],
    amount: i32,
) -> (i32, i64) {
    let mut steps = 0i32;
    let mut milli = 0i64;
    if amount <= 0 {
        return (steps, milli);
    }
    let w = world.width() as usize;
    let mut cur = start as i32;
    let mut guard = 0usize;
    while cur >= 0 && guard <= traffic.len() {
        guard += 1;
        let ui = cur as usize;
        let v = u32::from(traffic[ui]) + amount.max(0) as u32;
        traffic[ui] = v.min(u32::from(u16::MAX)) as u16;
        let next = parent[ui];
        if next >= 0 {
            steps += 1;
            let nx = (next as usize % w) as i32;
            let ny = (next as usize / w) as i32;
            milli += i64::from(RoadLevel::from_level(world.at(nx, ny).level).milli_per_step());
        }
        cur = next;
    }
    (steps, milli)
}

#[derive(Default)]
struct OdAccumulator {
    map: BTreeMap<(i32, i32, GoodsOdKind), GoodsOdEdge>,
}

impl OdAccumulator {
    fn add(&mut self, src: i32, dst: i32, kind: GoodsOdKind, amount: i32, steps: i32, milli: i64) {
        if amount <= 0 {
            return;
        }
        let e = self
            .map
            .entry((src, dst, kind))
            .or_insert_with(|| GoodsOdEdge {
                src_road_idx: src,
                dst_road_idx: dst,
                amount: 0,
                total_steps: 0,
                total_cost_milli: 0,
                min_steps: -1,
                max_steps: -1,
                min_cost_milli: -1,
                max_cost_milli: -1,
                kind,
            });
        e.amount += amount;
        e.total_steps += steps as u64 * amount as u64;
        e.total_cost_milli += milli as u64 * amount as u64;
        let milli32 = milli.min(i64::from(i32::MAX)) as i32;
        e.min_steps = if e.min_steps < 0 { steps } else { e.min_steps.min(steps) };
        e.max_steps = e.max_steps.max(steps);
        e.min_cost_milli = if e.min_cost_milli < 0 {
            milli32
        } else {
            e.min_cost_milli.min(milli32)
        };
        e.max_cost_milli = e.max_cost_milli.max(milli32);
    }
}

/// Compute the current goods flow. Pure and derived; the world is not
/// mutated. Pass `out_debug` to collect aggregated OD edges.
pub fn compute_goods_flow(
    world: &World,
    cfg: &GoodsConfig,
    precomputed_road_to_edge: Option<&[u8]>,
    mut out_debug: Option<&mut GoodsFlowDebug>,
) -> GoodsResult {
    let mut out = GoodsResult::default();
    let (w, h) = (world.width(), world.height());
    if w <= 0 || h <= 0 {
        return out;
    }
    let n = world.tile_count();
    out.road_goods_traffic = vec![0u16; n];
    out.commercial_fill = vec![255u8; n];

    if let Some(dbg) = out_debug.as_deref_mut() {
        dbg.w = w;
        dbg.h = h;
        dbg.od.clear();
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

    // --- Industrial supply, merged per road access tile ---
    let mut supply_per_road = vec![0i32; n];
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            if t.overlay != Overlay::Industrial || !zone_has_access(x, y) {
                continue;
            }
            let Some(road) = pick_adjacent_road_tile(world, mask, x, y) else {
                continue;
            };
            let ridx = world.idx(road.x, road.y);
            if !traversable(ridx) {
                continue;
            }
            let raw = base_industrial_supply(t.level) as f32 * cfg.supply_scale;
            let supply = raw.round().max(0.0) as i32;
            if supply > 0 {
                supply_per_road[ridx] += supply;
                out.goods_produced += supply;
            }
        }
    }

    let mut sources: Vec<Source> = Vec::new();
    for (ridx, &supply) in supply_per_road.iter().enumerate() {
        if supply > 0 && traversable(ridx) {
            sources.push(Source {
                road_idx: ridx,
                remaining: supply,
            });
        }
    }

    // --- Nearest-producer field (owner-labeled BFS) ---
    let producer_seeds: Vec<(usize, i32)> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| (s.road_idx, i as i32))
        .collect();
    let (dist, parent, owner) = owner_bfs(world, &producer_seeds, &traversable);

    // --- Edge field for imports/exports ---
    let mut edge_seeds: Vec<(usize, i32)> = Vec::new();
    {
        let mut push_edge = |x: i32, y: i32| {
            if !world.in_bounds(x, y) {
                return;
            }
            let idx = world.idx(x, y);
            if traversable(idx) && !edge_seeds.iter().any(|&(i, _)| i == idx) {
                edge_seeds.push((idx, 0));
            }
        };
        for x in 0..w {
            push_edge(x, 0);
            if h > 1 {
                push_edge(x, h - 1);
            }
        }
        for y in 1..h - 1 {
            push_edge(0, y);
            if w > 1 {
                push_edge(w - 1, y);
            }
        }
    }
    let (edge_dist, edge_parent, _) = if !edge_seeds.is_empty()
        && (cfg.allow_imports || cfg.allow_exports)
    {
        owner_bfs(world, &edge_seeds, &traversable)
    } else {
        (vec![-1i64; n], vec![-1i32; n], vec![-1i32; n])
    };

    // --- Consumers in increasing distance order ---
    let mut consumers: Vec<Consumer> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let t = world.at(x, y);
            if t.overlay != Overlay::Commercial || !zone_has_access(x, y) {
                continue;
            }
            let raw = base_commercial_demand(t.level) as f32 * cfg.demand_scale;
            let demand = raw.round().max(0.0) as i32;
            if demand <= 0 {
                continue;
            }
            let Some(road) = pick_adjacent_road_tile(world, mask, x, y) else {
                continue;
            };
            let ridx = world.idx(road.x, road.y);
            if !traversable(ridx) {
                continue;
            }
            let d = if sources.is_empty() { -1 } else { dist[ridx] };
            consumers.push(Consumer {
                x,
                y,
                road_idx: ridx,
                demand,
                dist: d,
                owner: if d >= 0 { owner[ridx] } else { -1 },
            });
            out.goods_demand += demand;
        }
    }

    consumers.sort_by(|a, b| {
        let da = if a.dist >= 0 { a.dist } else { i64::MAX };
        let db = if b.dist >= 0 { b.dist } else { i64::MAX };
        da.cmp(&db).then(a.y.cmp(&b.y)).then(a.x.cmp(&b.x))
    });

    let import_pct = cfg.import_capacity_pct.clamp(0, 100);
    let export_pct = cfg.export_capacity_pct.clamp(0, 100);
    let mut od = OdAccumulator::default();

    // --- Allocation ---
    for c in &consumers {
        let mut remaining = c.demand;
        let mut delivered = 0i32;

        // Nearest local producer first.
        if c.owner >= 0 {
            let src = &mut sources[c.owner as usize];
            let give = src.remaining.min(remaining);
            if give > 0 {
                src.remaining -= give;
                remaining -= give;
                delivered += give;
                let src_road = src.road_idx;
                let (steps, milli) = add_along_parent_chain(
                    world,
                    &mut out.road_goods_traffic,
                    c.road_idx,
                    &parent,
                    give,
                );
                od.add(
                    src_road as i32,
                    c.road_idx as i32,
                    GoodsOdKind::Local,
                    give,
                    steps,
                    milli,
                );
            }
        }

        // Imports, throttled by the trade capacity.
        if remaining > 0 && cfg.allow_imports && edge_dist[c.road_idx] >= 0 {
            let allowed = remaining * import_pct / 100;
            if allowed > 0 {
                remaining -= allowed;
                delivered += allowed;
                out.goods_imported += allowed;
                let (steps, milli) = add_along_parent_chain(
                    world,
                    &mut out.road_goods_traffic,
                    c.road_idx,
                    &edge_parent,
                    allowed,
                );
                od.add(
                    -1,
                    c.road_idx as i32,
                    GoodsOdKind::Import,
                    allowed,
                    steps,
                    milli,
                );
            }
        }

        if remaining > 0 {
            out.unreachable_demand += remaining;
        }
        out.goods_delivered += delivered;

        let ratio = if c.demand > 0 {
            (delivered as f32 / c.demand as f32).clamp(0.0, 1.0)
        } else {
            1.0
        };
        out.commercial_fill[world.idx(c.x, c.y)] = (ratio * 255.0).round() as u8;
    }

    // --- Export surplus ---
    if cfg.allow_exports {
        for src in &sources {
            if src.remaining <= 0 || edge_dist[src.road_idx] < 0 {
                continue;
            }
            let exported = src.remaining * export_pct / 100;
            if exported <= 0 {
                continue;
            }
            out.goods_exported += exported;
            let (steps, milli) = add_along_parent_chain(
                world,
                &mut out.road_goods_traffic,
                src.road_idx,
                &edge_parent,
                exported,
            );
            od.add(
                src.road_idx as i32,
                -1,
                GoodsOdKind::Export,
                exported,
                steps,
                milli,
            );
        }
    }

    // --- Post stats ---
    out.satisfaction = if out.goods_demand > 0 {
        (out.goods_delivered as f32 / out.goods_demand as f32).clamp(0.0, 1.0)
    } else {
        1.0
    };
    out.max_road_goods_traffic = out
        .road_goods_traffic
        .iter()
        .map(|&v| i32::from(v))
        .max()
        .unwrap_or(0);

    if let Some(dbg) = out_debug {
        dbg.od = od.map.into_values().collect();
    }

    out
}
