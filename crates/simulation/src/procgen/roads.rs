//! Road skeleton synthesis: hub placement, MST connection, the alternative
//! layout modes, and the arterial hierarchy upgrade pass.

use crate::grid::{Overlay, Terrain, World};
use crate::pathfind::{
    compute_roads_connected_to_edge, find_land_path_astar, find_road_path_astar, Point,
};

use super::{ProcGenConfig, RoadLayout};

/// Low-discrepancy Halton sample in [0, 1).
fn halton(mut i: u32, base: u32) -> f32 {
    let mut f = 1.0f32;
    let mut r = 0.0f32;
    while i > 0 {
        f /= base as f32;
        r += f * (i % base) as f32;
        i /= base;
    }
    r
}

/// Nearest buildable tile to (cx, cy), scanning diamond rings outward in a
/// fixed order. Returns None when no land exists within `max_r`.
fn nearest_land_tile(world: &World, cx: i32, cy: i32, max_r: i32) -> Option<Point> {
    for r in 0..=max_r {
        for dy in -r..=r {
            let span = r - dy.abs();
            for dx in [-span, span] {
                let (x, y) = (cx + dx, cy + dy);
                if world.is_buildable(x, y) {
                    return Some(Point::new(x, y));
                }
                if span == 0 {
                    break;
                }
            }
        }
    }
    None
}

/// Nearest road tile to (cx, cy) by Manhattan distance, ties resolved by
/// (y, x). Linear scan; the generator runs once per world.
fn nearest_road_tile(world: &World, cx: i32, cy: i32) -> Option<Point> {
    let mut best: Option<(i32, Point)> = None;
    for y in 0..world.height() {
        for x in 0..world.width() {
            if world.at(x, y).overlay != Overlay::Road {
                continue;
            }
            let d = (x - cx).abs() + (y - cy).abs();
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, Point::new(x, y)));
            }
        }
    }
    best.map(|(_, p)| p)
}

/// Deterministic hub points on land via Halton sampling.
fn place_hubs(world: &World, count: i32) -> Vec<Point> {
    let (w, h) = (world.width(), world.height());
    let mut hubs: Vec<Point> = Vec::new();
    let count = count.max(0);
    let max_attempts = (count * 8).max(8) as u32;

    for i in 1..=max_attempts {
        if hubs.len() as i32 >= count {
            break;
        }
        let cx = (halton(i, 2) * w as f32) as i32;
        let cy = (halton(i, 3) * h as f32) as i32;
        let Some(p) = nearest_land_tile(world, cx.min(w - 1), cy.min(h - 1), 12) else {
            continue;
        };
        let too_close = hubs
            .iter()
            .any(|q| (q.x - p.x).abs() + (q.y - p.y).abs() < 4);
        if !too_close {
            hubs.push(p);
        }
    }
    hubs
}

fn set_road_keep_level(world: &mut World, x: i32, y: i32) {
    if world.in_bounds(x, y) && world.at(x, y).overlay != Overlay::Road {
        world.set_road(x, y);
    }
}

/// Materialize a land path between two points into road tiles.
fn materialize_edge(world: &mut World, a: Point, b: Point) {
    if let Some((path, _)) = find_land_path_astar(world, a, b) {
        for p in path {
            set_road_keep_level(world, p.x, p.y);
        }
    }
}

/// Hub skeleton: minimum spanning tree plus a few redundant connections.
fn build_organic(world: &mut World, cfg: &ProcGenConfig) {
    let hubs = place_hubs(world, cfg.hubs);
    if hubs.len() < 2 {
        if let Some(p) = hubs.first() {
            set_road_keep_level(world, p.x, p.y);
        }
        return;
    }

    let dist = |a: Point, b: Point| (a.x - b.x).abs() + (a.y - b.y).abs();

    // Prim's MST over the hub graph, ties resolved by (i, j).
    let mut in_tree = vec![false; hubs.len()];
    in_tree[0] = true;
    let mut tree_edges: Vec<(usize, usize)> = Vec::with_capacity(hubs.len() - 1);
    for _ in 1..hubs.len() {
        let mut best: Option<(i32, usize, usize)> = None;
        for i in 0..hubs.len() {
            if !in_tree[i] {
                continue;
            }
            for j in 0..hubs.len() {
                if in_tree[j] {
                    continue;
                }
                let d = dist(hubs[i], hubs[j]);
                if best.map_or(true, |(bd, bi, bj)| (d, i, j) < (bd, bi, bj)) {
                    best = Some((d, i, j));
                }
            }
        }
        let Some((_, i, j)) = best else { break };
        in_tree[j] = true;
        tree_edges.push((i, j));
    }

    // Extra connections: the shortest unused hub pairs.
    let mut extras: Vec<(i32, usize, usize)> = Vec::new();
    for i in 0..hubs.len() {
        for j in (i + 1)..hubs.len() {
            let in_mst = tree_edges
                .iter()
                .any(|&(a, b)| (a, b) == (i, j) || (a, b) == (j, i));
            if !in_mst {
                extras.push((dist(hubs[i], hubs[j]), i, j));
            }
        }
    }
    extras.sort();
    extras.truncate(cfg.extra_connections.max(0) as usize);

    for &(i, j) in tree_edges.iter() {
        materialize_edge(world, hubs[i], hubs[j]);
    }
    for &(_, i, j) in extras.iter() {
        materialize_edge(world, hubs[i], hubs[j]);
    }
}

const GRID_SPACING: i32 = 8;

/// Axis-aligned lattice over land.
fn build_grid(world: &mut World) {
    let (w, h) = (world.width(), world.height());
    let mut y = GRID_SPACING / 2;
    while y < h {
        for x in 0..w {
            if world.is_buildable(x, y) {
                set_road_keep_level(world, x, y);
            }
        }
        y += GRID_SPACING;
    }
    let mut x = GRID_SPACING / 2;
    while x < w {
        for y in 0..h {
            if world.is_buildable(x, y) {
                set_road_keep_level(world, x, y);
            }
        }
        x += GRID_SPACING;
    }
}

const RING_SPACING: i32 = 7;

/// Concentric diamond rings plus eight spokes from the map center.
fn build_radial(world: &mut World) {
    let (w, h) = (world.width(), world.height());
    let Some(center) = nearest_land_tile(world, w / 2, h / 2, w.max(h)) else {
        return;
    };

    let max_r = w.min(h) / 2 - 1;
    let mut r = RING_SPACING;
    while r <= max_r {
        for dy in -r..=r {
            let span = r - dy.abs();
            for dx in [-span, span] {
                let (x, y) = (center.x + dx, center.y + dy);
                if world.is_buildable(x, y) {
                    set_road_keep_level(world, x, y);
                }
                if span == 0 {
                    break;
                }
            }
        }
        r += RING_SPACING;
    }

    // Spokes: four cardinals and four staircase diagonals, stopping at water.
    const SPOKES: [(i32, i32); 8] = [
        (0, -1),
        (1, -1),
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
    ];
    for &(sx, sy) in SPOKES.iter() {
        let (mut x, mut y) = (center.x, center.y);
        let mut flip = false;
        loop {
            // Diagonals advance one axis at a time so the road stays 4-connected.
            if sx != 0 && sy != 0 {
                if flip {
                    x += sx;
                } else {
                    y += sy;
                }
                flip = !flip;
            } else {
                x += sx;
                y += sy;
            }
            if !world.in_bounds(x, y) || world.at(x, y).terrain == Terrain::Water {
                break;
            }
            set_road_keep_level(world, x, y);
        }
    }
}

/// Space colonization: grow from the hubs toward attractors sampled where
/// the terrain curves the most.
fn build_space_colonization(world: &mut World, cfg: &ProcGenConfig) {
    let (w, h) = (world.width(), world.height());
    let hubs = place_hubs(world, cfg.hubs.max(1));
    if hubs.is_empty() {
        return;
    }
    for p in &hubs {
        set_road_keep_level(world, p.x, p.y);
    }

    // Curvature: absolute deviation from the 4-neighbor mean height.
    let mut scored: Vec<(f32, usize)> = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            if !world.is_buildable(x, y) {
                continue;
            }
            let here = world.at(x, y).height;
            let mean = (world.at(x, y - 1).height
                + world.at(x + 1, y).height
                + world.at(x, y + 1).height
                + world.at(x - 1, y).height)
                / 4.0;
            scored.push(((here - mean).abs(), world.idx(x, y)));
        }
    }
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let target = (cfg.hubs.max(1) * 6) as usize;
    let mut attractors: Vec<Point> = Vec::with_capacity(target);
    for &(_, idx) in scored.iter() {
        if attractors.len() >= target {
            break;
        }
        let p = Point::new((idx % w as usize) as i32, (idx / w as usize) as i32);
        let too_close = attractors
            .iter()
            .any(|q| (q.x - p.x).abs() + (q.y - p.y).abs() < 6);
        if !too_close {
            attractors.push(p);
        }
    }

    for a in attractors {
        let Some(from) = nearest_road_tile(world, a.x, a.y) else {
            break;
        };
        materialize_edge(world, from, a);
    }
}

/// Make sure the network reaches the map border so the classic outside-
/// connection rule can be satisfied. Links the road tile closest to a
/// border with the closest buildable border tile.
fn ensure_edge_link(world: &mut World) {
    let (w, h) = (world.width(), world.height());
    let mask = compute_roads_connected_to_edge(world);
    if mask.iter().any(|&m| m == 1) {
        return;
    }

    // Road tile nearest to any border.
    let mut best: Option<(i32, Point)> = None;
    for y in 0..h {
        for x in 0..w {
            if world.at(x, y).overlay != Overlay::Road {
                continue;
            }
            let d = x.min(w - 1 - x).min(y).min(h - 1 - y);
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, Point::new(x, y)));
            }
        }
    }
    let Some((_, from)) = best else { return };

    // Closest buildable border tile.
    let mut target: Option<(i32, Point)> = None;
    let mut consider = |world: &World, x: i32, y: i32| {
        if !world.is_buildable(x, y) {
            return;
        }
        let d = (x - from.x).abs() + (y - from.y).abs();
        if target.map_or(true, |(bd, _)| d < bd) {
            target = Some((d, Point::new(x, y)));
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
    if let Some((_, to)) = target {
        materialize_edge(world, from, to);
    }
}

/// Upgrade heavily used arteries to avenue/highway class, proportional to
/// the hierarchy strength.
fn upgrade_hierarchy(world: &mut World, cfg: &ProcGenConfig) {
    let strength = cfg.road_hierarchy_strength.clamp(0.0, 3.0);
    if strength <= 0.0 {
        return;
    }
    let (w, h) = (world.width(), world.height());

    // Deterministic probe points snapped to the road network.
    let mut probes: Vec<Point> = Vec::new();
    for i in 1..=24u32 {
        if probes.len() >= 12 {
            break;
        }
        let cx = ((halton(i, 2) * w as f32) as i32).min(w - 1);
        let cy = ((halton(i, 3) * h as f32) as i32).min(h - 1);
        let Some(p) = nearest_road_tile(world, cx, cy) else {
            return;
        };
        if !probes.contains(&p) {
            probes.push(p);
        }
    }
    if probes.len() < 2 {
        return;
    }

    // Betweenness proxy: count shortest-path traversals between probe pairs.
    let mut usage = vec![0u32; world.tile_count()];
    for i in 0..probes.len() {
        for j in (i + 1)..probes.len() {
            if let Some((path, _)) = find_road_path_astar(world, probes[i], probes[j]) {
                for p in path {
                    usage[world.idx(p.x, p.y)] += 1;
                }
            }
        }
    }

    let mut ranked: Vec<(u32, usize)> = usage
        .iter()
        .enumerate()
        .filter(|&(_, &u)| u > 0)
        .map(|(i, &u)| (u, i))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let n = ranked.len() as f32;
    let highways = (n * 0.05 * strength) as usize;
    let avenues = (n * 0.15 * strength) as usize;
    for (rank, &(_, idx)) in ranked.iter().enumerate() {
        let x = (idx % w as usize) as i32;
        let y = (idx / w as usize) as i32;
        if rank < highways {
            world.at_mut(x, y).level = 3;
        } else if rank < highways + avenues {
            world.at_mut(x, y).level = 2;
        } else {
            break;
        }
    }
}

/// Build the road network for the configured layout, then optionally
/// upgrade arteries.
pub fn build_road_network(world: &mut World, cfg: &ProcGenConfig) {
    if world.width() < 2 || world.height() < 2 {
        return;
    }
    match cfg.road_layout {
        RoadLayout::Organic => build_organic(world, cfg),
        RoadLayout::Grid => build_grid(world),
        RoadLayout::Radial => build_radial(world),
        RoadLayout::SpaceColonization => build_space_colonization(world, cfg),
    }
    ensure_edge_link(world);
    if cfg.road_hierarchy_enabled {
        upgrade_hierarchy(world, cfg);
    }
}
