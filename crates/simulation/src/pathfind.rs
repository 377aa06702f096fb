//! Grid pathfinding primitives shared by the generator, the simulator and
//! the analysis passes.
//!
//! Everything here operates on the 4-neighborhood with the engine-wide
//! expansion order N, E, S, W; that order is part of the determinism
//! contract, not a style choice.

use pathfinding::prelude::{astar, dijkstra};
use serde::{Deserialize, Serialize};

use crate::grid::{Overlay, Terrain, World, DIRS};

/// Sentinel distance for unreachable tiles in distance fields.
pub const DIST_INF: i32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Multi-source BFS marking every road tile connected to the map border.
///
/// The returned mask has `1` for road tiles in an edge-connected component
/// and `0` everywhere else (non-road tiles are always 0).
pub fn compute_roads_connected_to_edge(world: &World) -> Vec<u8> {
    let (w, h) = (world.width(), world.height());
    let n = world.tile_count();
    let mut mask = vec![0u8; n];
    if w <= 0 || h <= 0 {
        return mask;
    }

    let mut queue: Vec<usize> = Vec::with_capacity(n / 4);
    let push = |world: &World, mask: &mut Vec<u8>, queue: &mut Vec<usize>, x: i32, y: i32| {
        if !world.in_bounds(x, y) || world.at(x, y).overlay != Overlay::Road {
            return;
        }
        let idx = world.idx(x, y);
        if mask[idx] == 0 {
            mask[idx] = 1;
            queue.push(idx);
        }
    };

    // Seed with border roads in a fixed order.
    for x in 0..w {
        push(world, &mut mask, &mut queue, x, 0);
        if h > 1 {
            push(world, &mut mask, &mut queue, x, h - 1);
        }
    }
    for y in 1..h - 1 {
        push(world, &mut mask, &mut queue, 0, y);
        if w > 1 {
            push(world, &mut mask, &mut queue, w - 1, y);
        }
    }

    let mut head = 0usize;
    while head < queue.len() {
        let idx = queue[head];
        head += 1;
        let x = (idx % w as usize) as i32;
        let y = (idx / w as usize) as i32;
        for &(dx, dy) in DIRS.iter() {
            push(world, &mut mask, &mut queue, x + dx, y + dy);
        }
    }

    mask
}

/// True when (x, y) has an adjacent road tile marked in the edge mask.
pub fn has_adjacent_road_connected_to_edge(
    world: &World,
    road_to_edge: &[u8],
    x: i32,
    y: i32,
) -> bool {
    DIRS.iter().any(|&(dx, dy)| {
        let (nx, ny) = (x + dx, y + dy);
        world.in_bounds(nx, ny)
            && world.at(nx, ny).overlay == Overlay::Road
            && road_to_edge.get(world.idx(nx, ny)).copied() == Some(1)
    })
}

/// Deterministically pick the road access tile for (x, y): the first road
/// neighbor in N, E, S, W order, filtered by the edge mask when provided.
pub fn pick_adjacent_road_tile(
    world: &World,
    road_to_edge: Option<&[u8]>,
    x: i32,
    y: i32,
) -> Option<Point> {
    for &(dx, dy) in DIRS.iter() {
        let (nx, ny) = (x + dx, y + dy);
        if !world.in_bounds(nx, ny) || world.at(nx, ny).overlay != Overlay::Road {
            continue;
        }
        if let Some(mask) = road_to_edge {
            if mask.get(world.idx(nx, ny)).copied() != Some(1) {
                continue;
            }
        }
        return Some(Point::new(nx, ny));
    }
    None
}

fn manhattan(a: Point, b: Point) -> u32 {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}

fn neighbors_where<F>(world: &World, p: Point, admit: F) -> Vec<(Point, u32)>
where
    F: Fn(&World, i32, i32) -> bool,
{
    let mut out = Vec::with_capacity(4);
    for &(dx, dy) in DIRS.iter() {
        let (nx, ny) = (p.x + dx, p.y + dy);
        if world.in_bounds(nx, ny) && admit(world, nx, ny) {
            out.push((Point::new(nx, ny), 1));
        }
    }
    out
}

/// Shortest path along road tiles. The path includes start and goal; the
/// cost is the number of steps (edges).
pub fn find_road_path_astar(world: &World, start: Point, goal: Point) -> Option<(Vec<Point>, i32)> {
    let is_road =
        |world: &World, x: i32, y: i32| world.at(x, y).overlay == Overlay::Road;
    if !world.in_bounds(start.x, start.y) || !world.in_bounds(goal.x, goal.y) {
        return None;
    }
    if !is_road(world, start.x, start.y) || !is_road(world, goal.x, goal.y) {
        return None;
    }
    astar(
        &start,
        |&p| neighbors_where(world, p, is_road),
        |&p| manhattan(p, goal),
        |&p| p == goal,
    )
    .map(|(path, cost)| (path, cost as i32))
}

/// Shortest road path from `start` to any road tile on the map border.
pub fn find_road_path_to_edge(world: &World, start: Point) -> Option<(Vec<Point>, i32)> {
    let (w, h) = (world.width(), world.height());
    if !world.in_bounds(start.x, start.y) || world.at(start.x, start.y).overlay != Overlay::Road {
        return None;
    }
    let is_road =
        |world: &World, x: i32, y: i32| world.at(x, y).overlay == Overlay::Road;
    let edge_dist = |p: Point| -> u32 {
        let dx = p.x.min(w - 1 - p.x);
        let dy = p.y.min(h - 1 - p.y);
        dx.min(dy).max(0) as u32
    };
    astar(
        &start,
        |&p| neighbors_where(world, p, is_road),
        |&p| edge_dist(p),
        |&p| p.x == 0 || p.y == 0 || p.x == w - 1 || p.y == h - 1,
    )
    .map(|(path, cost)| (path, cost as i32))
}

/// Shortest path over buildable (non-water) tiles. Used by the generator to
/// route road edges around lakes.
pub fn find_land_path_astar(world: &World, start: Point, goal: Point) -> Option<(Vec<Point>, i32)> {
    let is_land =
        |world: &World, x: i32, y: i32| world.at(x, y).terrain != Terrain::Water;
    if !world.in_bounds(start.x, start.y) || !world.in_bounds(goal.x, goal.y) {
        return None;
    }
    if !is_land(world, start.x, start.y) || !is_land(world, goal.x, goal.y) {
        return None;
    }
    astar(
        &start,
        |&p| neighbors_where(world, p, is_land),
        |&p| manhattan(p, goal),
        |&p| p == goal,
    )
    .map(|(path, cost)| (path, cost as i32))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadBuildCostModel {
    /// Charge 1 per tile that is not already a road (ties broken by length).
    NewTiles,
    /// Charge money: build cost per tile, minus a refund on existing roads.
    Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadBuildPathConfig {
    pub target_level: u8,
    pub allow_bridges: bool,
    pub cost_model: RoadBuildCostModel,
    /// Money cost per bridge tile is `bridge_cost * target_level`.
    pub bridge_cost: i32,
    /// Money refunded per existing road tile reused by the path.
    pub existing_road_refund: i32,
}

impl Default for RoadBuildPathConfig {
    fn default() -> Self {
        Self {
            target_level: 1,
            allow_bridges: false,
            cost_model: RoadBuildCostModel::NewTiles,
            bridge_cost: 3,
            existing_road_refund: 1,
        }
    }
}

// Scale keeping (build cost, length) lexicographic inside a single u64 cost.
const BUILD_COST_SCALE: u64 = 1_000_000;

fn road_build_admissible(world: &World, x: i32, y: i32, allow_bridges: bool) -> bool {
    let t = world.at(x, y);
    if t.terrain == Terrain::Water && !allow_bridges {
        return false;
    }
    matches!(t.overlay, Overlay::None | Overlay::Road)
}

fn road_build_tile_cost(world: &World, x: i32, y: i32, cfg: &RoadBuildPathConfig) -> u64 {
    let t = world.at(x, y);
    match cfg.cost_model {
        RoadBuildCostModel::NewTiles => {
            if t.overlay == Overlay::Road {
                0
            } else {
                1
            }
        }
        RoadBuildCostModel::Money => {
            let level = i64::from(cfg.target_level);
            let c = if t.overlay == Overlay::Road {
                level - i64::from(cfg.existing_road_refund)
            } else if t.terrain == Terrain::Water {
                i64::from(cfg.bridge_cost) * level
            } else {
                level
            };
            c.max(0) as u64
        }
    }
}

/// Cheapest road-building path between two tiles.
///
/// The path is restricted to tiles where a road can exist (empty or already
/// road; water only with bridges). The reported cost is in the units of the
/// cost model: new tiles for `NewTiles`, money for `Money`.
pub fn find_road_build_path(
    world: &World,
    start: Point,
    goal: Point,
    cfg: &RoadBuildPathConfig,
) -> Option<(Vec<Point>, i32)> {
    if !world.in_bounds(start.x, start.y) || !world.in_bounds(goal.x, goal.y) {
        return None;
    }
    if !road_build_admissible(world, start.x, start.y, cfg.allow_bridges)
        || !road_build_admissible(world, goal.x, goal.y, cfg.allow_bridges)
    {
        return None;
    }

    let successors = |&p: &Point| {
        let mut out: Vec<(Point, u64)> = Vec::with_capacity(4);
        for &(dx, dy) in DIRS.iter() {
            let (nx, ny) = (p.x + dx, p.y + dy);
            if !world.in_bounds(nx, ny) || !road_build_admissible(world, nx, ny, cfg.allow_bridges)
            {
                continue;
            }
            let cost = road_build_tile_cost(world, nx, ny, cfg) * BUILD_COST_SCALE + 1;
            out.push((Point::new(nx, ny), cost));
        }
        out
    };

    let (path, _) = dijkstra(&start, successors, |&p| p == goal)?;

    // Report the model cost over the whole path, including the start tile.
    let total: u64 = path
        .iter()
        .map(|p| road_build_tile_cost(world, p.x, p.y, cfg))
        .sum();
    Some((path, total as i32))
}

/// Multi-source BFS distance field over the whole grid, capped at
/// `max_dist`. Water blocks expansion when `block_water` is set. Unreached
/// tiles hold [`DIST_INF`].
pub fn multi_source_distance_field(
    world: &World,
    sources: &[usize],
    max_dist: i32,
    block_water: bool,
) -> Vec<i32> {
    let (w, h) = (world.width(), world.height());
    let n = world.tile_count();
    let mut dist = vec![DIST_INF; n];
    if n == 0 {
        return dist;
    }

    let mut queue: Vec<usize> = Vec::with_capacity(sources.len().max(16));
    for &idx in sources {
        if idx < n && dist[idx] != 0 {
            dist[idx] = 0;
            queue.push(idx);
        }
    }

    let mut head = 0usize;
    while head < queue.len() {
        let idx = queue[head];
        head += 1;
        let d = dist[idx];
        if d >= max_dist {
            continue;
        }
        let x = (idx % w as usize) as i32;
        let y = (idx / w as usize) as i32;
        for &(dx, dy) in DIRS.iter() {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            if block_water && world.at(nx, ny).terrain == Terrain::Water {
                continue;
            }
            let nidx = world.idx(nx, ny);
            if dist[nidx] <= d + 1 {
                continue;
            }
            dist[nidx] = d + 1;
            queue.push(nidx);
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Tool;

    fn world_with_road_row(w: i32, h: i32, y: i32) -> World {
        let mut world = World::new(w, h, 1);
        world.stats_mut().money = 100_000;
        for x in 0..w {
            world.apply_road(x, y, 1, false);
        }
        world
    }

    #[test]
    fn edge_mask_marks_connected_components_only() {
        let mut world = world_with_road_row(16, 16, 8);
        // An isolated 2-tile road island in the interior.
        world.apply_road(4, 2, 1, false);
        world.apply_road(5, 2, 1, false);

        let mask = compute_roads_connected_to_edge(&world);
        assert_eq!(mask[world.idx(0, 8)], 1);
        assert_eq!(mask[world.idx(15, 8)], 1);
        assert_eq!(mask[world.idx(7, 8)], 1);
        assert_eq!(mask[world.idx(4, 2)], 0);
        assert_eq!(mask[world.idx(5, 2)], 0);
        // Non-road tiles are always zero.
        assert_eq!(mask[world.idx(0, 0)], 0);
    }

    #[test]
    fn adjacent_edge_checks_respect_mask() {
        let mut world = world_with_road_row(16, 16, 8);
        world.apply_road(4, 2, 1, false);
        let mask = compute_roads_connected_to_edge(&world);

        assert!(has_adjacent_road_connected_to_edge(&world, &mask, 4, 7));
        assert!(!has_adjacent_road_connected_to_edge(&world, &mask, 4, 3));
        assert!(pick_adjacent_road_tile(&world, Some(&mask), 4, 3).is_none());
        assert_eq!(
            pick_adjacent_road_tile(&world, None, 4, 3),
            Some(Point::new(4, 2))
        );
    }

    #[test]
    fn pick_prefers_north_then_east() {
        let mut world = World::new(8, 8, 1);
        world.stats_mut().money = 1000;
        world.apply_road(3, 2, 1, false); // N of (3,3)
        world.apply_road(4, 3, 1, false); // E of (3,3)
        assert_eq!(
            pick_adjacent_road_tile(&world, None, 3, 3),
            Some(Point::new(3, 2))
        );
        world.bulldoze(3, 2);
        assert_eq!(
            pick_adjacent_road_tile(&world, None, 3, 3),
            Some(Point::new(4, 3))
        );
    }

    #[test]
    fn road_astar_follows_roads() {
        let world = world_with_road_row(16, 16, 8);
        let (path, cost) =
            find_road_path_astar(&world, Point::new(0, 8), Point::new(15, 8)).unwrap();
        assert_eq!(cost, 15);
        assert_eq!(path.len(), 16);
        assert_eq!(path[0], Point::new(0, 8));
        assert_eq!(path[15], Point::new(15, 8));

        // No path between disconnected components.
        let mut split = world.clone();
        split.bulldoze(7, 8);
        assert!(find_road_path_astar(&split, Point::new(0, 8), Point::new(15, 8)).is_none());
    }

    #[test]
    fn road_path_to_edge_reaches_border() {
        let mut world = World::new(16, 16, 1);
        world.stats_mut().money = 1000;
        for y in 4..16 {
            world.apply_road(7, y, 1, false);
        }
        let (path, cost) = find_road_path_to_edge(&world, Point::new(7, 4)).unwrap();
        assert_eq!(cost, 11);
        assert_eq!(path.last().copied(), Some(Point::new(7, 15)));
    }

    #[test]
    fn land_astar_routes_around_water() {
        let mut world = World::new(16, 8, 1);
        // A vertical water wall with one gap at y == 6.
        for y in 0..8 {
            if y != 6 {
                world.at_mut(8, y).terrain = Terrain::Water;
            }
        }
        let (path, _) = find_land_path_astar(&world, Point::new(2, 1), Point::new(14, 1)).unwrap();
        assert!(path.contains(&Point::new(8, 6)));
    }

    #[test]
    fn build_path_prefers_existing_roads() {
        let mut world = World::new(16, 16, 1);
        world.stats_mut().money = 100_000;
        // An L-shaped existing road from (0,8) to (8,8) to (8,0).
        for x in 0..=8 {
            world.apply_road(x, 8, 1, false);
        }
        for y in 0..=8 {
            world.apply_road(8, y, 1, false);
        }

        let cfg = RoadBuildPathConfig::default();
        let (path, cost) =
            find_road_build_path(&world, Point::new(0, 8), Point::new(8, 0), &cfg).unwrap();
        // Reusing the L costs zero new tiles even though it is longer.
        assert_eq!(cost, 0);
        assert_eq!(path.len(), 17);

        // Through an empty field the same endpoints need new tiles.
        let empty = World::new(16, 16, 1);
        let (_, cost_empty) =
            find_road_build_path(&empty, Point::new(0, 8), Point::new(8, 0), &cfg).unwrap();
        assert_eq!(cost_empty, 17);
    }

    #[test]
    fn build_path_respects_bridges_flag() {
        let mut world = World::new(16, 4, 1);
        for y in 0..4 {
            world.at_mut(8, y).terrain = Terrain::Water;
        }
        let mut cfg = RoadBuildPathConfig::default();
        assert!(find_road_build_path(&world, Point::new(2, 1), Point::new(14, 1), &cfg).is_none());
        cfg.allow_bridges = true;
        let (path, _) =
            find_road_build_path(&world, Point::new(2, 1), Point::new(14, 1), &cfg).unwrap();
        assert!(path.iter().any(|p| p.x == 8));
    }

    #[test]
    fn build_path_money_model_charges_bridges() {
        let mut world = World::new(8, 3, 1);
        world.at_mut(4, 1).terrain = Terrain::Water;
        let cfg = RoadBuildPathConfig {
            allow_bridges: true,
            cost_model: RoadBuildCostModel::Money,
            ..RoadBuildPathConfig::default()
        };
        let (path, cost) =
            find_road_build_path(&world, Point::new(3, 1), Point::new(5, 1), &cfg).unwrap();
        assert_eq!(path.len(), 3);
        // Two land tiles at 1 each plus one bridge tile at 3.
        assert_eq!(cost, 5);
    }

    #[test]
    fn distance_field_decays_and_blocks_water() {
        let mut world = World::new(8, 8, 1);
        world.at_mut(3, 0).terrain = Terrain::Water;
        let src = vec![world.idx(0, 0)];
        let dist = multi_source_distance_field(&world, &src, 4, true);
        assert_eq!(dist[world.idx(0, 0)], 0);
        assert_eq!(dist[world.idx(2, 0)], 2);
        assert_eq!(dist[world.idx(3, 0)], DIST_INF);
        // Routed around the water tile.
        assert_eq!(dist[world.idx(4, 0)], DIST_INF);
        assert_eq!(dist[world.idx(3, 1)], 4);
        // Cap respected.
        assert_eq!(dist[world.idx(7, 7)], DIST_INF);
    }

    #[test]
    fn non_road_endpoints_fail_road_search() {
        let mut world = world_with_road_row(8, 8, 4);
        world.apply_tool(Tool::Residential, 2, 5);
        assert!(find_road_path_astar(&world, Point::new(2, 5), Point::new(5, 4)).is_none());
        assert!(find_road_path_to_edge(&world, Point::new(2, 5)).is_none());
    }
}
