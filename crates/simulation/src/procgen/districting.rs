//! District assignment: Voronoi seeds, road-flow growth, or road-bounded
//! block labeling. Always labels every tile with a district in 0..=7.

use crate::grid::{Overlay, World, DIRS, DISTRICT_COUNT};
use crate::rng::{hash_coords_32, seed_mix32};

use super::{DistrictingMode, ProcGenConfig};

const SALT_DISTRICT_SEED: u32 = 0x4449_5354; // "DIST"

/// Deterministic, well-spread seed tiles: the best-hashed tile in each of 8
/// map sectors.
fn district_seed_tiles(world: &World) -> Vec<usize> {
    let (w, h) = (world.width(), world.height());
    let mix = seed_mix32(world.seed());
    let mut seeds = Vec::with_capacity(DISTRICT_COUNT);

    // 4x2 sector grid; one seed per sector keeps Voronoi cells balanced.
    for sy in 0..2 {
        for sx in 0..4 {
            let x0 = sx * w / 4;
            let x1 = ((sx + 1) * w / 4).max(x0 + 1);
            let y0 = sy * h / 2;
            let y1 = ((sy + 1) * h / 2).max(y0 + 1);

            let mut best: Option<(u32, usize)> = None;
            for y in y0..y1.min(h) {
                for x in x0..x1.min(w) {
                    let score = hash_coords_32(x, y, mix ^ SALT_DISTRICT_SEED);
                    let idx = world.idx(x, y);
                    // Fixed scan order makes the strict < a total tie-break.
                    if best.map_or(true, |(bs, _)| score < bs) {
                        best = Some((score, idx));
                    }
                }
            }
            if let Some((_, idx)) = best {
                seeds.push(idx);
            }
        }
    }
    seeds
}

/// Nearest-seed Voronoi partition under Manhattan distance.
fn assign_voronoi(world: &mut World, seeds: &[usize]) {
    let (w, h) = (world.width(), world.height());
    for y in 0..h {
        for x in 0..w {
            let mut best = (i32::MAX, 0u8);
            for (d_id, &sidx) in seeds.iter().enumerate() {
                let sx = (sidx % w as usize) as i32;
                let sy = (sidx / w as usize) as i32;
                let d = (x - sx).abs() + (y - sy).abs();
                if d < best.0 {
                    best = (d, d_id as u8);
                }
            }
            world.at_mut(x, y).district = best.1;
        }
    }
}

/// Label each tile with the district of its nearest labeled source via BFS.
/// `labels` carries u8::MAX for unlabeled tiles and district ids elsewhere.
fn flood_labels(world: &mut World, mut labels: Vec<u8>, mut queue: Vec<usize>) {
    let (w, h) = (world.width(), world.height());
    let mut head = 0usize;
    while head < queue.len() {
        let idx = queue[head];
        head += 1;
        let x = (idx % w as usize) as i32;
        let y = (idx / w as usize) as i32;
        for &(dx, dy) in DIRS.iter() {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            let nidx = world.idx(nx, ny);
            if labels[nidx] == u8::MAX {
                labels[nidx] = labels[idx];
                queue.push(nidx);
            }
        }
    }
    for (idx, label) in labels.iter().enumerate() {
        let x = (idx % w as usize) as i32;
        let y = (idx / w as usize) as i32;
        world.at_mut(x, y).district = if *label == u8::MAX { 0 } else { *label };
    }
}

/// Grow districts outward from seed road tiles along the road network,
/// then attach off-road tiles to their nearest road district.
fn assign_road_flow(world: &mut World, seeds: &[usize]) {
    let n = world.tile_count();
    let (w, h) = (world.width(), world.height());
    let mut labels = vec![u8::MAX; n];
    let mut queue: Vec<usize> = Vec::new();

    // Snap each seed to the nearest road tile (fall back to the seed itself
    // on road-less maps).
    for (d_id, &sidx) in seeds.iter().enumerate() {
        let sx = (sidx % w as usize) as i32;
        let sy = (sidx / w as usize) as i32;
        let mut snapped = sidx;
        let mut best = i32::MAX;
        for y in 0..h {
            for x in 0..w {
                if world.at(x, y).overlay != Overlay::Road {
                    continue;
                }
                let d = (x - sx).abs() + (y - sy).abs();
                if d < best {
                    best = d;
                    snapped = world.idx(x, y);
                }
            }
        }
        if labels[snapped] == u8::MAX {
            labels[snapped] = d_id as u8;
            queue.push(snapped);
        }
    }

    // First wave: along roads only, so districts follow the network shape.
    let mut head = 0usize;
    while head < queue.len() {
        let idx = queue[head];
        head += 1;
        let x = (idx % w as usize) as i32;
        let y = (idx / w as usize) as i32;
        for &(dx, dy) in DIRS.iter() {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            if world.at(nx, ny).overlay != Overlay::Road {
                continue;
            }
            let nidx = world.idx(nx, ny);
            if labels[nidx] == u8::MAX {
                labels[nidx] = labels[idx];
                queue.push(nidx);
            }
        }
    }

    // Second wave: everything else attaches to the nearest labeled tile.
    let seeded: Vec<usize> = (0..n).filter(|&i| labels[i] != u8::MAX).collect();
    flood_labels(world, labels, seeded);
}

/// Label road-bounded blocks (connected non-road components); the 8 largest
/// become districts 0..=7 and everything else joins its nearest block.
fn assign_block_graph(world: &mut World) {
    let n = world.tile_count();
    let (w, h) = (world.width(), world.height());

    let mut component = vec![usize::MAX; n];
    let mut sizes: Vec<(usize, usize)> = Vec::new(); // (size, component id)

    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        let sx = (start % w as usize) as i32;
        let sy = (start / w as usize) as i32;
        if world.at(sx, sy).overlay == Overlay::Road {
            continue;
        }
        let comp_id = sizes.len();
        let mut queue = vec![start];
        component[start] = comp_id;
        let mut size = 0usize;
        let mut head = 0usize;
        while head < queue.len() {
            let idx = queue[head];
            head += 1;
            size += 1;
            let x = (idx % w as usize) as i32;
            let y = (idx / w as usize) as i32;
            for &(dx, dy) in DIRS.iter() {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                if world.at(nx, ny).overlay == Overlay::Road {
                    continue;
                }
                let nidx = world.idx(nx, ny);
                if component[nidx] == usize::MAX {
                    component[nidx] = comp_id;
                    queue.push(nidx);
                }
            }
        }
        sizes.push((size, comp_id));
    }

    // Largest components win the district ids; ties resolve by component id
    // (discovery order), which is itself deterministic.
    sizes.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    let mut district_of_component = vec![u8::MAX; sizes.len()];
    for (d_id, &(_, comp_id)) in sizes.iter().take(DISTRICT_COUNT).enumerate() {
        district_of_component[comp_id] = d_id as u8;
    }

    let mut labels = vec![u8::MAX; n];
    let mut seeded = Vec::new();
    for i in 0..n {
        if component[i] != usize::MAX {
            let d = district_of_component[component[i]];
            if d != u8::MAX {
                labels[i] = d;
                seeded.push(i);
            }
        }
    }
    flood_labels(world, labels, seeded);
}

pub fn assign_districts(world: &mut World, cfg: &ProcGenConfig) {
    if world.tile_count() == 0 {
        return;
    }
    let seeds = district_seed_tiles(world);
    if seeds.is_empty() {
        return;
    }
    match cfg.districting_mode {
        DistrictingMode::Voronoi => assign_voronoi(world, &seeds),
        DistrictingMode::RoadFlow => assign_road_flow(world, &seeds),
        DistrictingMode::BlockGraph => assign_block_graph(world),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(mode: DistrictingMode) -> ProcGenConfig {
        ProcGenConfig {
            districting_mode: mode,
            ..ProcGenConfig::default()
        }
    }

    #[test]
    fn voronoi_labels_every_tile_with_all_districts() {
        let mut world = World::new(64, 64, 42);
        assign_districts(&mut world, &cfg(DistrictingMode::Voronoi));
        let mut seen = [false; DISTRICT_COUNT];
        for t in world.tiles() {
            seen[t.district as usize] = true;
        }
        assert!(seen.iter().all(|&s| s), "expected all 8 districts used");
    }

    #[test]
    fn road_flow_follows_network() {
        let mut world = World::new(32, 32, 7);
        for i in 0..32 {
            world.set_road(16, i);
            world.set_road(i, 16);
        }
        assign_districts(&mut world, &cfg(DistrictingMode::RoadFlow));
        for t in world.tiles() {
            assert!((t.district as usize) < DISTRICT_COUNT);
        }
    }

    #[test]
    fn block_graph_separates_quadrants() {
        let mut world = World::new(33, 33, 9);
        for i in 0..33 {
            world.set_road(16, i);
            world.set_road(i, 16);
        }
        assign_districts(&mut world, &cfg(DistrictingMode::BlockGraph));

        // The four road-bounded quadrants land in four distinct districts.
        let quads = [
            world.at(4, 4).district,
            world.at(28, 4).district,
            world.at(4, 28).district,
            world.at(28, 28).district,
        ];
        let mut unique = quads.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 4, "quadrants: {quads:?}");
    }

    #[test]
    fn districting_is_deterministic() {
        for mode in [
            DistrictingMode::Voronoi,
            DistrictingMode::RoadFlow,
            DistrictingMode::BlockGraph,
        ] {
            let mut a = World::new(48, 48, 5);
            let mut b = World::new(48, 48, 5);
            for i in 0..48 {
                a.set_road(24, i);
                b.set_road(24, i);
            }
            assign_districts(&mut a, &cfg(mode));
            assign_districts(&mut b, &cfg(mode));
            assert_eq!(a.tiles(), b.tiles());
        }
    }
}
