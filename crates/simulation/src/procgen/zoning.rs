//! Zone and park seeding along the generated road network.

use crate::grid::{Overlay, Terrain, World, DIRS};
use crate::pathfind::multi_source_distance_field;
use crate::rng::{hash_coords_32, hash_to_unit, seed_mix32};

use super::{ProcGenConfig, SALT_PARK_ROLL, SALT_ZONE_KIND, SALT_ZONE_ROLL};

/// Water proximity considered attractive for zoning, in tiles.
const WATER_APPEAL_RADIUS: i32 = 6;

fn adjacent_industry(world: &World, x: i32, y: i32) -> i32 {
    DIRS.iter()
        .filter(|&&(dx, dy)| {
            world.in_bounds(x + dx, y + dy)
                && world.at(x + dx, y + dy).overlay == Overlay::Industrial
        })
        .count() as i32
}

/// Roll zones and parks onto road-adjacent land.
///
/// The scan is row-major and earlier placements influence later industry
/// clustering, which is intentional: it gives industrial districts a
/// tendency to agglomerate without any extra state.
pub fn seed_zones(world: &mut World, cfg: &ProcGenConfig) {
    let (w, h) = (world.width(), world.height());
    let mix = seed_mix32(world.seed());

    // Distance-to-water field for the desirability weighting.
    let water_sources: Vec<usize> = world
        .tiles()
        .iter()
        .enumerate()
        .filter(|(_, t)| t.terrain == Terrain::Water)
        .map(|(i, _)| i)
        .collect();
    let dist_water =
        multi_source_distance_field(world, &water_sources, WATER_APPEAL_RADIUS, false);

    let zone_chance = cfg.zone_chance.clamp(0.0, 1.0);
    let park_chance = cfg.park_chance.clamp(0.0, 1.0);

    for y in 0..h {
        for x in 0..w {
            if !world.is_empty_land(x, y) || !world.has_adjacent_road(x, y) {
                continue;
            }

            let roll = hash_to_unit(hash_coords_32(x, y, mix ^ SALT_ZONE_ROLL));
            if roll < zone_chance {
                let idx = world.idx(x, y);
                let water_score = if dist_water[idx] <= WATER_APPEAL_RADIUS {
                    1.0 - dist_water[idx] as f32 / WATER_APPEAL_RADIUS as f32
                } else {
                    0.0
                };
                let industry = adjacent_industry(world, x, y) as f32;

                // Residential and commercial want the coast; industry wants
                // company and cheap interior land.
                let w_res = (1.0 + 0.6 * water_score - 0.5 * industry).max(0.05);
                let w_com = 0.8 + 0.2 * water_score;
                let w_ind = (0.5 + 0.7 * industry - 0.4 * water_score).max(0.05);

                let pick = hash_to_unit(hash_coords_32(x, y, mix ^ SALT_ZONE_KIND))
                    * (w_res + w_com + w_ind);
                let overlay = if pick < w_res {
                    Overlay::Residential
                } else if pick < w_res + w_com {
                    Overlay::Commercial
                } else {
                    Overlay::Industrial
                };
                world.set_overlay(overlay, x, y);
                continue;
            }

            let park_roll = hash_to_unit(hash_coords_32(x, y, mix ^ SALT_PARK_ROLL));
            if park_roll < park_chance {
                world.set_overlay(Overlay::Park, x, y);
            }
        }
    }
}
