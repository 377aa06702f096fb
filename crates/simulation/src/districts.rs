//! Per-district aggregation: tile inventories, population, capacities,
//! land value, and the tax/maintenance ledger with policy multipliers.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::grid::{Overlay, Terrain, World, DISTRICT_COUNT};
use crate::pathfind::has_adjacent_road_connected_to_edge;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictStats {
    pub id: u8,

    pub tiles: i32,
    pub land_tiles: i32,
    pub water_tiles: i32,
    pub roads: i32,
    pub parks: i32,
    pub res_tiles: i32,
    pub com_tiles: i32,
    pub ind_tiles: i32,
    pub civic_tiles: i32,
    pub zone_tiles: i32,
    /// Zone tiles whose road access satisfies the outside-connection rule.
    pub zone_tiles_accessible: i32,

    pub population: i32,
    pub housing_capacity: i32,
    pub jobs_capacity: i32,
    pub jobs_capacity_accessible: i32,
    pub employed: i32,

    /// Land-tile weighted average; 0 when the district has no land.
    pub avg_land_value: f32,

    pub tax_revenue: i64,
    pub maintenance_cost: i64,
    pub net: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DistrictStatsResult {
    pub districts: [DistrictStats; DISTRICT_COUNT],
}

/// Aggregate per-district statistics.
///
/// `land_value` (flat w*h field) weights the average; `road_to_edge` gates
/// accessibility counts when the config requires an outside connection.
pub fn compute_district_stats(
    world: &World,
    cfg: &SimConfig,
    land_value: Option<&[f32]>,
    road_to_edge: Option<&[u8]>,
) -> DistrictStatsResult {
    let mut out = DistrictStatsResult::default();
    for (i, d) in out.districts.iter_mut().enumerate() {
        d.id = i as u8;
    }

    let n = world.tile_count();
    let lv = land_value.filter(|v| v.len() == n);
    let use_mask = cfg.require_outside_connection && road_to_edge.map_or(false, |m| m.len() == n);

    let mut lv_sums = [0.0f64; DISTRICT_COUNT];

    for y in 0..world.height() {
        for x in 0..world.width() {
            let t = world.at(x, y);
            let d = &mut out.districts[usize::from(t.district.min(DISTRICT_COUNT as u8 - 1))];
            let policy = cfg.policy(t.district);

            d.tiles += 1;
            if t.terrain == Terrain::Water {
                d.water_tiles += 1;
            } else {
                d.land_tiles += 1;
                if let Some(values) = lv {
                    lv_sums[usize::from(d.id)] += f64::from(values[world.idx(x, y)]);
                }
            }

            let accessible = world.has_adjacent_road(x, y)
                && match (use_mask, road_to_edge) {
                    (true, Some(m)) => has_adjacent_road_connected_to_edge(world, m, x, y),
                    _ => true,
                };

            match t.overlay {
                Overlay::Road => {
                    d.roads += 1;
                    let upkeep =
                        i64::from(cfg.maintenance_road) * i64::from(t.level);
                    d.maintenance_cost +=
                        (upkeep as f64 * f64::from(policy.road_maintenance_mult)).floor() as i64;
                }
                Overlay::Park => {
                    d.parks += 1;
                    d.maintenance_cost += (f64::from(cfg.maintenance_park)
                        * f64::from(policy.park_maintenance_mult))
                    .floor() as i64;
                }
                Overlay::Residential => {
                    d.res_tiles += 1;
                    d.zone_tiles += 1;
                    if accessible {
                        d.zone_tiles_accessible += 1;
                    }
                    d.population += i32::from(t.occupants);
                    d.housing_capacity += i32::from(t.overlay.capacity(t.level));
                    d.tax_revenue += (f64::from(t.occupants)
                        * f64::from(cfg.tax_residential)
                        * f64::from(policy.tax_residential_mult))
                    .floor() as i64;
                }
                Overlay::Commercial => {
                    d.com_tiles += 1;
                    d.zone_tiles += 1;
                    let cap = i32::from(t.overlay.capacity(t.level));
                    d.jobs_capacity += cap;
                    if accessible {
                        d.zone_tiles_accessible += 1;
                        d.jobs_capacity_accessible += cap;
                    }
                    d.tax_revenue += (f64::from(t.occupants)
                        * f64::from(cfg.tax_commercial)
                        * f64::from(policy.tax_commercial_mult))
                    .floor() as i64;
                }
                Overlay::Industrial => {
                    d.ind_tiles += 1;
                    d.zone_tiles += 1;
                    let cap = i32::from(t.overlay.capacity(t.level));
                    d.jobs_capacity += cap;
                    if accessible {
                        d.zone_tiles_accessible += 1;
                        d.jobs_capacity_accessible += cap;
                    }
                    d.tax_revenue += (f64::from(t.occupants)
                        * f64::from(cfg.tax_industrial)
                        * f64::from(policy.tax_industrial_mult))
                    .floor() as i64;
                }
                o if o.is_civic() => {
                    d.civic_tiles += 1;
                    d.maintenance_cost += i64::from(cfg.maintenance_civic) * i64::from(t.level);
                }
                _ => {}
            }
        }
    }

    for d in out.districts.iter_mut() {
        if d.land_tiles > 0 {
            d.avg_land_value =
                (lv_sums[usize::from(d.id)] / f64::from(d.land_tiles)) as f32;
        }
        d.employed = d.population.min(d.jobs_capacity_accessible);
        d.net = d.tax_revenue - d.maintenance_cost;
    }

    out
}
