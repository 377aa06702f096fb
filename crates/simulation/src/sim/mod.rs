//! The daily simulator: a single-threaded tick with a fixed phase order.
//!
//! Each `step_once` runs: derived-mask refresh, traffic, goods, land value
//! (cached), the demand model, occupancy updates, upgrade/downgrade
//! dynamics, happiness, the economy, and counters. Every phase is pure in
//! its inputs; the simulator never mutates its config.

mod demand;
mod economy;
mod happiness;

#[cfg(test)]
mod tests;

pub use demand::{compute_zone_demand, DemandInputs};
pub use economy::{collect as collect_economy, EconomyOutcome};
pub use happiness::{advance as advance_happiness, happiness_target, park_coverage};

use crate::config::SimConfig;
use crate::goods::{compute_goods_flow, GoodsConfig};
use crate::grid::{Overlay, World};
use crate::land_value::{compute_land_value, LandValueConfig, LandValueResult};
use crate::pathfind::{compute_roads_connected_to_edge, has_adjacent_road_connected_to_edge};
use crate::traffic::{compute_commute_traffic, TrafficConfig};

pub struct Simulator {
    cfg: SimConfig,
    timer: f32,

    // Per-tile scratch for the upgrade/downgrade hold windows. Cached
    // between ticks but fully derived from the tick sequence, so replaying
    // the same days reproduces it exactly.
    upgrade_hold: Vec<u8>,
    vacancy_hold: Vec<u8>,

    land_value_cache: Option<LandValueResult>,
    land_value_day: i32,
}

impl Simulator {
    pub fn new(cfg: SimConfig) -> Self {
        Self {
            cfg,
            timer: 0.0,
            upgrade_hold: Vec::new(),
            vacancy_hold: Vec::new(),
            land_value_cache: None,
            land_value_day: i32::MIN,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn config_mut(&mut self) -> &mut SimConfig {
        &mut self.cfg
    }

    pub fn reset_timer(&mut self) {
        self.timer = 0.0;
    }

    /// Real-time driver: accumulates `dt` and steps whole days.
    pub fn update(&mut self, world: &mut World, dt: f32) {
        let tick = self.cfg.tick_seconds.max(0.05);
        self.timer += dt.max(0.0);
        while self.timer >= tick {
            self.timer -= tick;
            self.step_once(world);
        }
    }

    fn ensure_scratch(&mut self, world: &World) {
        let n = world.tile_count();
        if self.upgrade_hold.len() != n {
            self.upgrade_hold = vec![0; n];
            self.vacancy_hold = vec![0; n];
            self.land_value_cache = None;
            self.land_value_day = i32::MIN;
        }
    }

    /// Recompute the cheap derived stats without advancing a day. Used
    /// after edits so HUD-style consumers see fresh numbers.
    pub fn refresh_derived_stats(&mut self, world: &mut World) {
        world.recount_static_stats();
        let mask = if self.cfg.require_outside_connection {
            Some(compute_roads_connected_to_edge(world))
        } else {
            None
        };
        let accessible = accessible_jobs(world, mask.as_deref());
        let s = world.stats_mut();
        s.jobs_capacity_accessible = accessible;
        s.employed = s.population.min(accessible);
        s.transit_mode_share = self.cfg.transit_mode_share;
    }

    /// Advance the world by one day.
    pub fn step_once(&mut self, world: &mut World) {
        self.ensure_scratch(world);
        world.recount_static_stats();

        // Phase 1: refresh derived masks.
        let mask = if self.cfg.require_outside_connection {
            Some(compute_roads_connected_to_edge(world))
        } else {
            None
        };

        // Accessible jobs and employment feed the commute share.
        let accessible = accessible_jobs(world, mask.as_deref());
        staff_civic_buildings(world, mask.as_deref());
        let population = world.stats().population;
        let employed = population.min(accessible);
        let employed_share = if population > 0 {
            (employed as f32 / population as f32)
                * (1.0 - self.cfg.transit_mode_share.clamp(0.0, 1.0))
        } else {
            0.0
        };

        // Phase 2: traffic.
        let tc = TrafficConfig {
            require_outside_connection: self.cfg.require_outside_connection,
            ..TrafficConfig::default()
        };
        let traffic = compute_commute_traffic(world, &tc, employed_share, mask.as_deref());

        // Phase 3: goods.
        let gc = GoodsConfig {
            require_outside_connection: self.cfg.require_outside_connection,
            ..GoodsConfig::default()
        };
        let goods = compute_goods_flow(world, &gc, mask.as_deref(), None);

        // Phase 4: land value, cached every N days.
        let day = world.stats().day;
        let recalc_every = self.cfg.land_value_recalc_days.max(1);
        if self.land_value_cache.is_none() || day - self.land_value_day >= recalc_every {
            let lvc = LandValueConfig {
                require_outside_connection: self.cfg.require_outside_connection,
                ..LandValueConfig::default()
            };
            self.land_value_cache =
                Some(compute_land_value(world, &lvc, Some(&traffic), mask.as_deref()));
            self.land_value_day = day;
        }
        let avg_land_value = self
            .land_value_cache
            .as_ref()
            .map_or(0.0, |lv| lv.average_over_land(world));

        // Phase 5: demand.
        let industrial_utilization = if goods.goods_produced > 0 {
            let sold = (goods.goods_delivered - goods.goods_imported) + goods.goods_exported;
            (sold as f32 / goods.goods_produced as f32).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let inputs = DemandInputs {
            has_roads: world.stats().roads > 0,
            population,
            housing_capacity: world.stats().housing_capacity,
            jobs_capacity: world.stats().jobs_capacity,
            jobs_capacity_accessible: accessible,
            happiness: world.stats().happiness,
            avg_land_value,
            goods_satisfaction: goods.satisfaction,
            industrial_utilization,
        };
        let (demand_res, demand_com, demand_ind) = compute_zone_demand(&inputs, &self.cfg);

        // Phases 6-7: occupancy targets and upgrade/downgrade windows.
        update_occupancy(
            world,
            mask.as_deref(),
            demand_res,
            demand_com * goods.satisfaction,
            demand_ind * industrial_utilization,
        );
        self.update_levels(world, demand_res, demand_com, demand_ind);

        // Occupancy moved; republished totals feed happiness and economy.
        world.recount_static_stats();

        // Phase 8: happiness.
        let park_score = park_coverage(world, self.cfg.park_influence_radius);
        let target = happiness_target(
            &self.cfg,
            park_score,
            traffic.avg_commute_time,
            traffic.congestion,
            avg_land_value,
            goods.satisfaction,
        );
        let new_happiness = advance_happiness(world.stats().happiness, target);
        world.stats_mut().happiness = new_happiness;

        // Phase 9: economy.
        let eo = collect_economy(world, &self.cfg);
        world.stats_mut().money += eo.net();

        // Phase 10: counters and published aggregates.
        let s = world.stats_mut();
        s.day += 1;
        s.jobs_capacity_accessible = accessible;
        s.employed = s.population.min(accessible);
        s.commuters = traffic.total_commuters;
        s.commuters_unreachable = traffic.unreachable_commuters;
        s.avg_commute = traffic.avg_commute;
        s.p95_commute = traffic.p95_commute;
        s.avg_commute_time = traffic.avg_commute_time;
        s.p95_commute_time = traffic.p95_commute_time;
        s.traffic_congestion = traffic.congestion;
        s.congested_road_tiles = traffic.congested_road_tiles;
        s.max_road_traffic = traffic.max_traffic;
        s.goods_produced = goods.goods_produced;
        s.goods_demand = goods.goods_demand;
        s.goods_delivered = goods.goods_delivered;
        s.goods_imported = goods.goods_imported;
        s.goods_exported = goods.goods_exported;
        s.goods_unreachable_demand = goods.unreachable_demand;
        s.goods_satisfaction = goods.satisfaction;
        s.max_road_goods_traffic = goods.max_road_goods_traffic;
        s.import_capacity_pct = gc.import_capacity_pct;
        s.export_capacity_pct = gc.export_capacity_pct;
        s.avg_land_value = avg_land_value;
        s.demand_residential = demand_res;
        s.demand_commercial = demand_com;
        s.demand_industrial = demand_ind;
        s.transit_mode_share = self.cfg.transit_mode_share;
    }

    /// Level buildings up after a sustained full house, down after a
    /// sustained vacancy. Levels never fall without the vacancy window.
    fn update_levels(
        &mut self,
        world: &mut World,
        demand_res: f32,
        demand_com: f32,
        demand_ind: f32,
    ) {
        // Disjoint field borrows: the hold counters mutate while the land
        // value cache and config are only read.
        let cfg = &self.cfg;
        let lv = self.land_value_cache.as_ref();
        let upgrade_hold = &mut self.upgrade_hold;
        let vacancy_hold = &mut self.vacancy_hold;

        for y in 0..world.height() {
            for x in 0..world.width() {
                let idx = world.idx(x, y);
                let t = *world.at(x, y);
                if !t.overlay.is_zone() {
                    upgrade_hold[idx] = 0;
                    vacancy_hold[idx] = 0;
                    continue;
                }

                let demand = match t.overlay {
                    Overlay::Residential => demand_res,
                    Overlay::Commercial => demand_com,
                    _ => demand_ind,
                };
                let value_here = lv.map_or(0.5, |l| l.value[idx]);
                let policy = cfg.policy(t.district);
                let tax_mult = match t.overlay {
                    Overlay::Residential => policy.tax_residential_mult,
                    Overlay::Commercial => policy.tax_commercial_mult,
                    _ => policy.tax_industrial_mult,
                };
                // High district taxes discourage investment a little.
                let tax_factor = (1.5 - 0.5 * tax_mult).clamp(0.5, 1.25);
                let desirability = demand * (0.5 + 0.5 * value_here) * tax_factor;

                let cap = t.overlay.capacity(t.level);
                let occ = t.occupants;

                if occ >= cap && desirability > cfg.upgrade_threshold {
                    upgrade_hold[idx] = upgrade_hold[idx].saturating_add(1);
                    if i32::from(upgrade_hold[idx]) >= cfg.upgrade_hold_days && t.level < 3 {
                        world.at_mut(x, y).level = t.level + 1;
                        upgrade_hold[idx] = 0;
                        vacancy_hold[idx] = 0;
                    }
                } else {
                    upgrade_hold[idx] = 0;
                }

                let occupancy_ratio = if cap > 0 {
                    f32::from(occ) / f32::from(cap)
                } else {
                    1.0
                };
                if occupancy_ratio < cfg.downgrade_threshold {
                    vacancy_hold[idx] = vacancy_hold[idx].saturating_add(1);
                    if i32::from(vacancy_hold[idx]) >= cfg.downgrade_hold_days && t.level > 1 {
                        let tile = world.at_mut(x, y);
                        tile.level -= 1;
                        let new_cap = tile.overlay.capacity(tile.level);
                        tile.occupants = tile.occupants.min(new_cap);
                        vacancy_hold[idx] = 0;
                    }
                } else {
                    vacancy_hold[idx] = 0;
                }
            }
        }
    }
}

/// Move every zoned tile's occupancy one step toward its target.
fn update_occupancy(
    world: &mut World,
    mask: Option<&[u8]>,
    demand_res: f32,
    demand_com: f32,
    demand_ind: f32,
) {
    for y in 0..world.height() {
        for x in 0..world.width() {
            let t = *world.at(x, y);
            if !t.overlay.is_zone() {
                continue;
            }
            let access = world.has_adjacent_road(x, y)
                && match mask {
                    Some(m) => has_adjacent_road_connected_to_edge(world, m, x, y),
                    None => true,
                };
            let demand = match t.overlay {
                Overlay::Residential => demand_res,
                Overlay::Commercial => demand_com,
                _ => demand_ind,
            };
            let cap = t.overlay.capacity(t.level);
            let target = if access {
                ((f32::from(cap) * demand).round() as i32).clamp(0, i32::from(cap))
            } else {
                0
            };
            let occ = i32::from(t.occupants);
            // Bounded growth: at most one occupant per day either way.
            let next = occ + (target - occ).clamp(-1, 1);
            world.at_mut(x, y).occupants = next.clamp(0, i32::from(cap)) as u16;
        }
    }
}

/// Sum of commercial/industrial capacities whose road access satisfies the
/// outside-connection rule (when a mask is given).
fn accessible_jobs(world: &World, mask: Option<&[u8]>) -> i32 {
    let mut sum = 0i32;
    for y in 0..world.height() {
        for x in 0..world.width() {
            let t = world.at(x, y);
            if !matches!(t.overlay, Overlay::Commercial | Overlay::Industrial) {
                continue;
            }
            if !world.has_adjacent_road(x, y) {
                continue;
            }
            if let Some(m) = mask {
                if !has_adjacent_road_connected_to_edge(world, m, x, y) {
                    continue;
                }
            }
            sum += i32::from(t.overlay.capacity(t.level));
        }
    }
    sum
}

/// Civic buildings are staffed to capacity while connected, empty otherwise.
fn staff_civic_buildings(world: &mut World, mask: Option<&[u8]>) {
    for y in 0..world.height() {
        for x in 0..world.width() {
            let t = *world.at(x, y);
            if !t.overlay.is_civic() {
                continue;
            }
            let access = world.has_adjacent_road(x, y)
                && match mask {
                    Some(m) => has_adjacent_road_connected_to_edge(world, m, x, y),
                    None => true,
                };
            world.at_mut(x, y).occupants = if access {
                t.overlay.capacity(t.level)
            } else {
                0
            };
        }
    }
}
