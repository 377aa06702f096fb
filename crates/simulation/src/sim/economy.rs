//! Daily treasury flows: zone taxes and overlay maintenance with district
//! policy multipliers, plus the unhappiness cost.
//!
//! Multipliers are applied to per-district integer totals with a floor, in
//! district order, so the result is independent of tile iteration details.

use crate::config::SimConfig;
use crate::grid::{Overlay, World, DISTRICT_COUNT};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EconomyOutcome {
    pub revenue: i64,
    pub maintenance: i64,
    pub unhappiness_cost: i64,
}

impl EconomyOutcome {
    pub fn net(&self) -> i64 {
        self.revenue - self.maintenance - self.unhappiness_cost
    }
}

/// Collect today's revenue and upkeep. Does not mutate the world.
pub fn collect(world: &World, cfg: &SimConfig) -> EconomyOutcome {
    // Raw per-district accumulators, scaled once at the end.
    let mut tax_res = [0i64; DISTRICT_COUNT];
    let mut tax_com = [0i64; DISTRICT_COUNT];
    let mut tax_ind = [0i64; DISTRICT_COUNT];
    let mut upkeep_road = [0i64; DISTRICT_COUNT];
    let mut upkeep_park = [0i64; DISTRICT_COUNT];
    let mut upkeep_civic = 0i64;

    for t in world.tiles() {
        let d = usize::from(t.district.min(DISTRICT_COUNT as u8 - 1));
        match t.overlay {
            Overlay::Residential => {
                tax_res[d] += i64::from(t.occupants) * i64::from(cfg.tax_residential)
            }
            Overlay::Commercial => {
                tax_com[d] += i64::from(t.occupants) * i64::from(cfg.tax_commercial)
            }
            Overlay::Industrial => {
                tax_ind[d] += i64::from(t.occupants) * i64::from(cfg.tax_industrial)
            }
            Overlay::Road => {
                upkeep_road[d] += i64::from(cfg.maintenance_road) * i64::from(t.level)
            }
            Overlay::Park => upkeep_park[d] += i64::from(cfg.maintenance_park),
            o if o.is_civic() => {
                upkeep_civic += i64::from(cfg.maintenance_civic) * i64::from(t.level)
            }
            _ => {}
        }
    }

    let mut out = EconomyOutcome::default();
    for d in 0..DISTRICT_COUNT {
        let p = cfg.policy(d as u8);
        out.revenue += (tax_res[d] as f64 * f64::from(p.tax_residential_mult)).floor() as i64;
        out.revenue += (tax_com[d] as f64 * f64::from(p.tax_commercial_mult)).floor() as i64;
        out.revenue += (tax_ind[d] as f64 * f64::from(p.tax_industrial_mult)).floor() as i64;
        out.maintenance +=
            (upkeep_road[d] as f64 * f64::from(p.road_maintenance_mult)).floor() as i64;
        out.maintenance +=
            (upkeep_park[d] as f64 * f64::from(p.park_maintenance_mult)).floor() as i64;
    }
    out.maintenance += upkeep_civic;

    let s = world.stats();
    out.unhappiness_cost = (f64::from(cfg.tax_happiness_per_capita)
        * f64::from(s.population)
        * f64::from((1.0 - s.happiness).clamp(0.0, 1.0)))
    .floor() as i64;

    out
}
