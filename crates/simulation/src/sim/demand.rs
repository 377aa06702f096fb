//! Zone demand model: pure functions over aggregate city state, kept free
//! of world access so they stay trivially testable.

use crate::config::SimConfig;

/// Aggregate inputs for one demand evaluation.
#[derive(Debug, Clone, Copy)]
pub struct DemandInputs {
    pub has_roads: bool,
    pub population: i32,
    pub housing_capacity: i32,
    pub jobs_capacity: i32,
    pub jobs_capacity_accessible: i32,
    pub happiness: f32,
    pub avg_land_value: f32,
    pub goods_satisfaction: f32,
    /// Fraction of industrial output that found a buyer (local or export).
    pub industrial_utilization: f32,
}

/// Bootstrap demand used while the city has roads but no buildings yet.
const BOOTSTRAP_RESIDENTIAL: f32 = 0.6;
const BOOTSTRAP_COMMERCIAL: f32 = 0.25;
const BOOTSTRAP_INDUSTRIAL: f32 = 0.35;

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Compute (residential, commercial, industrial) demand levels in [0, 1].
///
/// Residential demand follows access to jobs, happiness and land value;
/// commercial follows available labor and goods supply; industrial follows
/// labor and its ability to sell what it makes.
pub fn compute_zone_demand(inp: &DemandInputs, cfg: &SimConfig) -> (f32, f32, f32) {
    if !inp.has_roads {
        return (0.0, 0.0, 0.0);
    }
    if inp.housing_capacity == 0 && inp.jobs_capacity == 0 {
        return (
            clamp01(BOOTSTRAP_RESIDENTIAL * cfg.residential_desirability_weight),
            clamp01(BOOTSTRAP_COMMERCIAL * cfg.commercial_desirability_weight),
            clamp01(BOOTSTRAP_INDUSTRIAL * cfg.industrial_desirability_weight),
        );
    }

    let jobs_ratio = clamp01(
        inp.jobs_capacity_accessible as f32 / inp.housing_capacity.max(1) as f32,
    );
    let labor_ratio = clamp01(inp.population as f32 / inp.jobs_capacity.max(1) as f32);

    let res_raw = 0.40 * jobs_ratio + 0.30 * inp.happiness + 0.30 * inp.avg_land_value;
    let com_raw =
        0.35 * labor_ratio + 0.35 * inp.goods_satisfaction + 0.30 * inp.avg_land_value;
    let ind_raw = 0.45 * labor_ratio
        + 0.35 * clamp01(inp.industrial_utilization)
        + 0.20 * (1.0 - inp.avg_land_value);

    (
        clamp01(res_raw * cfg.residential_desirability_weight),
        clamp01(com_raw * cfg.commercial_desirability_weight),
        clamp01(ind_raw * cfg.industrial_desirability_weight),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> DemandInputs {
        DemandInputs {
            has_roads: true,
            population: 100,
            housing_capacity: 120,
            jobs_capacity: 100,
            jobs_capacity_accessible: 100,
            happiness: 0.5,
            avg_land_value: 0.5,
            goods_satisfaction: 1.0,
            industrial_utilization: 1.0,
        }
    }

    #[test]
    fn no_roads_means_no_demand() {
        let mut inp = base_inputs();
        inp.has_roads = false;
        assert_eq!(
            compute_zone_demand(&inp, &SimConfig::default()),
            (0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn empty_city_gets_bootstrap_demand() {
        let mut inp = base_inputs();
        inp.housing_capacity = 0;
        inp.jobs_capacity = 0;
        inp.jobs_capacity_accessible = 0;
        let (r, c, i) = compute_zone_demand(&inp, &SimConfig::default());
        assert_eq!(r, BOOTSTRAP_RESIDENTIAL);
        assert_eq!(c, BOOTSTRAP_COMMERCIAL);
        assert_eq!(i, BOOTSTRAP_INDUSTRIAL);
    }

    #[test]
    fn accessible_jobs_pull_residential_demand() {
        let cfg = SimConfig::default();
        let mut rich = base_inputs();
        rich.jobs_capacity_accessible = 120;
        let mut poor = base_inputs();
        poor.jobs_capacity_accessible = 0;
        let (r_rich, _, _) = compute_zone_demand(&rich, &cfg);
        let (r_poor, _, _) = compute_zone_demand(&poor, &cfg);
        assert!(r_rich > r_poor);
    }

    #[test]
    fn goods_shortage_dampens_commercial() {
        let cfg = SimConfig::default();
        let mut starved = base_inputs();
        starved.goods_satisfaction = 0.0;
        let (_, c_starved, _) = compute_zone_demand(&starved, &cfg);
        let (_, c_fed, _) = compute_zone_demand(&base_inputs(), &cfg);
        assert!(c_starved < c_fed);
    }

    #[test]
    fn weights_scale_and_clamp() {
        let mut cfg = SimConfig::default();
        cfg.residential_desirability_weight = 10.0;
        let (r, _, _) = compute_zone_demand(&base_inputs(), &cfg);
        assert_eq!(r, 1.0);
        cfg.residential_desirability_weight = 0.0;
        let (r0, _, _) = compute_zone_demand(&base_inputs(), &cfg);
        assert_eq!(r0, 0.0);
    }
}
