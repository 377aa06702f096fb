//! Happiness: a slow moving average over park coverage, commute cost,
//! congestion, land value and the tax burden.

use crate::config::SimConfig;
use crate::grid::{Overlay, World};
use crate::pathfind::multi_source_distance_field;

/// Smoothing factor of the daily moving average.
const SMOOTHING: f32 = 0.1;

/// Commute time (street-step equivalents) at which the penalty saturates.
const COMMUTE_SATURATION: f32 = 40.0;

/// Combined zone tax level at which the burden penalty saturates.
const TAX_SATURATION: f32 = 30.0;

/// Fraction of residents with a park within `park_influence_radius`.
pub fn park_coverage(world: &World, radius: i32) -> f32 {
    let park_sources: Vec<usize> = world
        .tiles()
        .iter()
        .enumerate()
        .filter(|(_, t)| t.overlay == Overlay::Park)
        .map(|(i, _)| i)
        .collect();
    if park_sources.is_empty() {
        return 0.0;
    }
    let dist = multi_source_distance_field(world, &park_sources, radius.max(0), false);

    let mut covered = 0i64;
    let mut population = 0i64;
    for (i, t) in world.tiles().iter().enumerate() {
        if t.overlay != Overlay::Residential || t.occupants == 0 {
            continue;
        }
        population += i64::from(t.occupants);
        if dist[i] <= radius {
            covered += i64::from(t.occupants);
        }
    }
    if population == 0 {
        0.0
    } else {
        covered as f32 / population as f32
    }
}

/// Instantaneous happiness target from today's derived stats.
pub fn happiness_target(
    cfg: &SimConfig,
    park_score: f32,
    avg_commute_time: f32,
    congestion: f32,
    avg_land_value: f32,
    goods_satisfaction: f32,
) -> f32 {
    let commute_penalty = (avg_commute_time / COMMUTE_SATURATION).clamp(0.0, 1.0);
    let tax_level =
        (cfg.tax_residential + cfg.tax_commercial + cfg.tax_industrial).max(0) as f32;
    let tax_burden = (tax_level / TAX_SATURATION).clamp(0.0, 1.0);

    let target = 0.5 + 0.20 * park_score + 0.12 * avg_land_value
        + 0.06 * (goods_satisfaction - 0.5)
        - 0.18 * commute_penalty
        - 0.15 * congestion
        - 0.15 * tax_burden;
    target.clamp(0.0, 1.0)
}

/// Advance the moving average one day toward the target.
pub fn advance(current: f32, target: f32) -> f32 {
    (current + (target - current) * SMOOTHING).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Tool;

    #[test]
    fn coverage_counts_residents_near_parks() {
        let mut world = World::new(24, 24, 1);
        world.stats_mut().money = 10_000;
        for x in 0..24 {
            world.apply_road(x, 12, 1, false);
        }
        world.apply_tool(Tool::Residential, 2, 13);
        world.at_mut(2, 13).occupants = 10;
        world.apply_tool(Tool::Residential, 20, 13);
        world.at_mut(20, 13).occupants = 10;
        world.apply_tool(Tool::Park, 3, 13);

        // Only the western home is inside the radius.
        let cov = park_coverage(&world, 4);
        assert!((cov - 0.5).abs() < 1e-6);
        // A big radius reaches both.
        assert_eq!(park_coverage(&world, 30), 1.0);
    }

    #[test]
    fn no_parks_no_coverage() {
        let mut world = World::new(8, 8, 1);
        world.stats_mut().money = 100;
        world.apply_road(4, 4, 1, false);
        world.apply_tool(Tool::Residential, 4, 5);
        world.at_mut(4, 5).occupants = 5;
        assert_eq!(park_coverage(&world, 6), 0.0);
    }

    #[test]
    fn long_commutes_and_taxes_drag_the_target() {
        let cfg = SimConfig::default();
        let good = happiness_target(&cfg, 1.0, 5.0, 0.0, 0.8, 1.0);
        let bad = happiness_target(&cfg, 0.0, 60.0, 0.8, 0.2, 0.2);
        assert!(good > bad);
        assert!((0.0..=1.0).contains(&good));
        assert!((0.0..=1.0).contains(&bad));

        let mut taxed = SimConfig::default();
        taxed.tax_residential = 30;
        assert!(happiness_target(&taxed, 1.0, 5.0, 0.0, 0.8, 1.0) < good);
    }

    #[test]
    fn moving_average_converges() {
        let mut h = 0.5;
        for _ in 0..200 {
            h = advance(h, 0.9);
        }
        assert!((h - 0.9).abs() < 0.01);
    }
}
