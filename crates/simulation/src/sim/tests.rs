use super::*;
use crate::grid::{Tool, ToolApplyResult};
use crate::hash::hash_world;
use crate::procgen::{generate_world, ProcGenConfig};

/// A compact handcrafted town: one edge-spanning road, homes, jobs and a
/// park, so every simulator phase has something to chew on.
fn town() -> World {
    let mut world = World::new(24, 11, 77);
    world.stats_mut().money = 100_000;
    for x in 0..24 {
        assert_eq!(world.apply_road(x, 5, 1, false), ToolApplyResult::Applied);
    }
    for x in [2, 3, 4] {
        assert_eq!(
            world.apply_tool(Tool::Residential, x, 6),
            ToolApplyResult::Applied
        );
    }
    assert_eq!(
        world.apply_tool(Tool::Commercial, 10, 6),
        ToolApplyResult::Applied
    );
    assert_eq!(
        world.apply_tool(Tool::Industrial, 12, 6),
        ToolApplyResult::Applied
    );
    assert_eq!(world.apply_tool(Tool::Park, 6, 6), ToolApplyResult::Applied);
    world
}

#[test]
fn day_advances_and_stats_publish() {
    let mut world = town();
    let mut sim = Simulator::new(SimConfig::default());
    sim.step_once(&mut world);

    let s = world.stats();
    assert_eq!(s.day, 1);
    assert_eq!(s.roads, 24);
    assert_eq!(s.parks, 1);
    assert!(s.jobs_capacity_accessible > 0);
    assert!(s.demand_residential > 0.0);
    assert!((0.0..=1.0).contains(&s.happiness));
}

#[test]
fn population_grows_toward_demand() {
    let mut world = town();
    let mut sim = Simulator::new(SimConfig::default());
    for _ in 0..30 {
        sim.step_once(&mut world);
    }
    let s = world.stats();
    assert!(s.population > 0, "residents should move in");
    assert!(s.population <= s.housing_capacity);
    assert!(s.employed <= s.population);
}

#[test]
fn tick_sequence_is_deterministic() {
    let cfg = ProcGenConfig::default();
    let mut a = generate_world(48, 48, 21, &cfg);
    let mut b = generate_world(48, 48, 21, &cfg);
    let mut sim_a = Simulator::new(SimConfig::default());
    let mut sim_b = Simulator::new(SimConfig::default());
    for _ in 0..20 {
        sim_a.step_once(&mut a);
        sim_b.step_once(&mut b);
    }
    assert_eq!(hash_world(&a, true), hash_world(&b, true));
    assert_eq!(a.stats().money, b.stats().money);
}

#[test]
fn sixty_day_run_stays_sane() {
    let cfg = ProcGenConfig::default();
    let mut world = generate_world(96, 96, 1, &cfg);
    let mut sim = Simulator::new(SimConfig::default());
    for _ in 0..60 {
        sim.step_once(&mut world);
    }
    let s = world.stats();
    assert_eq!(s.day, 60);
    assert!(s.population > 0);
    assert!((0.3..=0.9).contains(&s.happiness), "happiness {}", s.happiness);
    assert!(s.goods_satisfaction >= 0.0 && s.goods_satisfaction <= 1.0);
}

#[test]
fn occupancy_changes_at_most_one_per_day() {
    let mut world = town();
    let mut sim = Simulator::new(SimConfig::default());
    let mut prev: Vec<u16> = world.tiles().iter().map(|t| t.occupants).collect();
    for _ in 0..10 {
        sim.step_once(&mut world);
        for (i, t) in world.tiles().iter().enumerate() {
            if t.overlay.is_zone() {
                let diff = i32::from(t.occupants) - i32::from(prev[i]);
                assert!(diff.abs() <= 1, "occupancy jumped by {diff}");
            }
        }
        prev = world.tiles().iter().map(|t| t.occupants).collect();
    }
}

#[test]
fn levels_never_drop_without_sustained_vacancy() {
    let cfg = ProcGenConfig::default();
    let mut world = generate_world(48, 48, 33, &cfg);
    let mut sim = Simulator::new(SimConfig::default());

    // Track levels plus a vacancy streak per tile; a level may only fall
    // after `downgrade_hold_days` of low occupancy.
    let n = world.tile_count();
    let mut prev_levels: Vec<u8> = world.tiles().iter().map(|t| t.level).collect();
    let mut vacancy_streak = vec![0i32; n];

    for _ in 0..40 {
        // Record which tiles were vacant before the tick.
        for (i, t) in world.tiles().iter().enumerate() {
            let cap = t.overlay.capacity(t.level);
            let vacant = t.overlay.is_zone()
                && cap > 0
                && (f32::from(t.occupants) / f32::from(cap))
                    < sim.config().downgrade_threshold;
            vacancy_streak[i] = if vacant { vacancy_streak[i] + 1 } else { 0 };
        }
        sim.step_once(&mut world);
        for (i, t) in world.tiles().iter().enumerate() {
            if t.overlay.is_zone() && t.level < prev_levels[i] {
                assert!(
                    vacancy_streak[i] >= sim.config().downgrade_hold_days,
                    "level dropped without a sustained vacancy window"
                );
            }
            prev_levels[i] = t.level;
        }
    }
}

#[test]
fn full_buildings_upgrade_after_hold_days() {
    let mut world = town();
    let mut cfg = SimConfig::default();
    cfg.upgrade_hold_days = 2;
    cfg.upgrade_threshold = 0.0;
    // Saturate demand so occupancy targets sit at capacity.
    cfg.residential_desirability_weight = 10.0;
    let mut sim = Simulator::new(cfg);

    // Pre-fill a residential tile to capacity.
    world.at_mut(2, 6).occupants = 10;
    let mut upgraded = false;
    for _ in 0..20 {
        sim.step_once(&mut world);
        // Keep it pinned at capacity to satisfy the hold window.
        let t = world.at_mut(2, 6);
        t.occupants = t.overlay.capacity(t.level);
        if world.at(2, 6).level > 1 {
            upgraded = true;
            break;
        }
    }
    assert!(upgraded, "a pinned-full desirable building should level up");
}

#[test]
fn outside_connection_rule_suppresses_island_jobs() {
    let mut world = World::new(24, 11, 7);
    world.stats_mut().money = 100_000;
    // Roads that never touch the edge.
    for x in 6..18 {
        world.apply_road(x, 5, 1, false);
    }
    world.apply_tool(Tool::Commercial, 10, 6);

    let mut sim = Simulator::new(SimConfig::default());
    sim.step_once(&mut world);
    assert_eq!(world.stats().jobs_capacity_accessible, 0);

    let mut open_cfg = SimConfig::default();
    open_cfg.require_outside_connection = false;
    let mut open_sim = Simulator::new(open_cfg);
    let mut world2 = World::new(24, 11, 7);
    world2.stats_mut().money = 100_000;
    for x in 6..18 {
        world2.apply_road(x, 5, 1, false);
    }
    world2.apply_tool(Tool::Commercial, 10, 6);
    open_sim.step_once(&mut world2);
    assert_eq!(world2.stats().jobs_capacity_accessible, 8);
}

#[test]
fn civic_buildings_staff_when_connected() {
    let mut world = town();
    world.apply_tool(Tool::School, 8, 6);
    let mut sim = Simulator::new(SimConfig::default());
    sim.step_once(&mut world);
    assert_eq!(world.at(8, 6).occupants, 6);

    // Cut the school off and it empties.
    for x in 0..24 {
        world.bulldoze(x, 5);
    }
    sim.step_once(&mut world);
    assert_eq!(world.at(8, 6).occupants, 0);
}

#[test]
fn economy_pays_maintenance_even_when_empty() {
    let mut world = World::new(16, 16, 3);
    world.stats_mut().money = 1_000;
    for x in 0..16 {
        world.apply_road(x, 8, 1, false);
    }
    let money_after_build = world.stats().money;
    let mut sim = Simulator::new(SimConfig::default());
    sim.step_once(&mut world);
    // No taxpayers: the treasury shrinks by road upkeep.
    assert_eq!(world.stats().money, money_after_build - 16);
}

#[test]
fn update_accumulates_fractional_days() {
    let mut world = town();
    let mut cfg = SimConfig::default();
    cfg.tick_seconds = 1.0;
    let mut sim = Simulator::new(cfg);
    sim.update(&mut world, 0.4);
    assert_eq!(world.stats().day, 0);
    sim.update(&mut world, 0.7);
    assert_eq!(world.stats().day, 1);
    sim.update(&mut world, 2.0);
    assert_eq!(world.stats().day, 3);
    sim.reset_timer();
    sim.update(&mut world, 0.9);
    assert_eq!(world.stats().day, 3);
}

#[test]
fn refresh_derived_stats_is_light_and_correct() {
    let mut world = town();
    let mut sim = Simulator::new(SimConfig::default());
    sim.refresh_derived_stats(&mut world);
    let s = world.stats();
    assert_eq!(s.day, 0, "refresh must not advance the day");
    assert_eq!(s.jobs_capacity_accessible, 8 + 12);
    assert_eq!(s.roads, 24);
}

#[test]
fn land_value_cache_respects_recalc_interval() {
    let cfg_every = SimConfig {
        land_value_recalc_days: 1,
        ..SimConfig::default()
    };
    let cfg_lazy = SimConfig {
        land_value_recalc_days: 10_000,
        ..SimConfig::default()
    };
    // Both start equal; the lazy one keeps day-0 land value forever, which
    // must not affect determinism of repeated runs.
    for cfg in [cfg_every, cfg_lazy] {
        let mut a = town();
        let mut b = town();
        let mut sim_a = Simulator::new(cfg.clone());
        let mut sim_b = Simulator::new(cfg.clone());
        for _ in 0..12 {
            sim_a.step_once(&mut a);
            sim_b.step_once(&mut b);
        }
        assert_eq!(hash_world(&a, true), hash_world(&b, true));
    }
}
