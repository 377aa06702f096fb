use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::grid::DISTRICT_COUNT;

/// Per-district tax and maintenance multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct DistrictPolicy {
    pub tax_residential_mult: f32,
    pub tax_commercial_mult: f32,
    pub tax_industrial_mult: f32,
    pub road_maintenance_mult: f32,
    pub park_maintenance_mult: f32,
}

impl Default for DistrictPolicy {
    fn default() -> Self {
        Self {
            tax_residential_mult: 1.0,
            tax_commercial_mult: 1.0,
            tax_industrial_mult: 1.0,
            road_maintenance_mult: 1.0,
            park_maintenance_mult: 1.0,
        }
    }
}

/// Simulator tuning. Owned by the caller and passed by reference; the
/// simulator never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SimConfig {
    /// Wall-clock seconds per simulated day when driven via `update`.
    pub tick_seconds: f32,

    /// Manhattan radius in which parks raise residential happiness.
    pub park_influence_radius: i32,

    /// Classic rule: zones only count when their road component touches the
    /// map edge.
    pub require_outside_connection: bool,

    // Per-occupant daily tax income by zone.
    pub tax_residential: i32,
    pub tax_commercial: i32,
    pub tax_industrial: i32,

    // Daily per-tile upkeep (roads scale with level).
    pub maintenance_road: i32,
    pub maintenance_park: i32,
    pub maintenance_civic: i32,

    /// Daily unhappiness cost: floor(this * population * (1 - happiness)).
    pub tax_happiness_per_capita: f32,

    // Demand blend weights per zone kind.
    pub residential_desirability_weight: f32,
    pub commercial_desirability_weight: f32,
    pub industrial_desirability_weight: f32,

    /// Days a zone must sit at capacity before it levels up.
    pub upgrade_hold_days: i32,
    /// Minimum desirability for an upgrade to happen.
    pub upgrade_threshold: f32,
    /// Occupancy ratio below which vacancy accrues.
    pub downgrade_threshold: f32,
    /// Days of sustained vacancy before a zone levels down.
    pub downgrade_hold_days: i32,

    /// Share of commuters assumed to ride transit (removed from road demand).
    pub transit_mode_share: f32,

    /// Recompute land value every N days (1 = every day).
    pub land_value_recalc_days: i32,

    pub district_policies_enabled: bool,
    pub district_policies: [DistrictPolicy; DISTRICT_COUNT],
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0,
            park_influence_radius: 6,
            require_outside_connection: true,
            tax_residential: 2,
            tax_commercial: 3,
            tax_industrial: 3,
            maintenance_road: 1,
            maintenance_park: 1,
            maintenance_civic: 2,
            tax_happiness_per_capita: 0.02,
            residential_desirability_weight: 1.0,
            commercial_desirability_weight: 1.0,
            industrial_desirability_weight: 1.0,
            upgrade_hold_days: 4,
            upgrade_threshold: 0.55,
            downgrade_threshold: 0.25,
            downgrade_hold_days: 8,
            transit_mode_share: 0.0,
            land_value_recalc_days: 1,
            district_policies_enabled: false,
            district_policies: [DistrictPolicy::default(); DISTRICT_COUNT],
        }
    }
}

impl SimConfig {
    /// Policy for a district id, honoring the enabled flag.
    pub fn policy(&self, district: u8) -> DistrictPolicy {
        if !self.district_policies_enabled {
            return DistrictPolicy::default();
        }
        self.district_policies[usize::from(district.min(DISTRICT_COUNT as u8 - 1))]
    }
}
