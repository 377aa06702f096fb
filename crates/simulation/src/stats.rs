use serde::{Deserialize, Serialize};

/// Byte size of the packed stats record persisted in saves and hashed by
/// `hash_world(.., include_stats = true)`.
///
/// Derived traffic/goods aggregates are recomputed by the simulator and are
/// deliberately not part of the packed record.
pub const STATS_RECORD_SIZE: usize = 60;

/// Aggregate city state. Field names serialize in the camelCase form used by
/// the JSON and CSV reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub day: i32,

    pub population: i32,
    pub housing_capacity: i32,

    pub jobs_capacity: i32,

    /// Jobs currently reachable via roads (and, when the outside-connection
    /// rule is on, connected to the map edge). Derived; not persisted.
    pub jobs_capacity_accessible: i32,

    pub employed: i32,

    /// 0..1.
    pub happiness: f32,

    pub money: i64,

    pub roads: i32,
    pub parks: i32,

    // --- Derived commute stats (recomputed by the simulator) ---
    pub commuters: i32,
    pub commuters_unreachable: i32,

    /// Weighted average commute, in road steps (edges).
    pub avg_commute: f32,
    pub p95_commute: f32,

    /// Weighted average commute in street-step-equivalent travel time.
    /// Faster road classes reduce this value but not `avg_commute`.
    pub avg_commute_time: f32,
    pub p95_commute_time: f32,

    /// 0..1 ratio of excess traffic above capacity.
    pub traffic_congestion: f32,
    pub congested_road_tiles: i32,
    pub max_road_traffic: i32,

    // --- Derived goods stats (recomputed by the simulator) ---
    pub goods_produced: i32,
    pub goods_demand: i32,
    pub goods_delivered: i32,
    pub goods_imported: i32,
    pub goods_exported: i32,
    pub goods_unreachable_demand: i32,
    /// delivered/demand clamped to [0,1]; 1 when demand is 0.
    pub goods_satisfaction: f32,
    pub max_road_goods_traffic: i32,

    /// Trade capacity throttles currently in effect (percent, 0..100).
    pub import_capacity_pct: i32,
    pub export_capacity_pct: i32,

    // --- Derived demand/value aggregates ---
    pub avg_land_value: f32,
    pub demand_residential: f32,
    pub demand_commercial: f32,
    pub demand_industrial: f32,

    /// Share of commuters using transit instead of roads (from SimConfig).
    pub transit_mode_share: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            day: 0,
            population: 0,
            housing_capacity: 0,
            jobs_capacity: 0,
            jobs_capacity_accessible: 0,
            employed: 0,
            happiness: 0.5,
            money: 250,
            roads: 0,
            parks: 0,
            commuters: 0,
            commuters_unreachable: 0,
            avg_commute: 0.0,
            p95_commute: 0.0,
            avg_commute_time: 0.0,
            p95_commute_time: 0.0,
            traffic_congestion: 0.0,
            congested_road_tiles: 0,
            max_road_traffic: 0,
            goods_produced: 0,
            goods_demand: 0,
            goods_delivered: 0,
            goods_imported: 0,
            goods_exported: 0,
            goods_unreachable_demand: 0,
            goods_satisfaction: 1.0,
            max_road_goods_traffic: 0,
            import_capacity_pct: 100,
            export_capacity_pct: 100,
            avg_land_value: 0.0,
            demand_residential: 0.0,
            demand_commercial: 0.0,
            demand_industrial: 0.0,
            transit_mode_share: 0.0,
        }
    }
}

impl Stats {
    /// Pack the persisted subset into a fixed little-endian record.
    pub fn to_packed_bytes(&self) -> [u8; STATS_RECORD_SIZE] {
        let mut b = [0u8; STATS_RECORD_SIZE];
        let mut o = 0usize;
        let put_i32 = |b: &mut [u8; STATS_RECORD_SIZE], o: &mut usize, v: i32| {
            b[*o..*o + 4].copy_from_slice(&v.to_le_bytes());
            *o += 4;
        };
        put_i32(&mut b, &mut o, self.day);
        put_i32(&mut b, &mut o, self.population);
        put_i32(&mut b, &mut o, self.housing_capacity);
        put_i32(&mut b, &mut o, self.jobs_capacity);
        put_i32(&mut b, &mut o, self.employed);
        b[o..o + 4].copy_from_slice(&self.happiness.to_le_bytes());
        o += 4;
        b[o..o + 8].copy_from_slice(&self.money.to_le_bytes());
        o += 8;
        put_i32(&mut b, &mut o, self.roads);
        put_i32(&mut b, &mut o, self.parks);
        b[o..o + 4].copy_from_slice(&self.avg_land_value.to_le_bytes());
        o += 4;
        b[o..o + 4].copy_from_slice(&self.demand_residential.to_le_bytes());
        o += 4;
        b[o..o + 4].copy_from_slice(&self.demand_commercial.to_le_bytes());
        o += 4;
        b[o..o + 4].copy_from_slice(&self.demand_industrial.to_le_bytes());
        o += 4;
        b[o..o + 4].copy_from_slice(&self.transit_mode_share.to_le_bytes());
        o += 4;
        debug_assert_eq!(o, STATS_RECORD_SIZE);
        b
    }

    /// Unpack a record written by [`Stats::to_packed_bytes`]. Fields outside
    /// the persisted subset keep their defaults.
    pub fn from_packed_bytes(b: &[u8; STATS_RECORD_SIZE]) -> Stats {
        let i32_at = |o: usize| i32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]]);
        let f32_at = |o: usize| f32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]]);
        let mut s = Stats {
            day: i32_at(0),
            population: i32_at(4),
            housing_capacity: i32_at(8),
            jobs_capacity: i32_at(12),
            employed: i32_at(16),
            happiness: f32_at(20),
            money: i64::from_le_bytes([
                b[24], b[25], b[26], b[27], b[28], b[29], b[30], b[31],
            ]),
            roads: i32_at(32),
            parks: i32_at(36),
            ..Stats::default()
        };
        s.avg_land_value = f32_at(40);
        s.demand_residential = f32_at(44);
        s.demand_commercial = f32_at(48);
        s.demand_industrial = f32_at(52);
        s.transit_mode_share = f32_at(56);
        s
    }
}
