//! Byte-stable world hashing.
//!
//! `hash_world` is the determinism contract of the whole engine: two runs
//! with identical seeds, configs and event streams must agree on it after
//! every operation. It hashes the canonical little-endian tile records, so
//! any field that matters to state is covered and padding never leaks in.

use xxhash_rust::xxh64::xxh64;

use crate::grid::{World, TILE_RECORD_SIZE};
use crate::stats::STATS_RECORD_SIZE;

const HASH_SEED: u64 = 0;

/// 64-bit hash of the authoritative world state.
///
/// `include_stats` folds the packed stats record in as well; leave it off to
/// compare tile grids independently of aggregates (patch guards do this).
pub fn hash_world(world: &World, include_stats: bool) -> u64 {
    let n = world.tile_count();
    let mut bytes = Vec::with_capacity(16 + n * TILE_RECORD_SIZE + STATS_RECORD_SIZE);
    bytes.extend_from_slice(&(world.width() as u32).to_le_bytes());
    bytes.extend_from_slice(&(world.height() as u32).to_le_bytes());
    bytes.extend_from_slice(&world.seed().to_le_bytes());
    for t in world.tiles() {
        bytes.extend_from_slice(&t.to_bytes());
    }
    if include_stats {
        bytes.extend_from_slice(&world.stats().to_packed_bytes());
    }
    xxh64(&bytes, HASH_SEED)
}

/// Hash of the tile grid only (dimensions + seed + tiles, no stats).
pub fn hash_tiles(world: &World) -> u64 {
    hash_world(world, false)
}
