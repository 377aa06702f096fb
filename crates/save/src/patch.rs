//! World patches: the difference between two saves of the same map, with
//! guard hashes and a compression envelope.
//!
//! A patch carries optional config/stats replacements plus the tile deltas.
//! The envelope compresses with lz4 (a deterministic LZ77 family codec; the
//! raw `None` mode is the mandated fallback when byte compatibility with
//! other tooling matters).

use simulation::config::SimConfig;
use simulation::grid::{Tile, World};
use simulation::hash::hash_tiles;
use simulation::procgen::ProcGenConfig;
use simulation::stats::Stats;

use crate::codec::{Reader, Writer};
use crate::error::SaveError;

pub const PATCH_MAGIC: [u8; 8] = *b"ISOPTCH\0";
pub const PATCH_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchCompression {
    None,
    Lz4,
}

impl PatchCompression {
    fn as_u8(self) -> u8 {
        match self {
            PatchCompression::None => 0,
            PatchCompression::Lz4 => 1,
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PatchCompression::None),
            1 => Some(PatchCompression::Lz4),
            _ => None,
        }
    }
}

/// Difference between a base and a target world of identical dimensions.
#[derive(Debug, Clone)]
pub struct WorldPatch {
    pub w: u32,
    pub h: u32,

    /// Tile-grid hashes guarding application order.
    pub base_tile_hash: u64,
    pub target_tile_hash: u64,

    pub proc_cfg: Option<ProcGenConfig>,
    pub sim_cfg: Option<SimConfig>,
    pub stats: Option<Stats>,

    /// (tile index, replacement) pairs, ascending by index.
    pub tiles: Vec<(u32, Tile)>,
}

/// Diff two worlds into a patch. The maps must have identical dimensions
/// and seed (a patch never rewrites the generator inputs).
#[allow(clippy::too_many_arguments)]
pub fn make_world_patch(
    base: &World,
    base_proc: &ProcGenConfig,
    base_sim: &SimConfig,
    target: &World,
    target_proc: &ProcGenConfig,
    target_sim: &SimConfig,
    include_proc: bool,
    include_sim: bool,
    include_stats: bool,
) -> Result<WorldPatch, SaveError> {
    if base.width() != target.width() || base.height() != target.height() {
        return Err(SaveError::invalid(format!(
            "patch endpoints disagree on dimensions: {}x{} vs {}x{}",
            base.width(),
            base.height(),
            target.width(),
            target.height()
        )));
    }
    if base.seed() != target.seed() {
        return Err(SaveError::invalid(
            "patch endpoints disagree on the world seed",
        ));
    }

    let mut tiles = Vec::new();
    for (i, (b, t)) in base.tiles().iter().zip(target.tiles()).enumerate() {
        if b.to_bytes() != t.to_bytes() {
            tiles.push((i as u32, *t));
        }
    }

    Ok(WorldPatch {
        w: base.width() as u32,
        h: base.height() as u32,
        base_tile_hash: hash_tiles(base),
        target_tile_hash: hash_tiles(target),
        proc_cfg: (include_proc && base_proc != target_proc).then(|| target_proc.clone()),
        sim_cfg: (include_sim && base_sim != target_sim).then(|| target_sim.clone()),
        stats: include_stats.then(|| *target.stats()),
        tiles,
    })
}

/// Serialize a patch with the chosen compression envelope.
pub fn serialize_world_patch(patch: &WorldPatch, compression: PatchCompression) -> Vec<u8> {
    let mut inner = Writer::with_capacity(64 + patch.tiles.len() * 16);
    inner.put_u32(patch.w);
    inner.put_u32(patch.h);
    inner.put_u64(patch.base_tile_hash);
    inner.put_u64(patch.target_tile_hash);

    let mut flags = 0u8;
    if patch.proc_cfg.is_some() {
        flags |= 1;
    }
    if patch.sim_cfg.is_some() {
        flags |= 2;
    }
    if patch.stats.is_some() {
        flags |= 4;
    }
    inner.put_u8(flags);
    if let Some(p) = &patch.proc_cfg {
        inner.put_len_prefixed(&bitcode::encode(p));
    }
    if let Some(s) = &patch.sim_cfg {
        inner.put_len_prefixed(&bitcode::encode(s));
    }
    if let Some(st) = &patch.stats {
        inner.put_stats(st);
    }
    inner.put_u32(patch.tiles.len() as u32);
    for (idx, tile) in &patch.tiles {
        inner.put_u32(*idx);
        inner.put_tile(tile);
    }
    let inner = inner.into_bytes();

    let payload = match compression {
        PatchCompression::None => inner,
        PatchCompression::Lz4 => lz4_flex::compress_prepend_size(&inner),
    };

    let mut out = Writer::with_capacity(payload.len() + 24);
    out.put_bytes(&PATCH_MAGIC);
    out.put_u32(PATCH_VERSION);
    out.put_u8(compression.as_u8());
    out.put_len_prefixed(&payload);
    out.into_bytes()
}

/// Parse a patch produced by [`serialize_world_patch`].
pub fn deserialize_world_patch(bytes: &[u8]) -> Result<WorldPatch, SaveError> {
    let mut r = Reader::new(bytes);
    if r.take(PATCH_MAGIC.len())? != PATCH_MAGIC {
        return Err(SaveError::format("not a world patch (bad magic)"));
    }
    let version = r.u32()?;
    if version != PATCH_VERSION {
        return Err(SaveError::format(format!(
            "unsupported patch version {version}"
        )));
    }
    let compression = PatchCompression::from_u8(r.u8()?)
        .ok_or_else(|| SaveError::format("unknown patch compression tag"))?;
    let payload = r.len_prefixed()?;
    let inner = match compression {
        PatchCompression::None => payload.to_vec(),
        PatchCompression::Lz4 => lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| SaveError::format(format!("lz4 decompress failed: {e}")))?,
    };

    let mut r = Reader::new(&inner);
    let w = r.u32()?;
    let h = r.u32()?;
    if w == 0 || h == 0 || w > 4096 || h > 4096 {
        return Err(SaveError::format("invalid patch dimensions"));
    }
    let base_tile_hash = r.u64()?;
    let target_tile_hash = r.u64()?;
    let flags = r.u8()?;

    let proc_cfg = if flags & 1 != 0 {
        Some(
            bitcode::decode(r.len_prefixed()?)
                .map_err(|e| SaveError::format(format!("bad ProcGenConfig blob: {e}")))?,
        )
    } else {
        None
    };
    let sim_cfg = if flags & 2 != 0 {
        Some(
            bitcode::decode(r.len_prefixed()?)
                .map_err(|e| SaveError::format(format!("bad SimConfig blob: {e}")))?,
        )
    } else {
        None
    };
    let stats = if flags & 4 != 0 { Some(r.stats()?) } else { None };

    let count = r.u32()? as usize;
    let n = (w as usize) * (h as usize);
    if count > n {
        return Err(SaveError::format(format!(
            "patch delta count {count} exceeds tile count {n}"
        )));
    }
    let mut tiles = Vec::with_capacity(count);
    for _ in 0..count {
        let idx = r.u32()?;
        if idx as usize >= n {
            return Err(SaveError::format(format!(
                "patch tile index {idx} out of range"
            )));
        }
        tiles.push((idx, r.tile()?));
    }
    if r.remaining() != 0 {
        return Err(SaveError::format("trailing bytes after patch payload"));
    }

    Ok(WorldPatch {
        w,
        h,
        base_tile_hash,
        target_tile_hash,
        proc_cfg,
        sim_cfg,
        stats,
        tiles,
    })
}

/// Apply a patch in place. In strict mode the world must match the base
/// hash before and the target hash after; road masks are repaired either
/// way.
pub fn apply_world_patch(
    world: &mut World,
    proc_cfg: &mut ProcGenConfig,
    sim_cfg: &mut SimConfig,
    patch: &WorldPatch,
    strict: bool,
) -> Result<(), SaveError> {
    if world.width() as u32 != patch.w || world.height() as u32 != patch.h {
        return Err(SaveError::invalid(format!(
            "patch is for a {}x{} map, world is {}x{}",
            patch.w,
            patch.h,
            world.width(),
            world.height()
        )));
    }
    if strict {
        let actual = hash_tiles(world);
        if actual != patch.base_tile_hash {
            return Err(SaveError::format(format!(
                "patch base hash mismatch (expected {:#018X}, world is {actual:#018X})",
                patch.base_tile_hash
            )));
        }
    }

    for (idx, tile) in &patch.tiles {
        world.tiles_mut()[*idx as usize] = *tile;
    }
    world.recompute_road_masks();

    if let Some(p) = &patch.proc_cfg {
        *proc_cfg = p.clone();
    }
    if let Some(s) = &patch.sim_cfg {
        *sim_cfg = s.clone();
    }
    if let Some(st) = &patch.stats {
        *world.stats_mut() = *st;
    }

    if strict {
        let actual = hash_tiles(world);
        if actual != patch.target_tile_hash {
            return Err(SaveError::format(format!(
                "patch target hash mismatch (expected {:#018X}, got {actual:#018X})",
                patch.target_tile_hash
            )));
        }
    }
    Ok(())
}
