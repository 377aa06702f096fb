//! The binary world save format.
//!
//! Little-endian, fixed layout:
//!
//! ```text
//! magic:   "ISOCITY\0"                 (8 bytes)
//! version: u32                         (currently 12)
//! width, height: u32
//! seed: u64
//! procCfg: length-prefixed bitcode blob
//! simCfg:  length-prefixed bitcode blob
//! stats:   packed record
//! tiles:   v1 full row-major array; v2+ delta list against the
//!          regenerated baseline (u32 count, then {u32 idx, tile record})
//! crc32:   trailing checksum over all prior bytes (v3+)
//! ```
//!
//! Delta saves rebuild the baseline with the same generator, so they stay
//! small and load-order independent. Saves are self-describing: both
//! configs ride along, and loading never needs external metadata.

use std::path::Path;

use simulation::config::SimConfig;
use simulation::grid::World;
use simulation::procgen::{generate_world, ProcGenConfig};

use crate::codec::{Reader, Writer};
use crate::crc::crc32;
use crate::error::SaveError;

pub const MAGIC: [u8; 8] = *b"ISOCITY\0";
pub const CURRENT_VERSION: u32 = 12;

/// First version that writes the delta tile payload.
const MIN_DELTA_VERSION: u32 = 2;
/// First version that carries the trailing CRC.
const MIN_CRC_VERSION: u32 = 3;

/// Dimension sanity guard shared by save and load.
const MAX_DIM: u32 = 4096;

/// Serialize a world at a specific format version. Versions below
/// [`MIN_DELTA_VERSION`] write the full tile array; versions below
/// [`MIN_CRC_VERSION`] omit the checksum.
pub fn save_world_to_bytes_versioned(
    world: &World,
    proc_cfg: &ProcGenConfig,
    sim_cfg: &SimConfig,
    version: u32,
) -> Result<Vec<u8>, SaveError> {
    if version == 0 || version > CURRENT_VERSION {
        return Err(SaveError::invalid(format!(
            "unsupported save version {version} (1..={CURRENT_VERSION})"
        )));
    }
    let (w, h) = (world.width() as u32, world.height() as u32);
    if w > MAX_DIM || h > MAX_DIM {
        return Err(SaveError::invalid(format!(
            "map dimensions {w}x{h} exceed the {MAX_DIM} limit"
        )));
    }

    let mut out = Writer::with_capacity(64 + world.tile_count() * 12);
    out.put_bytes(&MAGIC);
    out.put_u32(version);
    out.put_u32(w);
    out.put_u32(h);
    out.put_u64(world.seed());
    out.put_len_prefixed(&bitcode::encode(proc_cfg));
    out.put_len_prefixed(&bitcode::encode(sim_cfg));
    out.put_stats(world.stats());

    if version < MIN_DELTA_VERSION {
        for tile in world.tiles() {
            out.put_tile(tile);
        }
    } else {
        // Delta against the regenerated baseline.
        let baseline = generate_world(world.width(), world.height(), world.seed(), proc_cfg);
        let mut deltas: Vec<(u32, &simulation::grid::Tile)> = Vec::new();
        for (i, (live, base)) in world.tiles().iter().zip(baseline.tiles()).enumerate() {
            if live.to_bytes() != base.to_bytes() {
                deltas.push((i as u32, live));
            }
        }
        out.put_u32(deltas.len() as u32);
        for (idx, tile) in deltas {
            out.put_u32(idx);
            out.put_tile(tile);
        }
    }

    let mut bytes = out.into_bytes();
    if version >= MIN_CRC_VERSION {
        let checksum = crc32(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
    }
    Ok(bytes)
}

/// Serialize a world at the current format version.
pub fn save_world_to_bytes(
    world: &World,
    proc_cfg: &ProcGenConfig,
    sim_cfg: &SimConfig,
) -> Result<Vec<u8>, SaveError> {
    save_world_to_bytes_versioned(world, proc_cfg, sim_cfg, CURRENT_VERSION)
}

/// Write a save file (current version). Transactional at the call
/// boundary: encode fully, then write.
pub fn save_world_binary(
    world: &World,
    proc_cfg: &ProcGenConfig,
    sim_cfg: &SimConfig,
    path: impl AsRef<Path>,
) -> Result<(), SaveError> {
    let bytes = save_world_to_bytes(world, proc_cfg, sim_cfg)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Parse a save from bytes. Accepts every version from 1 to the current.
pub fn load_world_from_bytes(
    bytes: &[u8],
) -> Result<(World, ProcGenConfig, SimConfig), SaveError> {
    if bytes.len() < MAGIC.len() + 4 {
        return Err(SaveError::format("file too short for a save header"));
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(SaveError::format("not a ProcIsoCity save file (bad magic)"));
    }
    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if version == 0 || version > CURRENT_VERSION {
        return Err(SaveError::format(format!(
            "unsupported save version {version} (expected 1..={CURRENT_VERSION})"
        )));
    }

    // CRC versions: verify the trailing checksum before trusting anything.
    let payload = if version >= MIN_CRC_VERSION {
        if bytes.len() < MAGIC.len() + 8 {
            return Err(SaveError::format("file too short for a checksummed save"));
        }
        let split = bytes.len() - 4;
        let stored = u32::from_le_bytes([
            bytes[split],
            bytes[split + 1],
            bytes[split + 2],
            bytes[split + 3],
        ]);
        let computed = crc32(&bytes[..split]);
        if stored != computed {
            return Err(SaveError::format(format!(
                "crc mismatch (stored {stored:#010X}, computed {computed:#010X})"
            )));
        }
        &bytes[..split]
    } else {
        bytes
    };

    let mut r = Reader::new(payload);
    r.take(MAGIC.len())?;
    r.u32()?; // version, already parsed

    let w = r.u32()?;
    let h = r.u32()?;
    if w == 0 || h == 0 || w > MAX_DIM || h > MAX_DIM {
        return Err(SaveError::format("invalid map dimensions in save file"));
    }
    let seed = r.u64()?;

    let proc_cfg: ProcGenConfig = bitcode::decode(r.len_prefixed()?)
        .map_err(|e| SaveError::format(format!("bad ProcGenConfig blob: {e}")))?;
    let sim_cfg: SimConfig = bitcode::decode(r.len_prefixed()?)
        .map_err(|e| SaveError::format(format!("bad SimConfig blob: {e}")))?;
    let stats = r.stats()?;

    let n = (w as usize) * (h as usize);
    let mut world = if version < MIN_DELTA_VERSION {
        let mut world = World::new(w as i32, h as i32, seed);
        for i in 0..n {
            world.tiles_mut()[i] = r.tile()?;
        }
        world
    } else {
        // Rebuild the baseline, then apply the stored deltas.
        let mut world = generate_world(w as i32, h as i32, seed, &proc_cfg);
        let count = r.u32()? as usize;
        if count > n {
            return Err(SaveError::format(format!(
                "delta count {count} exceeds tile count {n}"
            )));
        }
        for _ in 0..count {
            let idx = r.u32()? as usize;
            if idx >= n {
                return Err(SaveError::format(format!(
                    "delta index {idx} out of range (tile count {n})"
                )));
            }
            world.tiles_mut()[idx] = r.tile()?;
        }
        world
    };

    if r.remaining() != 0 {
        return Err(SaveError::format(format!(
            "{} trailing bytes after tile data",
            r.remaining()
        )));
    }

    *world.stats_mut() = stats;
    // Older saves and bulk edits may carry stale connectivity bits.
    world.recompute_road_masks();
    Ok((world, proc_cfg, sim_cfg))
}

/// Load a save file from disk.
pub fn load_world_binary(
    path: impl AsRef<Path>,
) -> Result<(World, ProcGenConfig, SimConfig), SaveError> {
    let bytes = std::fs::read(path)?;
    load_world_from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulation::grid::{Tool, World};
    use simulation::hash::{hash_tiles, hash_world};

    fn edited_world() -> (World, ProcGenConfig, SimConfig) {
        let proc_cfg = ProcGenConfig::default();
        let mut world = generate_world(48, 48, 7, &proc_cfg);
        world.stats_mut().money = 9_999;
        // Some post-generation edits so deltas are non-empty.
        world.apply_road(1, 1, 1, false);
        world.apply_road(2, 1, 1, false);
        world.apply_tool(Tool::Residential, 1, 2);
        world.stats_mut().day = 4;
        (world, proc_cfg, SimConfig::default())
    }

    #[test]
    fn roundtrip_is_bit_identical() {
        let (world, proc_cfg, sim_cfg) = edited_world();
        let bytes = save_world_to_bytes(&world, &proc_cfg, &sim_cfg).unwrap();
        let (loaded, loaded_proc, loaded_sim) = load_world_from_bytes(&bytes).unwrap();
        assert_eq!(hash_world(&loaded, true), hash_world(&world, true));
        assert_eq!(loaded_proc, proc_cfg);
        assert_eq!(loaded_sim, sim_cfg);
        assert_eq!(loaded.stats().money, world.stats().money);
        assert_eq!(loaded.stats().day, 4);
    }

    #[test]
    fn all_versions_load_identically() {
        let (world, proc_cfg, sim_cfg) = edited_world();
        let mut hashes = Vec::new();
        for version in [1, 2, 3, CURRENT_VERSION] {
            let bytes =
                save_world_to_bytes_versioned(&world, &proc_cfg, &sim_cfg, version).unwrap();
            let (loaded, _, _) = load_world_from_bytes(&bytes).unwrap();
            hashes.push(hash_world(&loaded, true));
        }
        assert!(hashes.windows(2).all(|p| p[0] == p[1]));
        assert_eq!(hashes[0], hash_world(&world, true));
    }

    #[test]
    fn delta_saves_are_much_smaller() {
        let (world, proc_cfg, sim_cfg) = edited_world();
        let full = save_world_to_bytes_versioned(&world, &proc_cfg, &sim_cfg, 1).unwrap();
        let delta = save_world_to_bytes(&world, &proc_cfg, &sim_cfg).unwrap();
        assert!(
            delta.len() * 5 < full.len(),
            "delta {} vs full {}",
            delta.len(),
            full.len()
        );
    }

    #[test]
    fn unedited_world_has_zero_deltas() {
        let proc_cfg = ProcGenConfig::default();
        let world = generate_world(32, 32, 3, &proc_cfg);
        let bytes = save_world_to_bytes(&world, &proc_cfg, &SimConfig::default()).unwrap();
        let (loaded, _, _) = load_world_from_bytes(&bytes).unwrap();
        assert_eq!(hash_tiles(&loaded), hash_tiles(&world));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let (world, proc_cfg, sim_cfg) = edited_world();
        let mut bytes = save_world_to_bytes(&world, &proc_cfg, &sim_cfg).unwrap();
        bytes[0] = b'X';
        let err = load_world_from_bytes(&bytes).unwrap_err();
        assert!(format!("{err}").contains("bad magic"), "{err}");
    }

    #[test]
    fn future_version_is_rejected() {
        let (world, proc_cfg, sim_cfg) = edited_world();
        let mut bytes = save_world_to_bytes(&world, &proc_cfg, &sim_cfg).unwrap();
        bytes[8..12].copy_from_slice(&999u32.to_le_bytes());
        let err = load_world_from_bytes(&bytes).unwrap_err();
        assert!(format!("{err}").contains("version 999"), "{err}");
    }

    #[test]
    fn corrupting_any_byte_fails_crc() {
        let (world, proc_cfg, sim_cfg) = edited_world();
        let bytes = save_world_to_bytes(&world, &proc_cfg, &sim_cfg).unwrap();

        // Byte 42 lands in the config blobs; the checksum must catch it.
        let mut corrupt = bytes.clone();
        corrupt[42] ^= 0xFF;
        let err = load_world_from_bytes(&corrupt).unwrap_err();
        assert!(
            matches!(&err, SaveError::Format(m) if m.contains("crc mismatch")),
            "{err}"
        );
    }

    #[test]
    fn truncated_save_is_rejected() {
        let (world, proc_cfg, sim_cfg) = edited_world();
        let bytes = save_world_to_bytes(&world, &proc_cfg, &sim_cfg).unwrap();
        for cut in [3, 11, 40, bytes.len() - 3] {
            assert!(
                load_world_from_bytes(&bytes[..cut]).is_err(),
                "truncation at {cut} must fail"
            );
        }
    }

    #[test]
    fn loaded_road_masks_are_consistent() {
        let (mut world, proc_cfg, sim_cfg) = edited_world();
        // Deliberately clobber stored masks before saving; load must repair.
        for t in world.tiles_mut() {
            t.variation |= 0x0F;
        }
        let bytes = save_world_to_bytes(&world, &proc_cfg, &sim_cfg).unwrap();
        let (loaded, _, _) = load_world_from_bytes(&bytes).unwrap();
        for y in 0..loaded.height() {
            for x in 0..loaded.width() {
                if loaded.at(x, y).overlay == simulation::grid::Overlay::Road {
                    assert_eq!(
                        loaded.at(x, y).variation & 0x0F,
                        loaded.compute_road_mask(x, y)
                    );
                }
            }
        }
    }

    #[test]
    fn save_to_disk_roundtrip() {
        let (world, proc_cfg, sim_cfg) = edited_world();
        let dir = std::env::temp_dir().join("prociso_save_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("roundtrip.bin");
        save_world_binary(&world, &proc_cfg, &sim_cfg, &path).unwrap();
        let (loaded, _, _) = load_world_binary(&path).unwrap();
        assert_eq!(hash_world(&loaded, true), hash_world(&world, true));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_world_binary("/nonexistent/prociso.bin").unwrap_err();
        assert!(matches!(err, SaveError::Io(_)));
    }
}
