//! Blueprints: reusable rectangles of tile data (`.isobp`).
//!
//! A blueprint stores a rect of tile records plus a name. Application picks
//! an apply mode, a field mask selecting which tile fields to write, and a
//! rotate/mirror transform; road connection masks are repaired over the
//! stamped region afterwards.

use simulation::grid::{Overlay, Terrain, Tile, World};

use crate::codec::{Reader, Writer};
use crate::error::SaveError;
use crate::patch::PatchCompression;

pub const BLUEPRINT_MAGIC: [u8; 8] = *b"ISOBPLN\0";
pub const BLUEPRINT_VERSION: u32 = 1;

// Field mask bits.
pub const FIELD_TERRAIN: u8 = 1 << 0;
pub const FIELD_OVERLAY: u8 = 1 << 1;
pub const FIELD_HEIGHT: u8 = 1 << 2;
pub const FIELD_VARIATION: u8 = 1 << 3;
pub const FIELD_LEVEL: u8 = 1 << 4;
pub const FIELD_OCCUPANTS: u8 = 1 << 5;
pub const FIELD_DISTRICT: u8 = 1 << 6;
pub const FIELD_ALL: u8 = 0x7F;

/// How a blueprint lands on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlueprintApplyMode {
    /// Write every selected field of every cell.
    Replace,
    /// Only write onto empty land; occupied cells are left alone.
    Stamp,
}

/// Rotation/mirror applied before stamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlueprintTransform {
    /// One of 0, 90, 180, 270 (degrees clockwise).
    pub rotate_deg: u16,
    pub mirror_x: bool,
    pub mirror_y: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub w: u32,
    pub h: u32,
    pub name: String,
    /// Row-major, w*h tile records.
    pub tiles: Vec<Tile>,
}

/// Capture a rectangle of the world as a blueprint.
pub fn capture_blueprint(
    world: &World,
    x0: i32,
    y0: i32,
    w: i32,
    h: i32,
    name: &str,
) -> Result<Blueprint, SaveError> {
    if w <= 0 || h <= 0 {
        return Err(SaveError::invalid("blueprint rect must be non-empty"));
    }
    if !world.in_bounds(x0, y0) || !world.in_bounds(x0 + w - 1, y0 + h - 1) {
        return Err(SaveError::invalid(format!(
            "blueprint rect {w}x{h} at ({x0},{y0}) leaves the map"
        )));
    }
    let mut tiles = Vec::with_capacity((w as usize) * (h as usize));
    for dy in 0..h {
        for dx in 0..w {
            tiles.push(*world.at(x0 + dx, y0 + dy));
        }
    }
    Ok(Blueprint {
        w: w as u32,
        h: h as u32,
        name: name.to_string(),
        tiles,
    })
}

impl Blueprint {
    fn at(&self, x: u32, y: u32) -> &Tile {
        &self.tiles[(y * self.w + x) as usize]
    }

    /// A copy with the transform baked in (mirror first, then rotation).
    pub fn transformed(&self, t: &BlueprintTransform) -> Blueprint {
        let mut cur = self.clone();
        if t.mirror_x {
            let mut tiles = Vec::with_capacity(cur.tiles.len());
            for y in 0..cur.h {
                for x in 0..cur.w {
                    tiles.push(*cur.at(cur.w - 1 - x, y));
                }
            }
            cur.tiles = tiles;
        }
        if t.mirror_y {
            let mut tiles = Vec::with_capacity(cur.tiles.len());
            for y in 0..cur.h {
                for x in 0..cur.w {
                    tiles.push(*cur.at(x, cur.h - 1 - y));
                }
            }
            cur.tiles = tiles;
        }
        let quarter_turns = (u32::from(t.rotate_deg % 360) / 90) % 4;
        for _ in 0..quarter_turns {
            // 90 degrees clockwise: (x, y) -> (h-1-y, x), dims swap.
            let (nw, nh) = (cur.h, cur.w);
            let mut tiles = Vec::with_capacity(cur.tiles.len());
            for y in 0..nh {
                for x in 0..nw {
                    tiles.push(*cur.at(y, cur.h - 1 - x));
                }
            }
            cur = Blueprint {
                w: nw,
                h: nh,
                name: cur.name,
                tiles,
            };
        }
        cur
    }
}

/// Stamp a blueprint onto the world at (x0, y0). Returns the number of
/// cells written. Out-of-bounds cells are skipped, the water invariant is
/// preserved, and road masks are recomputed over the touched region.
pub fn apply_blueprint(
    world: &mut World,
    blueprint: &Blueprint,
    x0: i32,
    y0: i32,
    mode: BlueprintApplyMode,
    field_mask: u8,
    transform: &BlueprintTransform,
) -> u32 {
    let bp = blueprint.transformed(transform);
    let mut written = 0u32;

    for dy in 0..bp.h {
        for dx in 0..bp.w {
            let (x, y) = (x0 + dx as i32, y0 + dy as i32);
            if !world.in_bounds(x, y) {
                continue;
            }
            if mode == BlueprintApplyMode::Stamp && !world.is_empty_land(x, y) {
                continue;
            }
            let src = *bp.at(dx, dy);
            let dst = world.at_mut(x, y);

            if field_mask & FIELD_TERRAIN != 0 {
                dst.terrain = src.terrain;
            }
            if field_mask & FIELD_OVERLAY != 0 {
                dst.overlay = src.overlay;
            }
            if field_mask & FIELD_HEIGHT != 0 {
                dst.height = src.height;
            }
            if field_mask & FIELD_VARIATION != 0 {
                dst.variation = src.variation;
            }
            if field_mask & FIELD_LEVEL != 0 {
                dst.level = src.level.clamp(1, 3);
            }
            if field_mask & FIELD_OCCUPANTS != 0 {
                dst.occupants = src.occupants;
            }
            if field_mask & FIELD_DISTRICT != 0 {
                dst.district = src.district.min(7);
            }
            // Water may only carry a bridge road.
            if dst.terrain == Terrain::Water
                && !matches!(dst.overlay, Overlay::None | Overlay::Road)
            {
                dst.overlay = Overlay::None;
                dst.occupants = 0;
            }
            written += 1;
        }
    }

    // Repair connection masks across the stamped region and its fringe.
    for dy in -1..=bp.h as i32 {
        for dx in -1..=bp.w as i32 {
            world.update_road_masks_around(x0 + dx, y0 + dy);
        }
    }

    written
}

/// Serialize with the shared compression envelope.
pub fn serialize_blueprint(bp: &Blueprint, compression: PatchCompression) -> Vec<u8> {
    let mut inner = Writer::with_capacity(16 + bp.tiles.len() * 12);
    inner.put_u32(bp.w);
    inner.put_u32(bp.h);
    inner.put_len_prefixed(bp.name.as_bytes());
    for tile in &bp.tiles {
        inner.put_tile(tile);
    }
    let inner = inner.into_bytes();

    let (tag, payload) = match compression {
        PatchCompression::None => (0u8, inner),
        PatchCompression::Lz4 => (1u8, lz4_flex::compress_prepend_size(&inner)),
    };

    let mut out = Writer::with_capacity(payload.len() + 24);
    out.put_bytes(&BLUEPRINT_MAGIC);
    out.put_u32(BLUEPRINT_VERSION);
    out.put_u8(tag);
    out.put_len_prefixed(&payload);
    out.into_bytes()
}

pub fn deserialize_blueprint(bytes: &[u8]) -> Result<Blueprint, SaveError> {
    let mut r = Reader::new(bytes);
    if r.take(BLUEPRINT_MAGIC.len())? != BLUEPRINT_MAGIC {
        return Err(SaveError::format("not a blueprint file (bad magic)"));
    }
    let version = r.u32()?;
    if version != BLUEPRINT_VERSION {
        return Err(SaveError::format(format!(
            "unsupported blueprint version {version}"
        )));
    }
    let tag = r.u8()?;
    let payload = r.len_prefixed()?;
    let inner = match tag {
        0 => payload.to_vec(),
        1 => lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| SaveError::format(format!("lz4 decompress failed: {e}")))?,
        _ => return Err(SaveError::format("unknown blueprint compression tag")),
    };

    let mut r = Reader::new(&inner);
    let w = r.u32()?;
    let h = r.u32()?;
    if w == 0 || h == 0 || w > 4096 || h > 4096 {
        return Err(SaveError::format("invalid blueprint dimensions"));
    }
    let name = String::from_utf8(r.len_prefixed()?.to_vec())
        .map_err(|_| SaveError::format("blueprint name is not valid UTF-8"))?;
    let count = (w as usize) * (h as usize);
    let mut tiles = Vec::with_capacity(count);
    for _ in 0..count {
        tiles.push(r.tile()?);
    }
    if r.remaining() != 0 {
        return Err(SaveError::format("trailing bytes after blueprint tiles"));
    }
    Ok(Blueprint { w, h, name, tiles })
}
