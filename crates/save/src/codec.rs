//! Little-endian byte plumbing shared by every file format in this crate.

use simulation::grid::{Tile, TILE_RECORD_SIZE};
use simulation::stats::{Stats, STATS_RECORD_SIZE};

use crate::error::SaveError;

/// Append-only little-endian writer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// u32 length followed by the raw bytes.
    pub fn put_len_prefixed(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.put_bytes(bytes);
    }

    pub fn put_tile(&mut self, tile: &Tile) {
        self.put_bytes(&tile.to_bytes());
    }

    pub fn put_stats(&mut self, stats: &Stats) {
        self.put_bytes(&stats.to_packed_bytes());
    }
}

/// Cursor over a byte slice; every read fails loudly on truncation.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], SaveError> {
        if self.remaining() < n {
            return Err(SaveError::format(format!(
                "truncated stream: need {n} bytes at offset {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, SaveError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, SaveError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, SaveError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64, SaveError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// u32 length-prefixed byte run.
    pub fn len_prefixed(&mut self) -> Result<&'a [u8], SaveError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    pub fn tile(&mut self) -> Result<Tile, SaveError> {
        let b = self.take(TILE_RECORD_SIZE)?;
        let mut rec = [0u8; TILE_RECORD_SIZE];
        rec.copy_from_slice(b);
        Tile::from_bytes(&rec)
            .ok_or_else(|| SaveError::format("tile record holds an out-of-range field"))
    }

    pub fn stats(&mut self) -> Result<Stats, SaveError> {
        let b = self.take(STATS_RECORD_SIZE)?;
        let mut rec = [0u8; STATS_RECORD_SIZE];
        rec.copy_from_slice(b);
        Ok(Stats::from_packed_bytes(&rec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_roundtrip() {
        let mut w = Writer::new();
        w.put_u8(0xAB);
        w.put_u16(0x1234);
        w.put_u32(0xDEAD_BEEF);
        w.put_u64(0x0102_0304_0506_0708);
        w.put_len_prefixed(b"hello");
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.u8().unwrap(), 0xAB);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.len_prefixed().unwrap(), b"hello");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncation_is_a_format_error() {
        let mut r = Reader::new(&[1, 2]);
        let err = r.u32().unwrap_err();
        assert!(format!("{err}").contains("truncated"));

        let mut w = Writer::new();
        w.put_u32(100); // promises 100 bytes that never follow
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert!(r.len_prefixed().is_err());
    }

    #[test]
    fn tile_and_stats_roundtrip() {
        let tile = Tile {
            occupants: 9,
            level: 2,
            ..Tile::default()
        };
        let mut stats = Stats::default();
        stats.day = 5;
        stats.money = -1;

        let mut w = Writer::new();
        w.put_tile(&tile);
        w.put_stats(&stats);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.tile().unwrap(), tile);
        let restored = r.stats().unwrap();
        assert_eq!(restored.day, 5);
        assert_eq!(restored.money, -1);
    }

    #[test]
    fn corrupt_tile_enum_rejected() {
        let mut rec = Tile::default().to_bytes();
        rec[1] = 99; // overlay out of range
        let mut r = Reader::new(&rec);
        assert!(r.tile().is_err());
    }
}
