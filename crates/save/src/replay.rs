//! Deterministic replay journals (`.isoreplay`).
//!
//! A replay embeds a full base save plus an ordered event stream. Playback
//! reproduces the target state exactly: ticks re-run the simulator, patches
//! apply config/tile deltas, snapshots swap in full saves, and hash asserts
//! verify the reproduction along the way.

use simulation::config::SimConfig;
use simulation::grid::World;
use simulation::hash::hash_world;
use simulation::procgen::ProcGenConfig;
use simulation::sim::Simulator;

use crate::codec::{Reader, Writer};
use crate::error::SaveError;
use crate::patch::{
    apply_world_patch, deserialize_world_patch, make_world_patch, serialize_world_patch,
    PatchCompression,
};
use crate::world_file::load_world_from_bytes;

pub const REPLAY_MAGIC: [u8; 8] = *b"ISORPLY\0";
pub const REPLAY_VERSION: u32 = 1;

// Event tags on the wire.
const TAG_TICK: u8 = 0;
const TAG_PATCH: u8 = 1;
const TAG_SNAPSHOT: u8 = 2;
const TAG_NOTE: u8 = 3;
const TAG_ASSERT_HASH: u8 = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEvent {
    /// Advance the simulation by n days.
    Tick(u32),
    /// A serialized world patch.
    Patch(Vec<u8>),
    /// A full embedded save replacing the current state.
    Snapshot(Vec<u8>),
    /// Free-form annotation; ignored by playback.
    Note(String),
    /// Verify the world hash mid-stream.
    AssertHash {
        expected: u64,
        label: String,
        include_stats: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replay {
    /// Full base save bytes (the standard world save format).
    pub base_save: Vec<u8>,
    pub events: Vec<ReplayEvent>,
}

impl Replay {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(self.base_save.len() + 64);
        w.put_bytes(&REPLAY_MAGIC);
        w.put_u32(REPLAY_VERSION);
        w.put_len_prefixed(&self.base_save);
        w.put_u32(self.events.len() as u32);
        for ev in &self.events {
            match ev {
                ReplayEvent::Tick(n) => {
                    w.put_u8(TAG_TICK);
                    w.put_u32(*n);
                }
                ReplayEvent::Patch(bytes) => {
                    w.put_u8(TAG_PATCH);
                    w.put_len_prefixed(bytes);
                }
                ReplayEvent::Snapshot(bytes) => {
                    w.put_u8(TAG_SNAPSHOT);
                    w.put_len_prefixed(bytes);
                }
                ReplayEvent::Note(text) => {
                    w.put_u8(TAG_NOTE);
                    w.put_len_prefixed(text.as_bytes());
                }
                ReplayEvent::AssertHash {
                    expected,
                    label,
                    include_stats,
                } => {
                    w.put_u8(TAG_ASSERT_HASH);
                    w.put_u64(*expected);
                    w.put_u8(u8::from(*include_stats));
                    w.put_len_prefixed(label.as_bytes());
                }
            }
        }
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Replay, SaveError> {
        let mut r = Reader::new(bytes);
        if r.take(REPLAY_MAGIC.len())? != REPLAY_MAGIC {
            return Err(SaveError::format("not a replay file (bad magic)"));
        }
        let version = r.u32()?;
        if version != REPLAY_VERSION {
            return Err(SaveError::format(format!(
                "unsupported replay version {version}"
            )));
        }
        let base_save = r.len_prefixed()?.to_vec();
        let count = r.u32()? as usize;
        let mut events = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            let tag = r.u8()?;
            let ev = match tag {
                TAG_TICK => ReplayEvent::Tick(r.u32()?),
                TAG_PATCH => ReplayEvent::Patch(r.len_prefixed()?.to_vec()),
                TAG_SNAPSHOT => ReplayEvent::Snapshot(r.len_prefixed()?.to_vec()),
                TAG_NOTE => ReplayEvent::Note(
                    String::from_utf8(r.len_prefixed()?.to_vec())
                        .map_err(|_| SaveError::format("replay note is not valid UTF-8"))?,
                ),
                TAG_ASSERT_HASH => {
                    let expected = r.u64()?;
                    let include_stats = r.u8()? != 0;
                    let label = String::from_utf8(r.len_prefixed()?.to_vec())
                        .map_err(|_| SaveError::format("assert label is not valid UTF-8"))?;
                    ReplayEvent::AssertHash {
                        expected,
                        label,
                        include_stats,
                    }
                }
                other => {
                    return Err(SaveError::format(format!(
                        "unknown replay event tag {other}"
                    )))
                }
            };
            events.push(ev);
        }
        if r.remaining() != 0 {
            return Err(SaveError::format("trailing bytes after replay events"));
        }
        Ok(Replay { base_save, events })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlayOptions {
    /// Enforce patch base/target hashes.
    pub strict: bool,
    /// Downgrade AssertHash failures to warnings.
    pub ignore_asserts: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            strict: true,
            ignore_asserts: false,
        }
    }
}

/// Final state after playback, plus everything non-fatal worth reporting.
#[derive(Debug)]
pub struct ReplayPlayback {
    pub world: World,
    pub proc_cfg: ProcGenConfig,
    pub sim_cfg: SimConfig,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
    pub events_played: usize,
}

/// Pack a `(base, target)` pair into a replay whose playback reproduces
/// the target exactly: one patch plus a final hash assert.
pub fn pack_replay(
    base_save: &[u8],
    target_save: &[u8],
    compression: PatchCompression,
    notes: &[String],
) -> Result<Replay, SaveError> {
    let (base_world, base_proc, base_sim) = load_world_from_bytes(base_save)?;
    let (target_world, target_proc, target_sim) = load_world_from_bytes(target_save)?;

    let patch = make_world_patch(
        &base_world,
        &base_proc,
        &base_sim,
        &target_world,
        &target_proc,
        &target_sim,
        true,
        true,
        true,
    )?;

    let mut events: Vec<ReplayEvent> =
        notes.iter().map(|n| ReplayEvent::Note(n.clone())).collect();
    events.push(ReplayEvent::Patch(serialize_world_patch(&patch, compression)));
    events.push(ReplayEvent::AssertHash {
        expected: hash_world(&target_world, true),
        label: "final".to_string(),
        include_stats: true,
    });

    Ok(Replay {
        base_save: base_save.to_vec(),
        events,
    })
}

/// Play a replay from its base save through every event.
///
/// The optional progress callback fires before each event with
/// `(index, total)`; returning false cancels playback.
pub fn play_replay(
    replay: &Replay,
    opts: &PlayOptions,
    mut progress: Option<&mut dyn FnMut(usize, usize) -> bool>,
) -> Result<ReplayPlayback, SaveError> {
    let (mut world, mut proc_cfg, mut sim_cfg) = load_world_from_bytes(&replay.base_save)?;
    let mut sim = Simulator::new(sim_cfg.clone());
    let mut notes = Vec::new();
    let mut warnings = Vec::new();

    let total = replay.events.len();
    for (i, ev) in replay.events.iter().enumerate() {
        if let Some(cb) = progress.as_deref_mut() {
            if !cb(i, total) {
                return Err(SaveError::Cancelled);
            }
        }
        match ev {
            ReplayEvent::Tick(n) => {
                for _ in 0..*n {
                    sim.step_once(&mut world);
                }
            }
            ReplayEvent::Patch(bytes) => {
                let patch = deserialize_world_patch(bytes)?;
                let sim_cfg_before = sim_cfg.clone();
                apply_world_patch(&mut world, &mut proc_cfg, &mut sim_cfg, &patch, opts.strict)?;
                if sim_cfg != sim_cfg_before {
                    sim = Simulator::new(sim_cfg.clone());
                }
            }
            ReplayEvent::Snapshot(bytes) => {
                let (w, p, s) = load_world_from_bytes(bytes)?;
                world = w;
                proc_cfg = p;
                sim_cfg = s;
                sim = Simulator::new(sim_cfg.clone());
            }
            ReplayEvent::Note(text) => notes.push(text.clone()),
            ReplayEvent::AssertHash {
                expected,
                label,
                include_stats,
            } => {
                let actual = hash_world(&world, *include_stats);
                if actual != *expected {
                    let msg = format!(
                        "hash assert '{label}' failed: expected {expected:#018X}, got {actual:#018X}"
                    );
                    if opts.ignore_asserts {
                        log::warn!("{msg}");
                        warnings.push(msg);
                    } else {
                        return Err(SaveError::format(msg));
                    }
                }
            }
        }
    }

    Ok(ReplayPlayback {
        world,
        proc_cfg,
        sim_cfg,
        notes,
        warnings,
        events_played: total,
    })
}
