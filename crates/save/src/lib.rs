//! Persistence for the simulation engine: versioned binary world saves
//! with delta compression and CRC integrity, world patches, blueprints,
//! and deterministic replay journals.

pub mod blueprint;
pub mod codec;
pub mod crc;
pub mod error;
pub mod patch;
pub mod replay;
pub mod world_file;

#[cfg(test)]
mod corruption_tests;

pub use blueprint::{
    apply_blueprint, capture_blueprint, deserialize_blueprint, serialize_blueprint, Blueprint,
    BlueprintApplyMode, BlueprintTransform, FIELD_ALL,
};
pub use error::SaveError;
pub use patch::{
    apply_world_patch, deserialize_world_patch, make_world_patch, serialize_world_patch,
    PatchCompression, WorldPatch,
};
pub use replay::{pack_replay, play_replay, PlayOptions, Replay, ReplayEvent, ReplayPlayback};
pub use world_file::{
    load_world_binary, load_world_from_bytes, save_world_binary, save_world_to_bytes,
    save_world_to_bytes_versioned, CURRENT_VERSION, MAGIC,
};
