//! Base elevation synthesis: multi-octave value noise plus the terrain
//! preset masks.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

use crate::rng::SplitMix64;

use super::{ProcGenConfig, TerrainPreset};

const OCTAVES: i32 = 5;
const GAIN: f32 = 0.5;
const LACUNARITY: f32 = 2.0;

/// Secondary noise frequency for the Archipelago ripple.
const RIPPLE_FREQUENCY_MULT: f32 = 3.0;

fn value_noise(seed: i32, frequency: f32) -> FastNoiseLite {
    let mut noise = FastNoiseLite::with_seed(seed);
    noise.set_noise_type(Some(NoiseType::Value));
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(OCTAVES));
    noise.set_fractal_gain(Some(GAIN));
    noise.set_fractal_lacunarity(Some(LACUNARITY));
    noise.set_frequency(Some(frequency));
    noise
}

/// Populate a row-major heightmap in [0, 1] for the given seed and config.
pub fn generate(w: i32, h: i32, seed: u64, cfg: &ProcGenConfig) -> Vec<f32> {
    let n = (w as usize) * (h as usize);
    let mut heights = vec![0.0f32; n];
    if n == 0 {
        return heights;
    }

    // All generator randomness roots in SplitMix64(seed); the noise layers
    // each draw their own sub-seed from the stream.
    let mut rng = SplitMix64::new(seed);
    let base = value_noise(rng.next_u64() as i32, cfg.terrain_scale);
    let ripple = value_noise(
        rng.next_u64() as i32,
        cfg.terrain_scale * RIPPLE_FREQUENCY_MULT,
    );

    let strength = cfg.terrain_preset_strength.clamp(0.0, 5.0);
    let wf = (w.max(2) - 1) as f32;
    let hf = (h.max(2) - 1) as f32;

    for y in 0..h {
        for x in 0..w {
            let raw = base.get_noise_2d(x as f32, y as f32);
            // Value fBm outputs roughly [-1, 1]; normalize.
            let mut height = ((raw + 1.0) * 0.5).clamp(0.0, 1.0);

            // Normalized coordinates in [-1, 1] for the radial masks.
            let nx = (x as f32 / wf) * 2.0 - 1.0;
            let ny = (y as f32 / hf) * 2.0 - 1.0;
            let d2 = (nx * nx + ny * ny).min(2.0);

            height += match cfg.terrain_preset {
                TerrainPreset::Classic => 0.0,
                TerrainPreset::Island => -0.35 * strength * d2,
                TerrainPreset::Archipelago => {
                    let r = ripple.get_noise_2d(x as f32, y as f32);
                    -0.35 * strength * d2 + 0.18 * strength * r
                }
                TerrainPreset::InlandSea => -0.35 * strength * (1.0 - d2).max(0.0),
                TerrainPreset::RiverValley => {
                    // A sinusoidal low corridor across the map.
                    let corridor_y = hf * 0.5 + (x as f32 * 0.07).sin() * hf * 0.18;
                    let dist = (y as f32 - corridor_y).abs() / hf.max(1.0);
                    -0.40 * strength * (1.0 - dist * 6.0).max(0.0)
                }
                TerrainPreset::MountainRing => {
                    let d = d2.sqrt();
                    0.40 * strength * (1.0 - (d - 0.65).abs() * 5.0).max(0.0)
                }
            };

            heights[(y as usize) * (w as usize) + (x as usize)] = height.clamp(0.0, 1.0);
        }
    }

    heights
}
