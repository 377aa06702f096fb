//! Height-field erosion: thermal slope transport, D8 river carving, and
//! box-blur smoothing. Every pass walks tiles in row-major order with the
//! N, E, S, W neighbor order; the sequential evaluation is deliberate, since
//! reordering would change every downstream hash.

use crate::grid::DIRS;

use super::ErosionConfig;

#[inline]
fn idx(w: i32, x: i32, y: i32) -> usize {
    (y as usize) * (w as usize) + (x as usize)
}

/// Slope-limited material transport. Tiles steeper than `thermal_talus`
/// against a 4-neighbor shed `thermal_rate` of the excess per pass.
pub fn thermal(heights: &mut [f32], w: i32, h: i32, cfg: &ErosionConfig) {
    let iterations = cfg.thermal_iterations.max(0);
    let talus = cfg.thermal_talus.max(0.0);
    let rate = cfg.thermal_rate.clamp(0.0, 1.0);
    if iterations == 0 || rate == 0.0 {
        return;
    }

    for _ in 0..iterations {
        for y in 0..h {
            for x in 0..w {
                let i = idx(w, x, y);
                for &(dx, dy) in DIRS.iter() {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let j = idx(w, nx, ny);
                    let diff = heights[i] - heights[j];
                    if diff > talus {
                        // Quarter share per neighbor keeps a pass stable.
                        let moved = rate * (diff - talus) * 0.25;
                        heights[i] -= moved;
                        heights[j] += moved;
                    }
                }
            }
        }
    }
}

/// D8 flow direction: the steepest-descent neighbor among all 8, scanned in
/// a fixed order (cardinals first). Returns None for pits and flats.
fn d8_flow_target(heights: &[f32], w: i32, h: i32, x: i32, y: i32) -> Option<usize> {
    const DIRS8: [(i32, i32); 8] = [
        (0, -1),
        (1, 0),
        (0, 1),
        (-1, 0),
        (1, -1),
        (1, 1),
        (-1, 1),
        (-1, -1),
    ];
    let here = heights[idx(w, x, y)];
    let mut best: Option<(f32, usize)> = None;
    for &(dx, dy) in DIRS8.iter() {
        let (nx, ny) = (x + dx, y + dy);
        if nx < 0 || ny < 0 || nx >= w || ny >= h {
            continue;
        }
        let j = idx(w, nx, ny);
        let drop = here - heights[j];
        if drop <= 0.0 {
            continue;
        }
        match best {
            Some((b, _)) if drop <= b => {}
            _ => best = Some((drop, j)),
        }
    }
    best.map(|(_, j)| j)
}

/// Rivers: accumulate D8 flow downhill and carve beds where the
/// accumulation passes `river_min_accum`.
pub fn carve_rivers(heights: &mut [f32], w: i32, h: i32, cfg: &ErosionConfig) {
    let n = heights.len();
    if n == 0 || cfg.river_min_accum <= 0 || cfg.river_carve <= 0.0 {
        return;
    }

    let mut order: Vec<usize> = (0..n).collect();
    // Highest tiles drain first; ties resolve by index so the order is total.
    order.sort_by(|&a, &b| {
        heights[b]
            .partial_cmp(&heights[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut accum = vec![1.0f32; n];
    for &i in &order {
        let x = (i % w as usize) as i32;
        let y = (i / w as usize) as i32;
        if let Some(j) = d8_flow_target(heights, w, h, x, y) {
            accum[j] += accum[i];
        }
    }

    let min_accum = cfg.river_min_accum as f32;
    for i in 0..n {
        if accum[i] >= min_accum {
            let carve = cfg.river_carve * accum[i].powf(cfg.river_carve_power);
            heights[i] = (heights[i] - carve).max(0.0);
        }
    }
}

/// Box-blur smoothing passes blended by `smooth_rate`.
pub fn smooth(heights: &mut [f32], w: i32, h: i32, cfg: &ErosionConfig) {
    let iterations = cfg.smooth_iterations.max(0);
    let rate = cfg.smooth_rate.clamp(0.0, 1.0);
    if iterations == 0 || rate == 0.0 || heights.is_empty() {
        return;
    }

    let mut blurred = vec![0.0f32; heights.len()];
    for _ in 0..iterations {
        for y in 0..h {
            for x in 0..w {
                let mut sum = 0.0f32;
                let mut count = 0.0f32;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let (nx, ny) = (x + dx, y + dy);
                        if nx < 0 || ny < 0 || nx >= w || ny >= h {
                            continue;
                        }
                        sum += heights[idx(w, nx, ny)];
                        count += 1.0;
                    }
                }
                let i = idx(w, x, y);
                blurred[i] = heights[i] + (sum / count - heights[i]) * rate;
            }
        }
        heights.copy_from_slice(&blurred);
    }
}

/// Snap heights to 1/scale steps and clamp into [0, 1]. This is the only
/// defense the pipeline needs against cross-host floating-point drift.
pub fn quantize(heights: &mut [f32], scale: i32) {
    let scale = scale.max(1) as f32;
    for v in heights.iter_mut() {
        *v = ((*v * scale).round() / scale).clamp(0.0, 1.0);
    }
}
