//! Palette extraction by modified median cut (MMCQ).
//!
//! Pixels are reduced to 5 significant bits per channel and counted in a
//! 32x32x32 histogram. Colour-space boxes are split at the population median
//! along their widest axis: first by population until three quarters of the
//! target count is reached, then by population times volume. Every box is
//! shrunk to the cells it actually occupies, so a split always yields two
//! non-empty halves and a single-cell box is final.

use serde::Serialize;
use tracing::debug;

use super::PixelBuffer;
use crate::color::{Rgb, rgb_to_hex};
use crate::error::ToolError;

pub const MIN_COLORS: u8 = 2;
pub const MAX_COLORS: u8 = 8;
pub const DEFAULT_QUALITY: u32 = 10;

const SIGBITS: usize = 5;
const RSHIFT: usize = 8 - SIGBITS;
const SIDE: usize = 1 << SIGBITS;
const MAX_ITERATIONS: usize = 1000;
const FRACT_BY_POPULATION: f64 = 0.75;
const MIN_ALPHA: u8 = 125;
const NEAR_WHITE: u8 = 250;
// The dominant colour is the head of a five-colour quantization.
const DOMINANT_COLORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub dominant: String,
    pub palette: Vec<String>,
}

struct Histogram(Vec<u32>);

impl Histogram {
    fn from_samples(samples: &[[u8; 3]]) -> Self {
        let mut cells = vec![0u32; SIDE * SIDE * SIDE];
        for rgb in samples {
            let [r, g, b] = rgb.map(|c| usize::from(c) >> RSHIFT);
            cells[index([r, g, b])] += 1;
        }
        Self(cells)
    }

    fn get(&self, cell: [usize; 3]) -> u64 {
        u64::from(self.0[index(cell)])
    }
}

fn index([r, g, b]: [usize; 3]) -> usize {
    (r << (2 * SIGBITS)) + (g << SIGBITS) + b
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VBox {
    lo: [usize; 3],
    hi: [usize; 3],
    count: u64,
}

impl VBox {
    /// Box over `lo..=hi`, tightened to its occupied cells. `None` when empty.
    fn fitted(lo: [usize; 3], hi: [usize; 3], histo: &Histogram) -> Option<Self> {
        let mut min = [usize::MAX; 3];
        let mut max = [0usize; 3];
        let mut count = 0;
        for cell in cells(lo, hi) {
            let n = histo.get(cell);
            if n == 0 {
                continue;
            }
            count += n;
            for axis in 0..3 {
                min[axis] = min[axis].min(cell[axis]);
                max[axis] = max[axis].max(cell[axis]);
            }
        }
        (count > 0).then_some(Self {
            lo: min,
            hi: max,
            count,
        })
    }

    fn volume(&self) -> u64 {
        (0..3).map(|axis| (self.hi[axis] - self.lo[axis] + 1) as u64).product()
    }

    fn priority(&self) -> u64 {
        self.count * self.volume()
    }

    fn average(&self, histo: &Histogram) -> Rgb {
        let mult = (1usize << RSHIFT) as f64;
        let mut total = 0.0;
        let mut sums = [0.0f64; 3];
        for cell in cells(self.lo, self.hi) {
            let n = histo.get(cell) as f64;
            if n == 0.0 {
                continue;
            }
            total += n;
            for axis in 0..3 {
                sums[axis] += n * (cell[axis] as f64 + 0.5) * mult;
            }
        }
        let channel = |axis: usize| {
            let value = if total > 0.0 {
                sums[axis] / total
            } else {
                mult * (self.lo[axis] + self.hi[axis] + 1) as f64 / 2.0
            };
            value.trunc().clamp(0.0, 255.0) as u8
        };
        Rgb::new(channel(0), channel(1), channel(2))
    }
}

fn cells(lo: [usize; 3], hi: [usize; 3]) -> impl Iterator<Item = [usize; 3]> {
    (lo[0]..=hi[0]).flat_map(move |r| {
        (lo[1]..=hi[1]).flat_map(move |g| (lo[2]..=hi[2]).map(move |b| [r, g, b]))
    })
}

/// Splits `vbox` at the population median of its widest axis.
fn median_cut(histo: &Histogram, vbox: &VBox) -> Option<(VBox, VBox)> {
    if vbox.volume() <= 1 {
        return None;
    }
    let widths = [0, 1, 2].map(|axis| vbox.hi[axis] - vbox.lo[axis] + 1);
    let widest = widths.iter().copied().max().unwrap_or(1);
    let axis = widths.iter().position(|w| *w == widest).unwrap_or(0);
    let (lo, hi) = (vbox.lo[axis], vbox.hi[axis]);

    let mut partial = [0u64; SIDE];
    let mut total = 0u64;
    for i in lo..=hi {
        let mut slice_lo = vbox.lo;
        let mut slice_hi = vbox.hi;
        slice_lo[axis] = i;
        slice_hi[axis] = i;
        total += cells(slice_lo, slice_hi).map(|c| histo.get(c)).sum::<u64>();
        partial[i] = total;
    }

    let cut_at = (lo..=hi).find(|&i| partial[i] as f64 > total as f64 / 2.0)?;
    let left = cut_at - lo;
    let right = hi - cut_at;
    let mut d2 = if left <= right {
        (hi - 1).min(cut_at + right / 2)
    } else {
        let shifted = (cut_at as f64 - 1.0 - left as f64 / 2.0).trunc() as isize;
        shifted.max(lo as isize) as usize
    };
    while d2 < hi && partial[d2] == 0 {
        d2 += 1;
    }
    while d2 > lo && total - partial[d2] == 0 && partial[d2 - 1] != 0 {
        d2 -= 1;
    }

    let mut first_hi = vbox.hi;
    first_hi[axis] = d2;
    let mut second_lo = vbox.lo;
    second_lo[axis] = d2 + 1;
    let first = VBox::fitted(vbox.lo, first_hi, histo)?;
    let second = VBox::fitted(second_lo, vbox.hi, histo)?;
    Some((first, second))
}

/// Repeatedly splits the highest-ranked splittable box until `target` boxes exist.
fn split_until(queue: &mut Vec<VBox>, target: usize, histo: &Histogram, rank: fn(&VBox) -> u64) {
    for _ in 0..MAX_ITERATIONS {
        if queue.len() >= target {
            return;
        }
        queue.sort_by_key(rank);
        let Some(pos) = queue.iter().rposition(|vbox| vbox.volume() > 1) else {
            return;
        };
        let vbox = queue.remove(pos);
        match median_cut(histo, &vbox) {
            Some((first, second)) => {
                queue.push(first);
                queue.push(second);
            }
            None => {
                queue.push(vbox);
                return;
            }
        }
    }
}

fn quantize(histo: &Histogram, root: VBox, max_colors: usize) -> Vec<Rgb> {
    let mut queue = vec![root];
    let by_population = (FRACT_BY_POPULATION * max_colors as f64).ceil() as usize;
    split_until(&mut queue, by_population, histo, |vbox| vbox.count);
    split_until(&mut queue, max_colors, histo, VBox::priority);

    queue.sort_by_key(VBox::priority);
    queue
        .iter()
        .rev()
        .take(max_colors)
        .map(|vbox| vbox.average(histo))
        .collect()
}

fn sample(pixels: &PixelBuffer, quality: u32, keep_white: bool) -> Vec<[u8; 3]> {
    let step = (if quality == 0 { DEFAULT_QUALITY } else { quality }) as usize;
    pixels
        .data
        .chunks_exact(4)
        .step_by(step)
        .filter(|px| px[3] >= MIN_ALPHA)
        .filter(|px| keep_white || !(px[0] > NEAR_WHITE && px[1] > NEAR_WHITE && px[2] > NEAR_WHITE))
        .map(|px| [px[0], px[1], px[2]])
        .collect()
}

pub fn extract_palette(pixels: &PixelBuffer, count: u8) -> Result<Palette, ToolError> {
    extract_palette_with_quality(pixels, count, DEFAULT_QUALITY)
}

/// `quality` samples every n-th pixel; `0` falls back to the default step.
pub fn extract_palette_with_quality(
    pixels: &PixelBuffer,
    count: u8,
    quality: u32,
) -> Result<Palette, ToolError> {
    if !(MIN_COLORS..=MAX_COLORS).contains(&count) {
        return Err(ToolError::Validation(format!(
            "Color count must be between {MIN_COLORS} and {MAX_COLORS}"
        )));
    }
    pixels.check()?;

    let mut samples = sample(pixels, quality, false);
    if samples.is_empty() {
        samples = sample(pixels, quality, true);
    }
    if samples.is_empty() {
        return Err(ToolError::Processing(
            "Failed to extract colors from image: no opaque pixels".into(),
        ));
    }
    debug!(samples = samples.len(), count, "extract palette");

    let histo = Histogram::from_samples(&samples);
    let root = VBox::fitted([0; 3], [SIDE - 1; 3], &histo)
        .ok_or_else(|| ToolError::Processing("Failed to extract colors from image".into()))?;

    let dominant = quantize(&histo, root, DOMINANT_COLORS)
        .first()
        .copied()
        .ok_or_else(|| ToolError::Processing("Failed to extract colors from image".into()))?;
    let colors = quantize(&histo, root, usize::from(count));
    let palette = colors
        .iter()
        .cycle()
        .take(usize::from(count))
        .map(|rgb| rgb_to_hex(*rgb))
        .collect();

    Ok(Palette {
        dominant: rgb_to_hex(dominant),
        palette,
    })
}
