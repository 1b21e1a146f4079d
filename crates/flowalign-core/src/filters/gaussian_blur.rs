use ndarray::{Array2, Axis};

use crate::compute::fill_rows;
use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Separable Gaussian blur with replicated borders.
pub fn gaussian_blur_array(data: &Array2<f32>, sigma: f32) -> Array2<f32> {
    let kernel = gaussian_kernel(sigma);
    let horizontal = convolve_axis(data, &kernel, Axis(1));
    convolve_axis(&horizontal, &kernel, Axis(0))
}

/// Normalised taps covering three sigma on each side.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as i32;
    let denom = 2.0 * sigma * sigma;
    let taps: Vec<f32> = (-radius..=radius)
        .map(|x| (-((x * x) as f32) / denom).exp())
        .collect();
    let total: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / total).collect()
}

fn convolve_axis(data: &Array2<f32>, kernel: &[f32], axis: Axis) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = (kernel.len() / 2) as isize;
    let last = data.len_of(axis) as isize - 1;
    let mut out = Array2::<f32>::zeros((h, w));

    fill_rows(&mut out, h * w >= PARALLEL_PIXEL_THRESHOLD, |row, mut dst| {
        for col in 0..w {
            let centre = (if axis == Axis(1) { col } else { row }) as isize;
            dst[col] = kernel
                .iter()
                .enumerate()
                .map(|(k, &weight)| {
                    let i = (centre + k as isize - radius).clamp(0, last) as usize;
                    let v = if axis == Axis(1) { data[[row, i]] } else { data[[i, col]] };
                    v * weight
                })
                .sum::<f32>();
        }
    });
    out
}
