use ndarray::Array2;

use crate::consts::{FLOW_MIN_LEVEL_SIZE, PYRAMID_BLUR_SIGMA};
use crate::filters::gaussian_blur::gaussian_blur_array;
use crate::frame::DisplacementField;
use crate::warp::{bilinear_sample, Border};

/// Number of 2x reductions to perform for an `h x w` image, bounded by
/// `levels - 1` and by the smallest allowed level size.
pub(super) fn reduction_count(h: usize, w: usize, levels: usize) -> usize {
    let (mut hh, mut ww) = (h, w);
    let mut count = 0;
    while count + 1 < levels {
        let (nh, nw) = (hh.div_ceil(2), ww.div_ceil(2));
        if nh.min(nw) < FLOW_MIN_LEVEL_SIZE {
            break;
        }
        hh = nh;
        ww = nw;
        count += 1;
    }
    count
}

/// Build a Gaussian pyramid with `reductions` downsampled levels.
///
/// Index 0 is the original, index `reductions` the coarsest.
pub(super) fn build_pyramid(data: &Array2<f32>, reductions: usize) -> Vec<Array2<f32>> {
    let mut pyramid = Vec::with_capacity(reductions + 1);
    pyramid.push(data.clone());

    for _ in 0..reductions {
        let previous = &pyramid[pyramid.len() - 1];
        let blurred = gaussian_blur_array(previous, PYRAMID_BLUR_SIGMA);
        pyramid.push(downsample_2x(&blurred));
    }

    pyramid
}

/// Downsample an image by 2x by taking every other pixel.
pub(super) fn downsample_2x(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    Array2::from_shape_fn((h.div_ceil(2), w.div_ceil(2)), |(r, c)| data[[r * 2, c * 2]])
}

/// Carry a full-resolution field down `reductions` levels, halving vectors
/// at each step.
pub(super) fn reduce_field(field: &DisplacementField, reductions: usize) -> DisplacementField {
    let mut current = field.clone();
    for _ in 0..reductions {
        current = DisplacementField {
            dx: downsample_2x(&current.dx).mapv(|v| v * 0.5),
            dy: downsample_2x(&current.dy).mapv(|v| v * 0.5),
        };
    }
    current
}

/// Bring a coarse field to the next finer level of shape `dim`, doubling
/// vectors.
pub(super) fn expand_field(field: &DisplacementField, dim: (usize, usize)) -> DisplacementField {
    let expand = |coarse: &Array2<f32>| {
        Array2::from_shape_fn(dim, |(r, c)| {
            2.0 * bilinear_sample(coarse, r as f64 * 0.5, c as f64 * 0.5, Border::Clamp)
        })
    };
    DisplacementField {
        dx: expand(&field.dx),
        dy: expand(&field.dy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_count_respects_minimum_level_size() {
        assert_eq!(reduction_count(64, 64, 6), 3);
        assert_eq!(reduction_count(4096, 4096, 6), 5);
        assert_eq!(reduction_count(10, 10, 6), 0);
    }

    #[test]
    fn reduce_then_expand_keeps_uniform_field() {
        let field = DisplacementField::uniform(32, 32, 4.0, -2.0);
        let coarse = reduce_field(&field, 2);
        assert_eq!(coarse.dim(), (8, 8));
        assert!(coarse.dx.iter().all(|&v| (v - 1.0).abs() < 1e-6));
        let fine = expand_field(&coarse, (16, 16));
        assert!(fine.dy.iter().all(|&v| (v + 1.0).abs() < 1e-6));
    }
}
