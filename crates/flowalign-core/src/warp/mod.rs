//! Resampling of images through coordinate tables and translations.

mod cubic;
mod shift;

pub use cubic::{cubic_sample, remap_cubic};
pub use shift::translate_bilinear_wrap;

use ndarray::Array2;

/// How samples outside the image are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Border {
    /// Use the nearest valid pixel.
    Clamp,
    /// Wrap around to the opposite edge.
    Wrap,
}

impl Border {
    #[inline]
    pub(crate) fn resolve(self, i: i64, len: usize) -> usize {
        let len = len as i64;
        match self {
            Self::Clamp => i.clamp(0, len - 1) as usize,
            Self::Wrap => i.rem_euclid(len) as usize,
        }
    }
}

/// Sample `data` at fractional `(y, x)` with bilinear interpolation.
pub fn bilinear_sample(data: &Array2<f32>, y: f64, x: f64, border: Border) -> f32 {
    let (h, w) = data.dim();

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let sample = |r: i64, c: i64| data[[border.resolve(r, h), border.resolve(c, w)]];

    let (x1, y1) = (x0.saturating_add(1), y0.saturating_add(1));
    let v00 = sample(y0, x0);
    let v10 = sample(y0, x1);
    let v01 = sample(y1, x0);
    let v11 = sample(y1, x1);

    v00 * (1.0 - fx) * (1.0 - fy)
        + v10 * fx * (1.0 - fy)
        + v01 * (1.0 - fx) * fy
        + v11 * fx * fy
}
