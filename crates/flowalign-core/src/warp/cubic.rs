use ndarray::Array2;

use crate::compute::{fill_rows, DevicePreference};
use crate::consts::CUBIC_A;
use crate::error::{AlignError, Result};
use crate::frame::RemapTable;

use super::Border;

/// Resample `image` at the absolute coordinates of `table` using Keys cubic
/// convolution. Taps outside the image are clamped to the nearest pixel.
///
/// The output has the table's shape.
pub fn remap_cubic(
    image: &Array2<f32>,
    table: &RemapTable,
    device: DevicePreference,
) -> Result<Array2<f32>> {
    if table.x.dim() != table.y.dim() {
        return Err(AlignError::dimension_mismatch(
            "remap table",
            table.x.dim(),
            table.y.dim(),
        ));
    }
    let (h, w) = table.dim();
    let mut result = Array2::<f32>::zeros((h, w));

    fill_rows(&mut result, device.use_parallel(h * w), |row, mut out| {
        for col in 0..w {
            out[col] = cubic_sample(image, table.y[[row, col]], table.x[[row, col]]);
        }
    });

    Ok(result)
}

/// Sample `data` at fractional `(y, x)` on a 4x4 neighbourhood.
pub fn cubic_sample(data: &Array2<f32>, y: f32, x: f32) -> f32 {
    let (h, w) = data.dim();
    let x0 = x.floor();
    let y0 = y.floor();
    let wx = cubic_weights(x - x0);
    let wy = cubic_weights(y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut sum = 0.0f32;
    for (j, &ky) in wy.iter().enumerate() {
        let r = Border::Clamp.resolve(y0.saturating_add(j as i64 - 1), h);
        let mut row_sum = 0.0f32;
        for (i, &kx) in wx.iter().enumerate() {
            let c = Border::Clamp.resolve(x0.saturating_add(i as i64 - 1), w);
            row_sum += data[[r, c]] * kx;
        }
        sum += row_sum * ky;
    }
    sum
}

/// Weights of the taps at offsets -1, 0, 1, 2 for fractional position `t`.
fn cubic_weights(t: f32) -> [f32; 4] {
    let a = CUBIC_A;
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let w2 = ((a + 2.0) * (1.0 - t) - (a + 3.0)) * (1.0 - t) * (1.0 - t) + 1.0;
    [w0, w1, w2, 1.0 - w0 - w1 - w2]
}
