use ndarray::Array2;

use crate::compute::{fill_rows, DevicePreference};
use crate::frame::CoarseShift;

use super::{bilinear_sample, Border};

/// Move image content by `shift` with bilinear interpolation, wrapping
/// around the borders: `out(r, c) = in(r - shift.y, c - shift.x)`.
pub fn translate_bilinear_wrap(
    data: &Array2<f32>,
    shift: CoarseShift,
    device: DevicePreference,
) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));

    fill_rows(&mut result, device.use_parallel(h * w), |row, mut out| {
        let src_y = row as f64 - shift.y;
        for col in 0..w {
            out[col] = bilinear_sample(data, src_y, col as f64 - shift.x, Border::Wrap);
        }
    });

    result
}
