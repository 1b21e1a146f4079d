use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{AlignError, Result};
use crate::frame::DisplacementField;

/// Agreement between the terminal flow of one frame and that of the frame
/// before it. Informational only; nothing downstream acts on it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowConsistencyRecord {
    /// 1-based index of the later frame of the pair.
    pub frame: usize,
    pub mean_abs_x: f64,
    pub std_x: f64,
    pub mean_abs_y: f64,
    pub std_y: f64,
}

/// Statistics of `current - previous`, per component.
pub fn flow_consistency(
    frame: usize,
    previous: &DisplacementField,
    current: &DisplacementField,
) -> Result<FlowConsistencyRecord> {
    if previous.dim() != current.dim() {
        return Err(AlignError::dimension_mismatch(
            "flow consistency",
            previous.dim(),
            current.dim(),
        ));
    }
    let (mean_abs_x, std_x) = difference_stats(&previous.dx, &current.dx);
    let (mean_abs_y, std_y) = difference_stats(&previous.dy, &current.dy);
    Ok(FlowConsistencyRecord {
        frame,
        mean_abs_x,
        std_x,
        mean_abs_y,
        std_y,
    })
}

/// `(mean |d|, sqrt(max(0, mean(d^2) - mean(d)^2)))` with `d = b - a`.
fn difference_stats(a: &Array2<f32>, b: &Array2<f32>) -> (f64, f64) {
    let n = a.len().max(1) as f64;
    let (mut sum, mut sum_abs, mut sum_sq) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let d = y as f64 - x as f64;
        sum += d;
        sum_abs += d.abs();
        sum_sq += d * d;
    }
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    (sum_abs / n, variance.sqrt())
}
