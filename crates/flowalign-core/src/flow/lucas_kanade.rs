//! Dense pyramidal Lucas-Kanade flow.
//!
//! Each pyramid level refines the current field by solving the windowed
//! normal equations of the brightness-constancy linearisation at every
//! pixel. Window sums come from integral images, so the cost per level is
//! independent of the window size.

use ndarray::Array2;
use tracing::trace;

use crate::compute::{fill_row_pairs, fill_rows, DevicePreference};
use crate::consts::FLOW_REGULARIZATION;
use crate::error::{AlignError, Result};
use crate::frame::DisplacementField;
use crate::warp::{bilinear_sample, Border};

use super::pyramid::{build_pyramid, expand_field, reduce_field, reduction_count};
use super::{FlowEngine, FlowParams};

/// Coarse-to-fine dense flow with warm-start support.
pub struct LucasKanadeEngine {
    params: FlowParams,
    device: DevicePreference,
}

impl LucasKanadeEngine {
    pub fn new(params: FlowParams, device: DevicePreference) -> Self {
        Self { params, device }
    }

    pub fn params(&self) -> &FlowParams {
        &self.params
    }

    /// One Lucas-Kanade step at a single pyramid level.
    fn refine(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
        flow: &DisplacementField,
    ) -> DisplacementField {
        let (h, w) = reference.dim();
        let parallel = self.device.use_parallel(h * w);

        let mut warped = Array2::<f32>::zeros((h, w));
        fill_rows(&mut warped, parallel, |row, mut out| {
            for col in 0..w {
                let y = row as f64 + flow.dy[[row, col]] as f64;
                let x = col as f64 + flow.dx[[row, col]] as f64;
                out[col] = bilinear_sample(target, y, x, Border::Clamp);
            }
        });

        let mut products = Products::zeros(h, w);
        for row in 0..h {
            for col in 0..w {
                let gx = 0.5 * (central_x(reference, row, col) + central_x(&warped, row, col));
                let gy = 0.5 * (central_y(reference, row, col) + central_y(&warped, row, col));
                let it = (warped[[row, col]] - reference[[row, col]]) as f64;
                let (gx, gy) = (gx as f64, gy as f64);
                products.xx[[row, col]] = gx * gx;
                products.xy[[row, col]] = gx * gy;
                products.yy[[row, col]] = gy * gy;
                products.xt[[row, col]] = gx * it;
                products.yt[[row, col]] = gy * it;
            }
        }
        let sums = products.integrate(parallel);

        let half = (self.params.window_size / 2).min(h.max(w));
        let mut dx = flow.dx.clone();
        let mut dy = flow.dy.clone();

        let solve = |row: usize, col: usize| -> (f32, f32) {
            let r0 = row.saturating_sub(half);
            let c0 = col.saturating_sub(half);
            let r1 = (row + half + 1).min(h);
            let c1 = (col + half + 1).min(w);
            let n = ((r1 - r0) * (c1 - c0)) as f64;
            let lambda = FLOW_REGULARIZATION * n;

            let a = box_sum(&sums.xx, r0, c0, r1, c1) + lambda;
            let b = box_sum(&sums.xy, r0, c0, r1, c1);
            let c = box_sum(&sums.yy, r0, c0, r1, c1) + lambda;
            let bx = -box_sum(&sums.xt, r0, c0, r1, c1);
            let by = -box_sum(&sums.yt, r0, c0, r1, c1);

            let det = a * c - b * b;
            if det <= f64::MIN_POSITIVE {
                return (0.0, 0.0);
            }
            (
                ((c * bx - b * by) / det) as f32,
                ((a * by - b * bx) / det) as f32,
            )
        };

        fill_row_pairs(&mut dx, &mut dy, parallel, |row, mut out_x, mut out_y| {
            for col in 0..w {
                let (du, dv) = solve(row, col);
                out_x[col] += du;
                out_y[col] += dv;
            }
        });

        DisplacementField { dx, dy }
    }
}

impl FlowEngine for LucasKanadeEngine {
    fn name(&self) -> &str {
        "pyramidal Lucas-Kanade"
    }

    fn estimate(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
        seed: Option<&DisplacementField>,
    ) -> Result<DisplacementField> {
        let dim = reference.dim();
        if target.dim() != dim {
            return Err(AlignError::dimension_mismatch("flow target", dim, target.dim()));
        }
        if let Some(seed) = seed {
            if seed.dim() != dim {
                return Err(AlignError::dimension_mismatch("flow seed", dim, seed.dim()));
            }
        }
        if self.params.window_size == 0 || self.params.levels == 0 {
            return Err(AlignError::Estimation(format!(
                "window size ({}) and level count ({}) must be positive",
                self.params.window_size, self.params.levels
            )));
        }

        let reductions = reduction_count(dim.0, dim.1, self.params.levels);
        let ref_pyramid = build_pyramid(reference, reductions);
        let tgt_pyramid = build_pyramid(target, reductions);

        let coarsest = ref_pyramid[reductions].dim();
        let mut flow = match seed {
            Some(seed) => reduce_field(seed, reductions),
            None => DisplacementField::zeros(coarsest.0, coarsest.1),
        };

        for level in (0..=reductions).rev() {
            if level < reductions {
                flow = expand_field(&flow, ref_pyramid[level].dim());
            }
            for _ in 0..self.params.iterations {
                flow = self.refine(&ref_pyramid[level], &tgt_pyramid[level], &flow);
            }
            trace!(level, dim = ?ref_pyramid[level].dim(), "Flow level refined");
        }

        Ok(flow)
    }
}

/// Per-pixel gradient products, later turned into integral images.
struct Products {
    xx: Array2<f64>,
    xy: Array2<f64>,
    yy: Array2<f64>,
    xt: Array2<f64>,
    yt: Array2<f64>,
}

impl Products {
    fn zeros(h: usize, w: usize) -> Self {
        Self {
            xx: Array2::zeros((h, w)),
            xy: Array2::zeros((h, w)),
            yy: Array2::zeros((h, w)),
            xt: Array2::zeros((h, w)),
            yt: Array2::zeros((h, w)),
        }
    }

    fn integrate(&self, parallel: bool) -> Self {
        if !parallel {
            return Self {
                xx: integral_image(&self.xx),
                xy: integral_image(&self.xy),
                yy: integral_image(&self.yy),
                xt: integral_image(&self.xt),
                yt: integral_image(&self.yt),
            };
        }
        let ((xx, xy), ((yy, xt), yt)) = rayon::join(
            || rayon::join(|| integral_image(&self.xx), || integral_image(&self.xy)),
            || {
                rayon::join(
                    || rayon::join(|| integral_image(&self.yy), || integral_image(&self.xt)),
                    || integral_image(&self.yt),
                )
            },
        );
        Self { xx, xy, yy, xt, yt }
    }
}

/// Summed-area table with a zero first row and column.
fn integral_image(data: &Array2<f64>) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut sat = Array2::<f64>::zeros((h + 1, w + 1));
    for r in 0..h {
        let mut row_sum = 0.0;
        for c in 0..w {
            row_sum += data[[r, c]];
            sat[[r + 1, c + 1]] = sat[[r, c + 1]] + row_sum;
        }
    }
    sat
}

/// Sum over rows `r0..r1` and columns `c0..c1`.
#[inline]
fn box_sum(sat: &Array2<f64>, r0: usize, c0: usize, r1: usize, c1: usize) -> f64 {
    sat[[r1, c1]] - sat[[r0, c1]] - sat[[r1, c0]] + sat[[r0, c0]]
}

#[inline]
fn central_x(data: &Array2<f32>, row: usize, col: usize) -> f32 {
    let w = data.ncols();
    let left = data[[row, col.saturating_sub(1)]];
    let right = data[[row, (col + 1).min(w - 1)]];
    0.5 * (right - left)
}

#[inline]
fn central_y(data: &Array2<f32>, row: usize, col: usize) -> f32 {
    let h = data.nrows();
    let up = data[[row.saturating_sub(1), col]];
    let down = data[[(row + 1).min(h - 1), col]];
    0.5 * (down - up)
}
