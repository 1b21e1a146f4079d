//! Execution backend selection for per-pixel kernels and the flow engine.

use std::sync::Arc;

use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::flow::{FlowEngine, FlowParams, LucasKanadeEngine};

/// Where per-pixel work runs. Results never depend on the choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevicePreference {
    /// Rayon rows for images of at least `PARALLEL_PIXEL_THRESHOLD` pixels.
    #[default]
    Auto,
    /// Single thread.
    Sequential,
    /// Rayon rows regardless of image size.
    Parallel,
}

impl DevicePreference {
    pub fn use_parallel(&self, pixels: usize) -> bool {
        match self {
            Self::Auto => pixels >= PARALLEL_PIXEL_THRESHOLD,
            Self::Sequential => false,
            Self::Parallel => true,
        }
    }
}

impl std::fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::Sequential => write!(f, "CPU (sequential)"),
            Self::Parallel => write!(f, "CPU/Rayon"),
        }
    }
}

/// Build the dense flow engine for the requested backend.
pub fn create_flow_engine(params: &FlowParams, device: DevicePreference) -> Arc<dyn FlowEngine> {
    Arc::new(LucasKanadeEngine::new(params.clone(), device))
}

/// Fill `out` row by row, on Rayon when `parallel` is set.
pub(crate) fn fill_rows<F>(out: &mut Array2<f32>, parallel: bool, f: F)
where
    F: Fn(usize, ArrayViewMut1<'_, f32>) + Sync + Send,
{
    if parallel {
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row, view)| f(row, view));
    } else {
        for (row, view) in out.axis_iter_mut(Axis(0)).enumerate() {
            f(row, view);
        }
    }
}

/// Like `fill_rows`, for two equally shaped outputs written in one pass.
pub(crate) fn fill_row_pairs<F>(a: &mut Array2<f32>, b: &mut Array2<f32>, parallel: bool, f: F)
where
    F: Fn(usize, ArrayViewMut1<'_, f32>, ArrayViewMut1<'_, f32>) + Sync + Send,
{
    let rows = Zip::indexed(a.rows_mut()).and(b.rows_mut());
    if parallel {
        rows.par_for_each(|row, ra, rb| f(row, ra, rb));
    } else {
        rows.for_each(|row, ra, rb| f(row, ra, rb));
    }
}
