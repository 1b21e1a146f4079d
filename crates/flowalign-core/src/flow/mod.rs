//! Dense optical flow: the estimator capability, its warm-start cache and a
//! pyramidal Lucas-Kanade provider.

pub mod cache;
mod lucas_kanade;
mod pyramid;

pub use cache::{read_field, write_field, CacheKey, FlowCache, FlowStore};
pub use lucas_kanade::LucasKanadeEngine;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consts::{DEFAULT_FLOW_WINDOW, EPSILON, FLOW_ITERATIONS, FLOW_PYRAMID_LEVELS};
use crate::error::Result;
use crate::frame::DisplacementField;

/// Estimates the per-pixel motion mapping `reference` onto `target`.
///
/// Inputs are equal-sized and normalised to [0, 1] by the caller. With a
/// `seed` the estimate starts from that field instead of zero.
pub trait FlowEngine: Send + Sync {
    fn name(&self) -> &str;

    fn estimate(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
        seed: Option<&DisplacementField>,
    ) -> Result<DisplacementField>;
}

/// Numeric parameters of the flow estimator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowParams {
    /// Side of the square averaging window; larger means smoother flow.
    #[serde(default = "default_window")]
    pub window_size: usize,
    /// Image pyramid levels, including full resolution.
    #[serde(default = "default_levels")]
    pub levels: usize,
    /// Refinement steps per pyramid level.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

fn default_window() -> usize {
    DEFAULT_FLOW_WINDOW
}

fn default_levels() -> usize {
    FLOW_PYRAMID_LEVELS
}

fn default_iterations() -> usize {
    FLOW_ITERATIONS
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_FLOW_WINDOW,
            levels: FLOW_PYRAMID_LEVELS,
            iterations: FLOW_ITERATIONS,
        }
    }
}

/// Min/max stretch to [0, 1]. A constant image maps to zeros.
pub fn normalize_unit_range(data: &Array2<f32>) -> Array2<f32> {
    let (min, max) = data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    if !range.is_finite() || range <= EPSILON {
        warn!(min, max, "Flat image handed to the flow estimator");
        return Array2::zeros(data.dim());
    }
    data.mapv(|v| (v - min) / range)
}
