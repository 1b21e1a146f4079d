use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single corrected grayscale frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// 1-based position in the input sequence
    pub index: usize,
}

impl Frame {
    pub fn new(data: Array2<f32>, index: usize) -> Self {
        Self { data, index }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

/// Known per-frame coarse shift carried by the sequence metadata.
///
/// Applying it moves image content by `(x, y)` pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoarseShift {
    pub x: f64,
    pub y: f64,
}

/// Per-pixel motion from a reference image to a target image:
/// `reference(r, c) ~ target(r + dy, c + dx)`.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplacementField {
    pub dx: Array2<f32>,
    pub dy: Array2<f32>,
}

impl DisplacementField {
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            dx: Array2::zeros((height, width)),
            dy: Array2::zeros((height, width)),
        }
    }

    /// Constant field, mostly useful for synthetic data.
    pub fn uniform(height: usize, width: usize, dx: f32, dy: f32) -> Self {
        Self {
            dx: Array2::from_elem((height, width), dx),
            dy: Array2::from_elem((height, width), dy),
        }
    }

    /// `(height, width)`, matching `Array2::dim`.
    pub fn dim(&self) -> (usize, usize) {
        self.dx.dim()
    }

    pub fn is_finite(&self) -> bool {
        self.dx.iter().chain(self.dy.iter()).all(|v| v.is_finite())
    }

    /// Convert relative motion into absolute sample coordinates by adding the
    /// identity grid. With a known coarse shift the added term becomes
    /// `identity - shift`, so sampling the unshifted image applies both the
    /// shift and this residual in one pass.
    pub fn to_remap_table(&self, shift: Option<CoarseShift>) -> RemapTable {
        let (sx, sy) = shift.map_or((0.0, 0.0), |s| (s.x as f32, s.y as f32));
        let mut x = self.dx.clone();
        let mut y = self.dy.clone();
        for ((_, col), v) in x.indexed_iter_mut() {
            *v += col as f32 - sx;
        }
        for ((row, _), v) in y.indexed_iter_mut() {
            *v += row as f32 - sy;
        }
        RemapTable { x, y }
    }
}

/// Absolute sample coordinates, consumed once by the remapper.
#[derive(Clone, Debug)]
pub struct RemapTable {
    pub x: Array2<f32>,
    pub y: Array2<f32>,
}

impl RemapTable {
    pub fn identity(height: usize, width: usize) -> Self {
        DisplacementField::zeros(height, width).to_remap_table(None)
    }

    pub fn dim(&self) -> (usize, usize) {
        self.x.dim()
    }
}

/// Metadata about an opened input sequence.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub filename: PathBuf,
    pub total_frames: usize,
    pub width: usize,
    pub height: usize,
    pub has_coarse_shifts: bool,
}
