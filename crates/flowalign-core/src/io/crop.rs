use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{AlignError, Result};

/// A rectangle in image coordinates for cropping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Crop window given by its inclusive corners, 0-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropCorners {
    /// Top-left corner `(x, y)`.
    pub top_left: (usize, usize),
    /// Bottom-right corner `(x, y)`, inclusive.
    pub bottom_right: (usize, usize),
}

impl CropRect {
    /// Build from inclusive corners. Yields `(y1-y0+1) x (x1-x0+1)` outputs.
    pub fn from_corners(corners: &CropCorners) -> Result<CropRect> {
        let (x0, y0) = corners.top_left;
        let (x1, y1) = corners.bottom_right;
        if x1 < x0 || y1 < y0 {
            return Err(AlignError::InvalidCrop(format!(
                "Bottom-right corner ({x1},{y1}) lies before top-left corner ({x0},{y0})"
            )));
        }
        Ok(CropRect {
            x: x0,
            y: y0,
            width: x1 - x0 + 1,
            height: y1 - y0 + 1,
        })
    }

    /// Validate the rect against source dimensions.
    pub fn validated(&self, src_w: usize, src_h: usize) -> Result<CropRect> {
        if self.width == 0 || self.height == 0 {
            return Err(AlignError::InvalidCrop(
                "Crop width and height must be > 0".into(),
            ));
        }

        if self.x + self.width > src_w || self.y + self.height > src_h {
            return Err(AlignError::InvalidCrop(format!(
                "Crop region ({},{} {}x{}) exceeds source dimensions ({src_w}x{src_h})",
                self.x, self.y, self.width, self.height
            )));
        }

        Ok(*self)
    }

    /// `(height, width)` of the cropped output.
    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Copy the window out of `data`, failing when it does not fit.
    pub fn apply(&self, data: &Array2<f32>) -> Result<Array2<f32>> {
        let (h, w) = data.dim();
        let rect = self.validated(w, h)?;
        Ok(data
            .slice(s![rect.y..rect.y + rect.height, rect.x..rect.x + rect.width])
            .to_owned())
    }
}
