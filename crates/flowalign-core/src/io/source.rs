//! Corrected frame access: crop, dark subtraction and gain normalisation.

use ndarray::Array2;
use tracing::debug;

use crate::error::{AlignError, Result};
use crate::frame::{CoarseShift, Frame};
use crate::io::crop::CropRect;
use crate::io::sequence::FrameStore;

/// Anything that hands out corrected frames by 1-based index.
pub trait ReadFrame {
    fn read(&self, index: usize) -> Result<Frame>;

    /// `(height, width)` of every frame returned by `read`.
    fn dimensions(&self) -> (usize, usize);
}

/// Per-pixel detector correction applied to every raw frame.
#[derive(Clone, Debug, Default)]
pub struct Correction {
    crop: Option<CropRect>,
    dark: Option<Array2<f32>>,
    /// Inverted gain map, so correction is a multiply.
    gain: Option<Array2<f32>>,
    output_dims: (usize, usize),
}

impl Correction {
    /// Build a correction for raw frames of `raw_dims` (`(height, width)`).
    ///
    /// Dark and gain images may be given either at the raw frame size, in
    /// which case they are cropped like the frames, or already at the
    /// cropped size. The gain map is inverted here and must stay finite.
    pub fn new(
        crop: Option<CropRect>,
        dark: Option<Array2<f32>>,
        gain: Option<Array2<f32>>,
        raw_dims: (usize, usize),
    ) -> Result<Self> {
        let crop = crop
            .map(|rect| rect.validated(raw_dims.1, raw_dims.0))
            .transpose()?;
        let output_dims = crop.map_or(raw_dims, |rect| rect.dim());

        let fit = |image: Array2<f32>, what: &str| -> Result<Array2<f32>> {
            match crop {
                Some(rect) if image.dim() == raw_dims && raw_dims != output_dims => {
                    rect.apply(&image)
                }
                _ if image.dim() == output_dims => Ok(image),
                _ => Err(AlignError::dimension_mismatch(what, output_dims, image.dim())),
            }
        };

        let dark = dark.map(|d| fit(d, "dark frame")).transpose()?;
        let gain = gain
            .map(|g| fit(g, "gain map"))
            .transpose()?
            .map(|g| g.mapv(|v| 1.0 / v));

        if let Some(ref inverted) = gain {
            if let Some(bad) = inverted.iter().find(|v| !v.is_finite()) {
                return Err(AlignError::InvalidGain(format!(
                    "its inverse contains {bad} (zero or non-finite gain values)"
                )));
            }
        }

        Ok(Self {
            crop,
            dark,
            gain,
            output_dims,
        })
    }

    /// No crop, no dark, no gain.
    pub fn identity(raw_dims: (usize, usize)) -> Self {
        Self {
            output_dims: raw_dims,
            ..Default::default()
        }
    }

    pub fn output_dims(&self) -> (usize, usize) {
        self.output_dims
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    /// Apply crop, then `(frame - dark) * gain`.
    pub fn apply(&self, raw: &Array2<f32>) -> Result<Array2<f32>> {
        let mut data = match self.crop {
            Some(rect) => rect.apply(raw)?,
            None => raw.clone(),
        };
        if data.dim() != self.output_dims {
            return Err(AlignError::dimension_mismatch(
                "corrected frame",
                self.output_dims,
                data.dim(),
            ));
        }
        if let Some(ref dark) = self.dark {
            data -= dark;
        }
        if let Some(ref gain) = self.gain {
            data *= gain;
        }
        Ok(data)
    }
}

/// Reads corrected frames from a store, plus the sequence's coarse shifts.
pub struct FrameSource {
    store: Box<dyn FrameStore>,
    correction: Correction,
    shifts: Option<Vec<CoarseShift>>,
}

impl FrameSource {
    pub fn new(store: Box<dyn FrameStore>, correction: Correction) -> Result<Self> {
        let raw_dims = store.dimensions();
        if store.frame_count() == 0 {
            return Err(AlignError::EmptySequence);
        }
        // The correction must have been built for this store's frame size.
        let probe = Correction::new(correction.crop, None, None, raw_dims)?;
        if probe.output_dims != correction.output_dims {
            return Err(AlignError::dimension_mismatch(
                "frame correction",
                correction.output_dims,
                probe.output_dims,
            ));
        }
        Ok(Self {
            store,
            correction,
            shifts: None,
        })
    }

    /// Attach known per-frame coarse shifts (one per frame), which enables
    /// global pre-alignment. Each shift must be finite and no larger than the
    /// corrected frame in either direction.
    pub fn with_shifts(mut self, shifts: Vec<CoarseShift>) -> Result<Self> {
        if shifts.len() != self.store.frame_count() {
            return Err(AlignError::InvalidManifest(format!(
                "{} shifts given for {} frames",
                shifts.len(),
                self.store.frame_count()
            )));
        }
        let (h, w) = self.correction.output_dims();
        if let Some((i, bad)) = shifts
            .iter()
            .enumerate()
            .find(|(_, s)| !shift_fits(s, h, w))
        {
            return Err(AlignError::InvalidManifest(format!(
                "coarse shift ({}, {}) of frame {} is not finite or exceeds the {w}x{h} frame",
                bad.x,
                bad.y,
                i + 1
            )));
        }
        debug!(count = shifts.len(), "Coarse shifts attached");
        self.shifts = Some(shifts);
        Ok(self)
    }

    pub fn frame_count(&self) -> usize {
        self.store.frame_count()
    }

    pub fn has_coarse_shifts(&self) -> bool {
        self.shifts.is_some()
    }

    /// Known shift of the frame at 1-based `index`, if the sequence has shifts.
    pub fn coarse_shift(&self, index: usize) -> Option<CoarseShift> {
        self.shifts
            .as_ref()
            .and_then(|s| index.checked_sub(1).and_then(|i| s.get(i)).copied())
    }

    pub fn correction(&self) -> &Correction {
        &self.correction
    }
}

impl ReadFrame for FrameSource {
    fn read(&self, index: usize) -> Result<Frame> {
        let total = self.store.frame_count();
        if index == 0 || index > total {
            return Err(AlignError::FrameIndexOutOfRange { index, total });
        }
        let raw = self.store.read_raw(index - 1)?;
        let data = self.correction.apply(&raw)?;
        Ok(Frame::new(data, index))
    }

    fn dimensions(&self) -> (usize, usize) {
        self.correction.output_dims()
    }
}

fn shift_fits(shift: &CoarseShift, h: usize, w: usize) -> bool {
    shift.x.is_finite()
        && shift.y.is_finite()
        && shift.x.abs() <= w as f64
        && shift.y.abs() <= h as f64
}
