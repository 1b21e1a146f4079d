//! Global pre-alignment by the sequence's known coarse shifts.

use ndarray::Array2;
use tracing::debug;

use crate::compute::DevicePreference;
use crate::error::{AlignError, Result};
use crate::frame::{CoarseShift, Frame};
use crate::io::source::{FrameSource, ReadFrame};
use crate::warp::translate_bilinear_wrap;

/// Corrected frames of a range, each translated by its coarse shift and held
/// in memory. Indices stay those of the original sequence.
pub struct PreShiftedSequence {
    first: usize,
    frames: Vec<Array2<f32>>,
    shifts: Vec<CoarseShift>,
    dims: (usize, usize),
}

impl PreShiftedSequence {
    /// Translate frames `first..=last` (1-based) of `source`.
    ///
    /// `on_frame` is called once per translated frame.
    pub fn build<F>(
        source: &FrameSource,
        first: usize,
        last: usize,
        device: DevicePreference,
        mut on_frame: F,
    ) -> Result<Self>
    where
        F: FnMut(usize),
    {
        let mut frames = Vec::with_capacity(last + 1 - first);
        let mut shifts = Vec::with_capacity(last + 1 - first);
        for index in first..=last {
            let shift = source.coarse_shift(index).ok_or_else(|| {
                AlignError::InvalidManifest(format!("no coarse shift for frame {index}"))
            })?;
            let frame = source.read(index)?;
            frames.push(translate_bilinear_wrap(&frame.data, shift, device));
            shifts.push(shift);
            on_frame(index);
        }
        debug!(first, last, "Frames pre-shifted");

        Ok(Self {
            first,
            frames,
            shifts,
            dims: source.dimensions(),
        })
    }

    /// Shift that was applied to the frame at 1-based `index`.
    pub fn shift(&self, index: usize) -> Option<CoarseShift> {
        index
            .checked_sub(self.first)
            .and_then(|i| self.shifts.get(i))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl ReadFrame for PreShiftedSequence {
    fn read(&self, index: usize) -> Result<Frame> {
        let data = index
            .checked_sub(self.first)
            .and_then(|i| self.frames.get(i))
            .ok_or(AlignError::FrameIndexOutOfRange {
                index,
                total: self.frames.len(),
            })?;
        Ok(Frame::new(data.clone(), index))
    }

    fn dimensions(&self) -> (usize, usize) {
        self.dims
    }
}
