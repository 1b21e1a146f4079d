use ndarray::Array2;

use crate::error::{AlignError, Result};
use crate::io::source::ReadFrame;

/// Element-wise mean of contiguous runs of corrected frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct Averager;

impl Averager {
    /// Mean of frames `start..=end` (1-based), accumulated in f64.
    pub fn average(&self, reader: &dyn ReadFrame, start: usize, end: usize) -> Result<Array2<f32>> {
        if start == 0 || end < start {
            return Err(AlignError::InvalidConfig(format!(
                "invalid frame run {start}..={end}"
            )));
        }

        let mut sum = Array2::<f64>::zeros(reader.dimensions());
        for index in start..=end {
            let frame = reader.read(index)?;
            if frame.data.dim() != sum.dim() {
                return Err(AlignError::dimension_mismatch(
                    format!("frame {index}"),
                    sum.dim(),
                    frame.data.dim(),
                ));
            }
            sum.zip_mut_with(&frame.data, |s, &v| *s += v as f64);
        }

        let n = (end - start + 1) as f64;
        Ok(sum.mapv(|v| (v / n) as f32))
    }
}

/// Running sum of the warped group images of one pyramid level.
///
/// Consumed by `into_mean` once every group has been added.
#[derive(Debug)]
pub struct LevelAccumulator {
    sum: Array2<f64>,
    count: usize,
}

impl LevelAccumulator {
    pub fn new(dims: (usize, usize)) -> Self {
        Self {
            sum: Array2::zeros(dims),
            count: 0,
        }
    }

    pub fn add(&mut self, image: &Array2<f32>) -> Result<()> {
        if image.dim() != self.sum.dim() {
            return Err(AlignError::dimension_mismatch(
                "level accumulator",
                self.sum.dim(),
                image.dim(),
            ));
        }
        self.sum.zip_mut_with(image, |s, &v| *s += v as f64);
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Sum divided by `divisor`, the level's group count.
    pub fn into_mean(self, divisor: usize) -> Array2<f32> {
        let n = divisor.max(1) as f64;
        self.sum.mapv(|v| (v / n) as f32)
    }
}
