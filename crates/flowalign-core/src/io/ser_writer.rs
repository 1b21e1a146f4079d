use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use ndarray::Array2;
use tracing::debug;

use crate::error::{AlignError, Result};
use crate::io::ser::SerHeader;

/// Streams 16-bit mono frames into a SER movie whose header declares the
/// final frame count up front.
pub struct SerWriter {
    writer: BufWriter<File>,
    header: SerHeader,
    written: u32,
}

impl SerWriter {
    pub fn create(path: &Path, header: &SerHeader) -> Result<Self> {
        if header.bytes_per_sample() != 2 || header.planes_per_pixel() != 1 || !header.little_endian
        {
            return Err(AlignError::InvalidSer(
                "only little-endian 16-bit mono movies can be written".into(),
            ));
        }
        let mut writer = BufWriter::new(File::create(path)?);
        header.write_to(&mut writer)?;
        Ok(Self {
            writer,
            header: header.clone(),
            written: 0,
        })
    }

    /// Append one frame; values are clamped to [0, 1] and scaled to u16.
    pub fn write_frame(&mut self, data: &Array2<f32>) -> Result<()> {
        let expected = (self.header.height as usize, self.header.width as usize);
        if data.dim() != expected {
            return Err(AlignError::dimension_mismatch("SER output frame", expected, data.dim()));
        }
        if self.written == self.header.frame_count {
            return Err(AlignError::InvalidSer(format!(
                "movie already holds its {} declared frames",
                self.header.frame_count
            )));
        }
        for &v in data.iter() {
            let sample = (v.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16;
            self.writer.write_u16::<LittleEndian>(sample)?;
        }
        self.written += 1;
        Ok(())
    }

    /// Flush; fails if fewer frames were written than declared.
    pub fn finalize(mut self) -> Result<()> {
        if self.written != self.header.frame_count {
            return Err(AlignError::InvalidSer(format!(
                "only {} of {} declared frames were written",
                self.written, self.header.frame_count
            )));
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Write `frames` as one 16-bit mono movie.
pub fn write_sequence(path: &Path, frames: &[Array2<f32>]) -> Result<()> {
    let (h, w) = frames.first().ok_or(AlignError::EmptySequence)?.dim();
    let mut writer = SerWriter::create(
        path,
        &SerHeader::mono16(w as u32, h as u32, frames.len() as u32),
    )?;
    for frame in frames {
        writer.write_frame(frame)?;
    }
    writer.finalize()?;
    debug!(path = %path.display(), frames = frames.len(), "SER movie written");
    Ok(())
}
