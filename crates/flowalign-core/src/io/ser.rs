//! SER movie access.
//!
//! Only the fields that describe the pixel layout are kept from the 178-byte
//! header; the observer, instrument and timestamp blocks are skipped on read
//! and zero-filled on write.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array2;

use crate::error::{AlignError, Result};

pub const SER_HEADER_SIZE: usize = 178;
pub const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// Bytes between the frame count and the end of the header.
const SER_METADATA_SIZE: usize = 3 * 40 + 2 * 8;

const COLOR_MONO: i32 = 0;
const COLOR_RGB: i32 = 100;
const COLOR_BGR: i32 = 101;

/// Pixel layout of a SER movie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
}

impl SerHeader {
    /// Little-endian 16-bit mono layout, the only one written here.
    pub fn mono16(width: u32, height: u32, frame_count: u32) -> Self {
        Self {
            color_id: COLOR_MONO,
            little_endian: true,
            width,
            height,
            pixel_depth: 16,
            frame_count,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        if self.pixel_depth > 8 {
            2
        } else {
            1
        }
    }

    /// 3 for RGB/BGR movies, 1 for mono and Bayer.
    pub fn planes_per_pixel(&self) -> usize {
        if matches!(self.color_id, COLOR_RGB | COLOR_BGR) {
            3
        } else {
            1
        }
    }

    /// `None` when the size does not fit a `usize`.
    pub fn frame_byte_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_sample() * self.planes_per_pixel())
    }

    /// Decode the 178 header bytes, magic included.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SER_HEADER_SIZE {
            return Err(AlignError::InvalidSer(format!(
                "header needs {SER_HEADER_SIZE} bytes, file has {}",
                bytes.len()
            )));
        }
        if &bytes[..SER_MAGIC.len()] != SER_MAGIC {
            return Err(AlignError::InvalidSer("not a SER movie (bad magic)".into()));
        }

        let mut cursor = Cursor::new(&bytes[SER_MAGIC.len()..]);
        let mut next = || cursor.read_i32::<LittleEndian>();
        let _lu_id = next()?;
        let color_id = next()?;
        // Most writers store 0 for little-endian data despite the field's name.
        let little_endian = next()? != 1;
        let width = next()?;
        let height = next()?;
        let pixel_depth = next()?;
        let frame_count = next()?;

        if width <= 0 || height <= 0 {
            return Err(AlignError::InvalidDimensions {
                width: width.max(0) as u32,
                height: height.max(0) as u32,
            });
        }
        if !(1..=16).contains(&pixel_depth) {
            return Err(AlignError::InvalidSer(format!(
                "pixel depth {pixel_depth} is not supported"
            )));
        }
        let frame_count = u32::try_from(frame_count)
            .map_err(|_| AlignError::InvalidSer(format!("negative frame count {frame_count}")))?;

        Ok(Self {
            color_id,
            little_endian,
            width: width as u32,
            height: height as u32,
            pixel_depth: pixel_depth as u32,
            frame_count,
        })
    }

    /// Encode as 178 header bytes.
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_all(SER_MAGIC)?;
        let fields = [
            0,
            self.color_id,
            if self.little_endian { 0 } else { 1 },
            self.width as i32,
            self.height as i32,
            self.pixel_depth as i32,
            self.frame_count as i32,
        ];
        for value in fields {
            w.write_i32::<LittleEndian>(value)?;
        }
        w.write_all(&[0u8; SER_METADATA_SIZE])?;
        Ok(())
    }

    fn sample_max(&self) -> f32 {
        ((1u32 << self.pixel_depth) - 1) as f32
    }
}

/// Read-only, memory-mapped SER movie.
pub struct SerReader {
    mmap: Mmap,
    frame_bytes: usize,
    pub header: SerHeader,
}

impl SerReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and the file is not written while
        // the reader exists.
        let mmap = unsafe { Mmap::map(&file)? };

        let header = SerHeader::parse(&mmap)?;
        let frame_bytes = header
            .frame_byte_size()
            .ok_or_else(|| AlignError::InvalidSer("frame size overflows".into()))?;
        let needed = (header.frame_count as usize)
            .checked_mul(frame_bytes)
            .and_then(|n| n.checked_add(SER_HEADER_SIZE))
            .ok_or_else(|| AlignError::InvalidSer("movie size overflows".into()))?;
        if mmap.len() < needed {
            return Err(AlignError::InvalidSer(format!(
                "{} frames need {needed} bytes, file has {}",
                header.frame_count,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            frame_bytes,
            header,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Read the frame at 0-based `index` as grey values in [0, 1].
    ///
    /// Colour movies contribute their green plane.
    pub fn read_frame(&self, index: usize) -> Result<Array2<f32>> {
        let total = self.frame_count();
        if index >= total {
            return Err(AlignError::FrameIndexOutOfRange { index, total });
        }
        let offset = SER_HEADER_SIZE + index * self.frame_bytes;
        let raw = &self.mmap[offset..offset + self.frame_bytes];

        let header = &self.header;
        let width = header.width as usize;
        let sample_bytes = header.bytes_per_sample();
        let planes = header.planes_per_pixel();
        let plane = usize::from(planes == 3);
        let scale = header.sample_max();

        Ok(Array2::from_shape_fn(
            (header.height as usize, width),
            |(row, col)| {
                let at = ((row * width + col) * planes + plane) * sample_bytes;
                let value = match (sample_bytes, header.little_endian) {
                    (1, _) => raw[at] as f32,
                    (_, true) => u16::from_le_bytes([raw[at], raw[at + 1]]) as f32,
                    (_, false) => u16::from_be_bytes([raw[at], raw[at + 1]]) as f32,
                };
                value / scale
            },
        ))
    }
}
