//! Input sequences: where raw frames come from.
//!
//! A sequence is either a SER movie, an ordered list of image files, or an
//! in-memory stack. A TOML manifest can name either of the file-based forms
//! and attach a known coarse shift to every frame.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AlignError, Result};
use crate::frame::{CoarseShift, SourceInfo};
use crate::io::image_io::load_image;
use crate::io::ser::SerReader;

/// Random access to the raw (uncorrected) frames of a sequence.
pub trait FrameStore: Send + Sync {
    fn frame_count(&self) -> usize;

    /// `(height, width)` shared by every frame.
    fn dimensions(&self) -> (usize, usize);

    /// Read a frame by 0-based position.
    fn read_raw(&self, index: usize) -> Result<Array2<f32>>;
}

/// Frames stored in a SER movie.
pub struct SerSequence {
    reader: SerReader,
}

impl SerSequence {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            reader: SerReader::open(path)?,
        })
    }
}

impl FrameStore for SerSequence {
    fn frame_count(&self) -> usize {
        self.reader.frame_count()
    }

    fn dimensions(&self) -> (usize, usize) {
        (
            self.reader.header.height as usize,
            self.reader.header.width as usize,
        )
    }

    fn read_raw(&self, index: usize) -> Result<Array2<f32>> {
        self.reader.read_frame(index)
    }
}

/// Frames stored as one image file each.
pub struct ImageListSequence {
    paths: Vec<PathBuf>,
    dims: (usize, usize),
}

impl ImageListSequence {
    /// Open the list; the first image fixes the expected dimensions.
    pub fn open(paths: Vec<PathBuf>) -> Result<Self> {
        let first = paths.first().ok_or(AlignError::EmptySequence)?;
        let dims = load_image(first)
            .map_err(|e| AlignError::FrameUnreadable {
                index: 1,
                reason: format!("{}: {e}", first.display()),
            })?
            .dim();
        Ok(Self { paths, dims })
    }
}

impl FrameStore for ImageListSequence {
    fn frame_count(&self) -> usize {
        self.paths.len()
    }

    fn dimensions(&self) -> (usize, usize) {
        self.dims
    }

    fn read_raw(&self, index: usize) -> Result<Array2<f32>> {
        let path = self
            .paths
            .get(index)
            .ok_or(AlignError::FrameIndexOutOfRange {
                index,
                total: self.paths.len(),
            })?;
        let data = load_image(path).map_err(|e| AlignError::FrameUnreadable {
            index: index + 1,
            reason: format!("{}: {e}", path.display()),
        })?;
        if data.dim() != self.dims {
            return Err(AlignError::dimension_mismatch(
                format!("frame {}", path.display()),
                self.dims,
                data.dim(),
            ));
        }
        Ok(data)
    }
}

/// Frames already held in memory.
pub struct MemorySequence {
    frames: Vec<Array2<f32>>,
}

impl MemorySequence {
    pub fn new(frames: Vec<Array2<f32>>) -> Result<Self> {
        let first = frames.first().ok_or(AlignError::EmptySequence)?;
        let dims = first.dim();
        if let Some(bad) = frames.iter().find(|f| f.dim() != dims) {
            return Err(AlignError::dimension_mismatch(
                "in-memory sequence",
                dims,
                bad.dim(),
            ));
        }
        Ok(Self { frames })
    }
}

impl FrameStore for MemorySequence {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn dimensions(&self) -> (usize, usize) {
        self.frames[0].dim()
    }

    fn read_raw(&self, index: usize) -> Result<Array2<f32>> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(AlignError::FrameIndexOutOfRange {
                index,
                total: self.frames.len(),
            })
    }
}

/// TOML description of a sequence and its optional coarse shifts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SequenceManifest {
    /// SER movie holding every frame.
    #[serde(default)]
    pub movie: Option<PathBuf>,
    /// One image file per frame, in order.
    #[serde(default)]
    pub frames: Vec<PathBuf>,
    /// Known per-frame shifts; empty when the sequence has none.
    #[serde(default)]
    pub shifts: Vec<CoarseShift>,
}

impl SequenceManifest {
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| AlignError::InvalidManifest(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Resolve relative paths against `base` (the manifest's directory).
    pub fn resolved(mut self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.movie = self.movie.map(resolve);
        self.frames = self.frames.into_iter().map(resolve).collect();
        self
    }

    fn open_store(&self) -> Result<Box<dyn FrameStore>> {
        match (&self.movie, self.frames.is_empty()) {
            (Some(movie), true) => Ok(Box::new(SerSequence::open(movie)?)),
            (None, false) => Ok(Box::new(ImageListSequence::open(self.frames.clone())?)),
            (Some(_), false) => Err(AlignError::InvalidManifest(
                "`movie` and `frames` are mutually exclusive".into(),
            )),
            (None, true) => Err(AlignError::InvalidManifest(
                "one of `movie` or `frames` is required".into(),
            )),
        }
    }
}

/// An opened input: its frames, optional coarse shifts and summary info.
pub struct OpenedSequence {
    pub store: Box<dyn FrameStore>,
    pub shifts: Option<Vec<CoarseShift>>,
    pub info: SourceInfo,
}

/// Open a `.ser` movie or a `.toml` manifest.
pub fn open_sequence(path: &Path) -> Result<OpenedSequence> {
    let (store, shifts): (Box<dyn FrameStore>, Vec<CoarseShift>) =
        match path.extension().and_then(|e| e.to_str()) {
            Some("ser" | "SER") => (Box::new(SerSequence::open(path)?), Vec::new()),
            Some("toml") => {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                let manifest = SequenceManifest::load(path)?.resolved(base);
                let store = manifest.open_store()?;
                (store, manifest.shifts)
            }
            _ => {
                return Err(AlignError::InvalidConfig(format!(
                    "Unsupported input {}: expected a .ser movie or a .toml manifest",
                    path.display()
                )))
            }
        };

    let total = store.frame_count();
    if total == 0 {
        return Err(AlignError::EmptySequence);
    }
    if !shifts.is_empty() && shifts.len() != total {
        return Err(AlignError::InvalidManifest(format!(
            "{} shifts given for {} frames",
            shifts.len(),
            total
        )));
    }

    if let Some(bad) = shifts.iter().find(|s| !(s.x.is_finite() && s.y.is_finite())) {
        return Err(AlignError::InvalidManifest(format!(
            "coarse shift ({}, {}) is not finite",
            bad.x, bad.y
        )));
    }

    let (height, width) = store.dimensions();
    let has_coarse_shifts = !shifts.is_empty();
    debug!(
        total_frames = total,
        width,
        height,
        has_coarse_shifts,
        "Opened sequence"
    );

    Ok(OpenedSequence {
        store,
        shifts: has_coarse_shifts.then_some(shifts),
        info: SourceInfo {
            filename: path.to_path_buf(),
            total_frames: total,
            width,
            height,
            has_coarse_shifts,
        },
    })
}
