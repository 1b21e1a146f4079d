use std::sync::Mutex;

use ndarray::Array2;

use flowalign_core::error::Result;
use flowalign_core::flow::{CacheKey, FlowEngine, FlowStore};
use flowalign_core::frame::DisplacementField;
use flowalign_core::io::ser::SER_HEADER_SIZE;
use flowalign_core::io::sequence::{FrameStore, MemorySequence};
use flowalign_core::io::source::{Correction, FrameSource};

/// Gaussian spot on a flat background.
pub fn gaussian_spot(
    h: usize,
    w: usize,
    cx: f32,
    cy: f32,
    sigma: f32,
    amplitude: f32,
    background: f32,
) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(r, c)| {
        let dx = c as f32 - cx;
        let dy = r as f32 - cy;
        background + amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp()
    })
}

/// Smooth, non-symmetric test pattern that changes with `seed`.
pub fn pattern(h: usize, w: usize, seed: usize) -> Array2<f32> {
    let phase = seed as f32 * 0.37;
    Array2::from_shape_fn((h, w), |(r, c)| {
        0.5 + 0.25 * ((c as f32 * 0.31 + phase).sin() * (r as f32 * 0.23 - phase).cos())
            + 0.01 * r as f32
    })
}

/// Uncorrected source over in-memory frames.
pub fn memory_source(frames: Vec<Array2<f32>>) -> FrameSource {
    let dims = frames[0].dim();
    let store = MemorySequence::new(frames).expect("memory sequence");
    FrameSource::new(Box::new(store), Correction::identity(dims)).expect("frame source")
}

/// Largest absolute element-wise difference.
pub fn max_abs_diff(a: &Array2<f32>, b: &Array2<f32>) -> f32 {
    assert_eq!(a.dim(), b.dim());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

/// Mean of `data` over a `(2*half+1)` square centred at `(row, col)`.
pub fn window_mean(data: &Array2<f32>, row: usize, col: usize, half: usize) -> f32 {
    let mut sum = 0.0;
    let mut n = 0;
    for r in row - half..=row + half {
        for c in col - half..=col + half {
            sum += data[[r, c]];
            n += 1;
        }
    }
    sum / n as f32
}

/// Returns the seed (or zero): every group is treated as already aligned.
pub struct ZeroFlowEngine;

impl FlowEngine for ZeroFlowEngine {
    fn name(&self) -> &str {
        "zero"
    }

    fn estimate(
        &self,
        reference: &Array2<f32>,
        _target: &Array2<f32>,
        seed: Option<&DisplacementField>,
    ) -> Result<DisplacementField> {
        let (h, w) = reference.dim();
        Ok(seed
            .cloned()
            .unwrap_or_else(|| DisplacementField::zeros(h, w)))
    }
}

/// Wraps an engine and keeps every call's seed flag and result.
pub struct RecordingEngine<E> {
    pub inner: E,
    pub calls: Mutex<Vec<(bool, DisplacementField)>>,
}

impl<E: FlowEngine> RecordingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fields(&self) -> Vec<DisplacementField> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn seeded(&self) -> Vec<bool> {
        self.calls.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }
}

impl<E: FlowEngine> FlowEngine for RecordingEngine<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn estimate(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
        seed: Option<&DisplacementField>,
    ) -> Result<DisplacementField> {
        let field = self.inner.estimate(reference, target, seed)?;
        self.calls
            .lock()
            .unwrap()
            .push((seed.is_some(), field.clone()));
        Ok(field)
    }
}

/// Wraps a store and logs every key read and written, in order.
pub struct RecordingStore<S> {
    pub inner: S,
    pub puts: Vec<CacheKey>,
    pub gets: Vec<CacheKey>,
    pub evictions: Vec<usize>,
}

impl<S: FlowStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            puts: Vec::new(),
            gets: Vec::new(),
            evictions: Vec::new(),
        }
    }
}

impl<S: FlowStore> FlowStore for RecordingStore<S> {
    fn put(&mut self, key: CacheKey, field: &DisplacementField) -> Result<()> {
        self.puts.push(key);
        self.inner.put(key, field)
    }

    fn get(&mut self, key: CacheKey) -> Result<Option<DisplacementField>> {
        self.gets.push(key);
        self.inner.get(key)
    }

    fn evict_group_size(&mut self, group_size: usize) -> Result<()> {
        self.evictions.push(group_size);
        self.inner.evict_group_size(group_size)
    }
}

/// Store whose frames must never be read.
pub struct PanickingStore {
    pub dims: (usize, usize),
    pub count: usize,
}

impl FrameStore for PanickingStore {
    fn frame_count(&self) -> usize {
        self.count
    }

    fn dimensions(&self) -> (usize, usize) {
        self.dims
    }

    fn read_raw(&self, index: usize) -> Result<Array2<f32>> {
        panic!("frame {index} was read");
    }
}

/// Build a SER file header for mono frames of the given bit depth.
pub fn build_ser_header(width: u32, height: u32, bit_depth: u32, num_frames: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID
    buf.extend_from_slice(&0i32.to_le_bytes());
    // ColorID = MONO
    buf.extend_from_slice(&0i32.to_le_bytes());
    // LittleEndian = 0 (little-endian per Siril convention)
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer, Instrument, Telescope (40 bytes each)
    buf.extend_from_slice(&[0u8; 120]);
    // DateTime, DateTimeUTC
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

/// Write a SER buffer to a temporary file that lives as long as the handle.
pub fn write_test_ser(data: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut f = tempfile::Builder::new()
        .suffix(".ser")
        .tempfile()
        .expect("create temp file");
    f.write_all(data).expect("write SER data");
    f.flush().expect("flush");
    f
}
