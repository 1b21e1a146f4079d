//! Warm-start storage for displacement fields between pyramid levels.
//!
//! Fields are keyed by the group size of the level that produced them and the
//! group's 0-based slot within that level. They live in memory unless a spill
//! directory is given, in which case each field becomes one binary record:
//!
//! ```text
//! i32 cols | i32 rows | i32 channels (2) | i32 element size (4 or 8)
//! (dx, dy) interleaved, row by row, little-endian
//! ```

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;
use tracing::debug;

use crate::consts::FLOW_RECORD_CHANNELS;
use crate::error::{AlignError, Result};
use crate::frame::DisplacementField;

/// Identifies one cached field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub group_size: usize,
    pub slot: usize,
}

impl CacheKey {
    pub fn new(group_size: usize, slot: usize) -> Self {
        Self { group_size, slot }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.group_size, self.slot)
    }
}

/// Keyed put/get of displacement fields.
pub trait FlowStore {
    fn put(&mut self, key: CacheKey, field: &DisplacementField) -> Result<()>;

    /// `Ok(None)` when nothing was stored under `key`.
    fn get(&mut self, key: CacheKey) -> Result<Option<DisplacementField>>;

    /// Drop every field stored under `group_size`. Called once no later
    /// level can read them.
    fn evict_group_size(&mut self, _group_size: usize) -> Result<()> {
        Ok(())
    }
}

/// Default `FlowStore`: a hash map, optionally spilled to record files.
#[derive(Debug, Default)]
pub struct FlowCache {
    memory: HashMap<CacheKey, DisplacementField>,
    spill_dir: Option<PathBuf>,
    spilled: Vec<CacheKey>,
}

impl FlowCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Keep every field as a record file under `dir` (created if missing).
    pub fn spill_to(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            spill_dir: Some(dir),
            ..Self::default()
        })
    }

    pub fn spill_dir(&self) -> Option<&Path> {
        self.spill_dir.as_deref()
    }

    /// File a spilled field for `key` is written to.
    pub fn record_path(dir: &Path, key: CacheKey) -> PathBuf {
        dir.join(format!("flow_{}_{}.bin", key.group_size, key.slot))
    }

    pub fn len(&self) -> usize {
        self.memory.len() + self.spilled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, deleting spilled records.
    pub fn clear(&mut self) -> Result<()> {
        self.memory.clear();
        let keys: Vec<CacheKey> = self.spilled.drain(..).collect();
        self.remove_spilled(&keys)
    }

    fn remove_spilled(&self, keys: &[CacheKey]) -> Result<()> {
        let Some(ref dir) = self.spill_dir else {
            return Ok(());
        };
        for &key in keys {
            match fs::remove_file(Self::record_path(dir, key)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl FlowStore for FlowCache {
    fn put(&mut self, key: CacheKey, field: &DisplacementField) -> Result<()> {
        match self.spill_dir {
            Some(ref dir) => {
                let path = Self::record_path(dir, key);
                let file = File::create(&path)?;
                let mut writer = BufWriter::new(file);
                write_field(&mut writer, field)?;
                writer.flush()?;
                if !self.spilled.contains(&key) {
                    self.spilled.push(key);
                }
                debug!(%key, path = %path.display(), "Flow field spilled");
            }
            None => {
                self.memory.insert(key, field.clone());
            }
        }
        Ok(())
    }

    fn get(&mut self, key: CacheKey) -> Result<Option<DisplacementField>> {
        match self.spill_dir {
            Some(ref dir) => {
                let path = Self::record_path(dir, key);
                if !path.exists() {
                    return Ok(None);
                }
                let mut reader = BufReader::new(File::open(&path)?);
                read_field(&mut reader).map(Some).map_err(|e| match e {
                    AlignError::Cache(msg) => AlignError::Cache(format!("{}: {msg}", path.display())),
                    other => other,
                })
            }
            None => Ok(self.memory.get(&key).cloned()),
        }
    }

    fn evict_group_size(&mut self, group_size: usize) -> Result<()> {
        self.memory.retain(|key, _| key.group_size != group_size);
        let (evicted, kept): (Vec<CacheKey>, Vec<CacheKey>) = self
            .spilled
            .drain(..)
            .partition(|key| key.group_size == group_size);
        self.spilled = kept;
        debug!(group_size, spilled = evicted.len(), "Flow fields evicted");
        self.remove_spilled(&evicted)
    }
}

/// Serialise a field as one binary record, always with 4-byte samples.
pub fn write_field<W: Write>(writer: &mut W, field: &DisplacementField) -> Result<()> {
    let (rows, cols) = field.dim();
    let header = [
        to_i32(cols, "column count")?,
        to_i32(rows, "row count")?,
        FLOW_RECORD_CHANNELS,
        std::mem::size_of::<f32>() as i32,
    ];
    for value in header {
        writer.write_i32::<LittleEndian>(value)?;
    }
    for (dx, dy) in field.dx.iter().zip(field.dy.iter()) {
        writer.write_f32::<LittleEndian>(*dx)?;
        writer.write_f32::<LittleEndian>(*dy)?;
    }
    Ok(())
}

/// Parse one binary record. Both 4-byte and 8-byte samples are accepted.
pub fn read_field<R: Read>(reader: &mut R) -> Result<DisplacementField> {
    let cols = read_header_value(reader, "column count")?;
    let rows = read_header_value(reader, "row count")?;
    let channels = reader.read_i32::<LittleEndian>().map_err(truncated)?;
    let element_size = reader.read_i32::<LittleEndian>().map_err(truncated)?;

    if channels != FLOW_RECORD_CHANNELS {
        return Err(AlignError::Cache(format!(
            "expected {FLOW_RECORD_CHANNELS} channels, found {channels}"
        )));
    }
    if element_size != 4 && element_size != 8 {
        return Err(AlignError::Cache(format!(
            "unsupported element size {element_size}"
        )));
    }
    if rows == 0 || cols == 0 {
        return Err(AlignError::Cache(format!("empty field {cols}x{rows}")));
    }

    let element_size = element_size as usize;
    let payload = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(FLOW_RECORD_CHANNELS as usize * element_size))
        .ok_or_else(|| AlignError::Cache(format!("field {cols}x{rows} is too large")))?;

    // Buffer grows with the bytes actually read, not with the header's claim.
    let mut bytes = Vec::new();
    reader
        .take(payload as u64)
        .read_to_end(&mut bytes)
        .map_err(truncated)?;
    if bytes.len() != payload {
        return Err(AlignError::Cache(format!(
            "truncated record: {} of {payload} sample bytes",
            bytes.len()
        )));
    }

    let sample = |chunk: &[u8]| -> f32 {
        if element_size == 4 {
            LittleEndian::read_f32(chunk)
        } else {
            LittleEndian::read_f64(chunk) as f32
        }
    };
    let (dx, dy): (Vec<f32>, Vec<f32>) = bytes
        .chunks_exact(2 * element_size)
        .map(|pair| (sample(&pair[..element_size]), sample(&pair[element_size..])))
        .unzip();

    let shaped = |values: Vec<f32>| {
        Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| AlignError::Cache(format!("bad field shape: {e}")))
    };
    Ok(DisplacementField {
        dx: shaped(dx)?,
        dy: shaped(dy)?,
    })
}

fn read_header_value<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = reader.read_i32::<LittleEndian>().map_err(truncated)?;
    usize::try_from(value).map_err(|_| AlignError::Cache(format!("negative {what}: {value}")))
}

fn to_i32(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| AlignError::Cache(format!("{what} {value} too large")))
}

fn truncated(e: std::io::Error) -> AlignError {
    AlignError::Cache(format!("truncated record: {e}"))
}
