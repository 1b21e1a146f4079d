//! Collects the terminal level's per-frame products.

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AlignError, Result};
use crate::frame::Frame;

use super::consistency::FlowConsistencyRecord;

/// Aligned-sequence slots and consistency records of one run.
#[derive(Debug)]
pub struct OutputAssembler {
    first_frame: usize,
    slots: Option<Vec<Option<Array2<f32>>>>,
    records: Vec<FlowConsistencyRecord>,
}

impl OutputAssembler {
    /// Slots for `frame_count` frames starting at 1-based `first_frame`;
    /// without `emit_sequence` warped frames are not kept.
    pub fn new(first_frame: usize, frame_count: usize, emit_sequence: bool) -> Self {
        Self {
            first_frame,
            slots: emit_sequence.then(|| vec![None; frame_count]),
            records: Vec::new(),
        }
    }

    pub fn emits_sequence(&self) -> bool {
        self.slots.is_some()
    }

    /// Store the warped frame for 1-based `index`. No-op without a sequence.
    pub fn place_frame(&mut self, index: usize, data: Array2<f32>) -> Result<()> {
        let first = self.first_frame;
        let Some(slots) = self.slots.as_mut() else {
            return Ok(());
        };
        let total = slots.len();
        let slot = index
            .checked_sub(first)
            .and_then(|i| slots.get_mut(i))
            .ok_or(AlignError::FrameIndexOutOfRange { index, total })?;
        *slot = Some(data);
        Ok(())
    }

    pub fn push_record(&mut self, record: FlowConsistencyRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[FlowConsistencyRecord] {
        &self.records
    }

    /// The aligned sequence (if requested) and the records, in frame order.
    pub fn finish(self) -> Result<(Option<Vec<Frame>>, Vec<FlowConsistencyRecord>)> {
        let sequence = match self.slots {
            Some(slots) => {
                let mut frames = Vec::with_capacity(slots.len());
                for (i, slot) in slots.into_iter().enumerate() {
                    let index = self.first_frame + i;
                    let data = slot.ok_or_else(|| AlignError::FrameUnreadable {
                        index,
                        reason: "no aligned output was produced".into(),
                    })?;
                    frames.push(Frame::new(data, index));
                }
                Some(frames)
            }
            None => None,
        };
        Ok((sequence, self.records))
    }
}

#[derive(Serialize, Deserialize)]
struct RecordTable {
    #[serde(default)]
    records: Vec<FlowConsistencyRecord>,
}

/// Write records as a TOML `[[records]]` array.
pub fn write_records(path: &Path, records: &[FlowConsistencyRecord]) -> Result<()> {
    let table = RecordTable {
        records: records.to_vec(),
    };
    let contents = toml::to_string_pretty(&table)
        .map_err(|e| AlignError::InvalidConfig(format!("serialising records: {e}")))?;
    std::fs::write(path, contents)?;
    debug!(count = records.len(), path = %path.display(), "Consistency records written");
    Ok(())
}

/// Read a table written by `write_records`.
pub fn load_records(path: &Path) -> Result<Vec<FlowConsistencyRecord>> {
    let contents = std::fs::read_to_string(path)?;
    let table: RecordTable = toml::from_str(&contents)
        .map_err(|e| AlignError::InvalidConfig(format!("{}: {e}", path.display())))?;
    Ok(table.records)
}
