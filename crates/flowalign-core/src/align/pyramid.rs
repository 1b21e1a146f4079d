//! Coarse-to-fine motion-compensated averaging.
//!
//! The range is first averaged into a reference. Each level then splits the
//! range into twice as many groups, estimates the flow from the current
//! reference to every group's representative, resamples the representative
//! through that flow and averages the results into the next reference.
//! Fields of one level seed the estimates of the next through the flow cache.

use std::time::{Duration, Instant};

use ndarray::Array2;
use tracing::{debug, info};

use crate::compute::DevicePreference;
use crate::error::{AlignError, Result};
use crate::flow::{normalize_unit_range, CacheKey, FlowEngine, FlowStore};
use crate::frame::{DisplacementField, Frame};
use crate::io::source::{FrameSource, ReadFrame};
use crate::output::{flow_consistency, FlowConsistencyRecord, OutputAssembler};
use crate::pipeline::types::{AlignStage, ProgressReporter};
use crate::stack::{Averager, LevelAccumulator};
use crate::warp::remap_cubic;

use super::prealign::PreShiftedSequence;
use super::schedule::{GroupDescriptor, ParentSlotCounter, PyramidLevelState, PyramidSchedule};

/// Run parameters of the aligner.
#[derive(Clone, Debug)]
pub struct AlignSettings {
    /// Group size at which the schedule stops.
    pub target_group_size: usize,
    /// Inclusive 1-based frame range; `None` means the whole sequence.
    pub frame_range: Option<(usize, usize)>,
    /// Keep every warped terminal frame. Requires a target group size of 1.
    pub emit_sequence: bool,
    pub device: DevicePreference,
}

impl Default for AlignSettings {
    fn default() -> Self {
        Self {
            target_group_size: 1,
            frame_range: None,
            emit_sequence: false,
            device: DevicePreference::Auto,
        }
    }
}

/// Timing and shape of one completed level.
#[derive(Clone, Debug)]
pub struct LevelSummary {
    pub level_index: usize,
    pub group_count: usize,
    pub group_size: usize,
    pub terminal: bool,
    pub elapsed: Duration,
}

/// Everything a run produces.
#[derive(Clone, Debug)]
pub struct AlignmentResult {
    /// Reference after the terminal level.
    pub composite: Array2<f32>,
    /// Warped terminal frames in sequence order, when requested.
    pub aligned: Option<Vec<Frame>>,
    pub records: Vec<FlowConsistencyRecord>,
    pub levels: Vec<LevelSummary>,
    /// Inclusive 1-based range that was processed.
    pub first_frame: usize,
    pub last_frame: usize,
}

/// Where group representatives are read from.
struct Inputs<'r> {
    reader: &'r dyn ReadFrame,
    pre_shifted: Option<&'r PreShiftedSequence>,
}

/// State owned by one level while its groups are processed.
struct LevelRun<'l> {
    state: PyramidLevelState,
    reference: Array2<f32>,
    accumulator: LevelAccumulator,
    previous_field: Option<DisplacementField>,
    assembler: &'l mut OutputAssembler,
}

/// Drives the level loop over a corrected frame source.
pub struct PyramidAligner<'a> {
    source: &'a FrameSource,
    engine: &'a dyn FlowEngine,
    cache: &'a mut dyn FlowStore,
    settings: AlignSettings,
}

impl<'a> PyramidAligner<'a> {
    pub fn new(
        source: &'a FrameSource,
        engine: &'a dyn FlowEngine,
        cache: &'a mut dyn FlowStore,
        settings: AlignSettings,
    ) -> Self {
        Self {
            source,
            engine,
            cache,
            settings,
        }
    }

    /// Inclusive 1-based range the run covers, validated against the source.
    pub fn frame_range(&self) -> Result<(usize, usize)> {
        let total = self.source.frame_count();
        let (first, last) = self.settings.frame_range.unwrap_or((1, total));
        if first == 0 || last < first || last > total {
            return Err(AlignError::InvalidConfig(format!(
                "frame range {first}..={last} does not fit a sequence of {total} frames"
            )));
        }
        Ok((first, last))
    }

    pub fn run(&mut self, reporter: &dyn ProgressReporter) -> Result<AlignmentResult> {
        let (first, last) = self.frame_range()?;
        let frame_count = last - first + 1;
        let schedule = PyramidSchedule::new(frame_count, self.settings.target_group_size)?;
        if self.settings.emit_sequence && self.settings.target_group_size != 1 {
            return Err(AlignError::InvalidConfig(format!(
                "an aligned sequence needs a target group size of 1, got {}",
                self.settings.target_group_size
            )));
        }

        info!(
            first,
            last,
            target_group_size = self.settings.target_group_size,
            levels = schedule.levels().len(),
            engine = self.engine.name(),
            "Starting coarse-to-fine alignment"
        );

        let pre_shifted = if self.source.has_coarse_shifts() {
            reporter.begin_stage(AlignStage::PreAlignment, Some(frame_count));
            let sequence = PreShiftedSequence::build(
                self.source,
                first,
                last,
                self.settings.device,
                |index| reporter.advance(index + 1 - first),
            )?;
            reporter.finish_stage();
            info!(frames = sequence.len(), "Global pre-alignment applied");
            Some(sequence)
        } else {
            None
        };
        let inputs = Inputs {
            reader: match pre_shifted {
                Some(ref sequence) => sequence as &dyn ReadFrame,
                None => self.source as &dyn ReadFrame,
            },
            pre_shifted: pre_shifted.as_ref(),
        };

        reporter.begin_stage(AlignStage::InitialAverage, None);
        let mut reference = Averager.average(inputs.reader, first, last)?;
        reporter.finish_stage();

        let mut assembler =
            OutputAssembler::new(first, frame_count, self.settings.emit_sequence);
        let mut summaries = Vec::new();
        let mut previous: Option<PyramidLevelState> = None;
        let mut state = schedule.first();

        loop {
            let started = Instant::now();
            info!(
                level = state.level_index,
                group_count = state.group_count,
                group_size = state.group_size,
                terminal = state.terminal,
                "Level started"
            );
            reporter.begin_stage(AlignStage::Level(state.level_index), Some(state.group_count));

            let mut run = LevelRun {
                state,
                reference: normalize_unit_range(&reference),
                accumulator: LevelAccumulator::new(reference.dim()),
                previous_field: None,
                assembler: &mut assembler,
            };
            let mut parents = previous.map(|p| (p.group_size, ParentSlotCounter::new(p.group_count)));

            for desc in schedule.groups(&state, first) {
                let seed_key = parents
                    .as_mut()
                    .and_then(|(size, slots)| slots.next().map(|slot| CacheKey::new(*size, slot)));
                self.align_group(&mut run, &inputs, &desc, seed_key)
                    .map_err(|e| AlignError::Group {
                        level: state.level_index,
                        group: desc.group_index,
                        start: desc.start,
                        end: desc.end,
                        source: Box::new(e),
                    })?;
                reporter.advance(desc.group_index + 1);
            }

            reference = run.accumulator.into_mean(state.group_count);
            reporter.finish_stage();

            let elapsed = started.elapsed();
            info!(
                level = state.level_index,
                group_count = state.group_count,
                group_size = state.group_size,
                elapsed_ms = elapsed.as_millis() as u64,
                "Level finished"
            );
            summaries.push(LevelSummary {
                level_index: state.level_index,
                group_count: state.group_count,
                group_size: state.group_size,
                terminal: state.terminal,
                elapsed,
            });

            // The finished level has read its parents for the last time.
            if let Some(parent) = previous {
                self.cache.evict_group_size(parent.group_size)?;
            }

            match schedule.next(&state) {
                Some(next) => {
                    previous = Some(state);
                    state = next;
                }
                None => break,
            }
        }

        let (aligned, records) = assembler.finish()?;
        info!(levels = summaries.len(), records = records.len(), "Alignment complete");

        Ok(AlignmentResult {
            composite: reference,
            aligned,
            records,
            levels: summaries,
            first_frame: first,
            last_frame: last,
        })
    }

    fn align_group(
        &mut self,
        run: &mut LevelRun<'_>,
        inputs: &Inputs<'_>,
        desc: &GroupDescriptor,
        seed_key: Option<CacheKey>,
    ) -> Result<()> {
        let dims = run.reference.dim();

        let representative = if desc.frame_count() == 1 {
            inputs.reader.read(desc.start)?.data
        } else {
            Averager.average(inputs.reader, desc.start, desc.end)?
        };

        let seed = match seed_key {
            Some(key) => {
                let field = self.cache.get(key)?.ok_or(AlignError::MissingWarmStart {
                    group_size: key.group_size,
                    slot: key.slot,
                })?;
                if field.dim() != dims {
                    return Err(AlignError::dimension_mismatch(
                        format!("cached flow field {key}"),
                        dims,
                        field.dim(),
                    ));
                }
                Some(field)
            }
            None => None,
        };

        let field = self.engine.estimate(
            &run.reference,
            &normalize_unit_range(&representative),
            seed.as_ref(),
        )?;
        if field.dim() != dims || field.dy.dim() != dims {
            return Err(AlignError::Estimation(format!(
                "{} returned a {}x{} field for a {}x{} image",
                self.engine.name(),
                field.dim().1,
                field.dim().0,
                dims.1,
                dims.0
            )));
        }
        if !field.is_finite() {
            return Err(AlignError::Estimation(format!(
                "{} returned non-finite displacements",
                self.engine.name()
            )));
        }

        // Single frames of a pre-aligned run are resampled from the original
        // frame, folding the coarse shift into the same interpolation.
        let shift = match inputs.pre_shifted {
            Some(sequence) if run.state.group_size == 1 => sequence.shift(desc.start),
            _ => None,
        };
        let image = match shift {
            Some(_) => self.source.read(desc.start)?.data,
            None => representative,
        };
        let warped = remap_cubic(&image, &field.to_remap_table(shift), self.settings.device)?;
        run.accumulator.add(&warped)?;

        debug!(
            level = run.state.level_index,
            group = desc.group_index,
            start = desc.start,
            end = desc.end,
            seed = ?seed_key,
            "Group aligned"
        );

        if !run.state.terminal {
            self.cache
                .put(CacheKey::new(run.state.group_size, desc.group_index), &field)?;
            return Ok(());
        }

        if let Some(ref previous) = run.previous_field {
            run.assembler
                .push_record(flow_consistency(desc.start, previous, &field)?);
        }
        run.previous_field = Some(field);
        run.assembler.place_frame(desc.start, warped)
    }
}
