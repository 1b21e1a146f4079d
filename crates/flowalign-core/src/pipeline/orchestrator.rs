use std::sync::Arc;

use tracing::info;

use crate::align::{AlignSettings, AlignmentResult, PyramidAligner};
use crate::compute::create_flow_engine;
use crate::error::Result;
use crate::flow::FlowCache;
use crate::io::crop::CropRect;
use crate::io::image_io::{load_image, save_image};
use crate::io::sequence::open_sequence;
use crate::io::ser_writer::write_sequence;
use crate::io::source::{Correction, FrameSource};
use crate::output::write_records;

use super::config::AlignConfig;
use super::types::{AlignStage, NoOpReporter, ProgressReporter};

/// Run a full alignment with a thread-safe progress reporter.
///
/// Opens the input, applies crop, dark and gain, runs the coarse-to-fine
/// aligner and writes every output the configuration names.
pub fn run_alignment_reported(
    config: &AlignConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<AlignmentResult> {
    reporter.begin_stage(AlignStage::Reading, None);
    let opened = open_sequence(&config.input)?;
    info!(
        input = %config.input.display(),
        total_frames = opened.info.total_frames,
        width = opened.info.width,
        height = opened.info.height,
        coarse_shifts = opened.info.has_coarse_shifts,
        device = %config.device,
        "Opened input sequence"
    );

    let raw_dims = opened.store.dimensions();
    let crop = config
        .crop
        .as_ref()
        .map(CropRect::from_corners)
        .transpose()?;
    let dark = config.dark.as_deref().map(load_image).transpose()?;
    let gain = config.gain.as_deref().map(load_image).transpose()?;
    let correction = Correction::new(crop, dark, gain, raw_dims)?;

    let mut source = FrameSource::new(opened.store, correction)?;
    if let Some(shifts) = opened.shifts {
        source = source.with_shifts(shifts)?;
    }
    reporter.finish_stage();

    let frame_range = config.frame_range.map(|r| r.to_one_based()).transpose()?;
    let settings = AlignSettings {
        target_group_size: config.group_size,
        frame_range,
        emit_sequence: config.aligned_movie.is_some(),
        device: config.device,
    };

    let engine = create_flow_engine(&config.flow, config.device);
    let mut cache = match config.cache.spill_dir {
        Some(ref dir) => FlowCache::spill_to(dir)?,
        None => FlowCache::in_memory(),
    };

    let outcome = PyramidAligner::new(&source, engine.as_ref(), &mut cache, settings)
        .run(reporter.as_ref());
    let cleared = cache.clear();
    let result = outcome?;
    cleared?;

    reporter.begin_stage(AlignStage::Writing, None);
    if let Some(ref path) = config.composite {
        save_image(&result.composite, path)?;
        info!(path = %path.display(), "Composite written");
    }
    if let (Some(path), Some(frames)) = (&config.aligned_movie, &result.aligned) {
        let data: Vec<_> = frames.iter().map(|f| f.data.clone()).collect();
        write_sequence(path, &data)?;
        info!(path = %path.display(), frames = frames.len(), "Aligned movie written");
    }
    if let Some(ref path) = config.records {
        write_records(path, &result.records)?;
        info!(path = %path.display(), records = result.records.len(), "Consistency records written");
    }
    reporter.finish_stage();

    Ok(result)
}

/// Run a full alignment without progress reporting.
pub fn run_alignment(config: &AlignConfig) -> Result<AlignmentResult> {
    run_alignment_reported(config, Arc::new(NoOpReporter))
}
