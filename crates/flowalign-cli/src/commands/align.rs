use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use flowalign_core::compute::DevicePreference;
use flowalign_core::flow::FlowParams;
use flowalign_core::io::crop::CropCorners;
use flowalign_core::pipeline::config::{AlignConfig, CacheConfig, FrameRange};
use flowalign_core::pipeline::{run_alignment_reported, AlignStage, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::summary::{print_align_summary, print_result_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum DeviceArg {
    Auto,
    Sequential,
    Parallel,
}

impl From<DeviceArg> for DevicePreference {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Auto => Self::Auto,
            DeviceArg::Sequential => Self::Sequential,
            DeviceArg::Parallel => Self::Parallel,
        }
    }
}

#[derive(Args)]
pub struct AlignArgs {
    /// Input SER movie or TOML sequence manifest
    pub file: PathBuf,

    /// Alignment config file (TOML); the positional input still wins
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Composite output path (.tiff or .png)
    #[arg(short, long, default_value = "composite.tiff")]
    pub output: PathBuf,

    /// Skip writing the composite image
    #[arg(long, conflicts_with = "output")]
    pub no_composite: bool,

    /// Also write the motion-corrected frames as a 16-bit SER movie
    #[arg(long)]
    pub aligned_movie: Option<PathBuf>,

    /// Write flow consistency records (TOML)
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Crop window as x0,y0,x1,y1 (inclusive corners, 0-based)
    #[arg(long)]
    pub crop: Option<String>,

    /// Frame range as first-last (inclusive, 0-based)
    #[arg(long)]
    pub frames: Option<String>,

    /// Group size at which refinement stops
    #[arg(long, default_value = "1")]
    pub group_size: usize,

    /// Flow estimator window size in pixels
    #[arg(long, default_value = "150")]
    pub window: usize,

    /// Dark frame subtracted from every frame
    #[arg(long)]
    pub dark: Option<PathBuf>,

    /// Gain map every frame is divided by
    #[arg(long)]
    pub gain: Option<PathBuf>,

    /// Execution backend
    #[arg(long, value_enum, default_value = "auto")]
    pub device: DeviceArg,

    /// Keep warm-start flow fields on disk here instead of in memory
    #[arg(long)]
    pub spill_dir: Option<PathBuf>,
}

/// Drives an indicatif bar from the core's stage reports.
struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: AlignStage, total_items: Option<usize>) {
        self.bar.set_length(total_items.unwrap_or(0) as u64);
        self.bar.set_position(0);
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }
}

pub fn run(args: &AlignArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let mut config = AlignConfig::load(config_path)
            .with_context(|| format!("Invalid alignment config {}", config_path.display()))?;
        config.input = args.file.clone();
        config
    } else {
        build_config_from_args(args)?
    };

    debug!(?config, "Resolved alignment config");
    print_align_summary(&config);

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:24} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let reporter = Arc::new(BarReporter { bar: bar.clone() });

    let result = run_alignment_reported(&config, reporter)
        .with_context(|| format!("Alignment of {} failed", config.input.display()))?;
    bar.finish_with_message("Done");

    print_result_summary(&config, &result);
    Ok(())
}

fn build_config_from_args(args: &AlignArgs) -> Result<AlignConfig> {
    let mut config = AlignConfig::new(args.file.clone());
    config.composite = (!args.no_composite).then(|| args.output.clone());
    config.aligned_movie = args.aligned_movie.clone();
    config.records = args.records.clone();
    config.crop = args.crop.as_deref().map(parse_crop).transpose()?;
    config.frame_range = args.frames.as_deref().map(parse_frames).transpose()?;
    config.group_size = args.group_size;
    config.flow = FlowParams {
        window_size: args.window,
        ..FlowParams::default()
    };
    config.dark = args.dark.clone();
    config.gain = args.gain.clone();
    config.device = args.device.into();
    config.cache = CacheConfig {
        spill_dir: args.spill_dir.clone(),
    };
    Ok(config)
}

fn parse_crop(s: &str) -> Result<CropCorners> {
    let values: Vec<usize> = s
        .split(',')
        .map(|v| v.trim().parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid crop '{s}'"))?;
    let [x0, y0, x1, y1] = values[..] else {
        bail!("Crop needs four values x0,y0,x1,y1, got '{s}'");
    };
    Ok(CropCorners {
        top_left: (x0, y0),
        bottom_right: (x1, y1),
    })
}

fn parse_frames(s: &str) -> Result<FrameRange> {
    let Some((first, last)) = s.split_once('-') else {
        bail!("Frame range must look like first-last, got '{s}'");
    };
    Ok(FrameRange {
        first: first.trim().parse().with_context(|| format!("Invalid frame range '{s}'"))?,
        last: last.trim().parse().with_context(|| format!("Invalid frame range '{s}'"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct AlignCli {
        #[command(flatten)]
        args: AlignArgs,
    }

    fn config_for(argv: &[&str]) -> AlignConfig {
        let cli = AlignCli::try_parse_from(std::iter::once("flowalign").chain(argv.iter().copied()))
            .unwrap();
        build_config_from_args(&cli.args).unwrap()
    }

    #[test]
    fn composite_defaults_to_tiff() {
        let config = config_for(&["capture.ser"]);
        assert_eq!(config.composite, Some(PathBuf::from("composite.tiff")));
    }

    #[test]
    fn no_composite_leaves_output_unset() {
        let config = config_for(&["capture.ser", "--no-composite", "--records", "r.toml"]);
        assert_eq!(config.composite, None);
        assert_eq!(config.records, Some(PathBuf::from("r.toml")));
    }

    #[test]
    fn no_composite_conflicts_with_output() {
        let parsed = AlignCli::try_parse_from([
            "flowalign",
            "capture.ser",
            "--no-composite",
            "-o",
            "out.png",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn crop_and_frames_parse() {
        let config = config_for(&["capture.ser", "--crop", "1,2,30,40", "--frames", "0-9"]);
        let crop = config.crop.unwrap();
        assert_eq!((crop.top_left, crop.bottom_right), ((1, 2), (30, 40)));
        assert_eq!(config.frame_range, Some(FrameRange { first: 0, last: 9 }));
    }
}
