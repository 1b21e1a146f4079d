use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use flowalign_core::io::crop::CropCorners;
use flowalign_core::pipeline::config::{AlignConfig, FrameRange};

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a full default AlignConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let mut config = AlignConfig::new("input.ser");
    config.composite = Some(PathBuf::from("composite.tiff"));
    config.records = Some(PathBuf::from("consistency.toml"));
    config.crop = Some(CropCorners {
        top_left: (0, 0),
        bottom_right: (511, 511),
    });
    config.frame_range = Some(FrameRange { first: 0, last: 99 });
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
