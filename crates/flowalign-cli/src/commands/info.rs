use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use flowalign_core::io::sequence::open_sequence;

#[derive(Args)]
pub struct InfoArgs {
    /// Input SER movie or TOML sequence manifest
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let opened = open_sequence(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let info = &opened.info;

    println!("File:          {}", info.filename.display());
    println!("Frames:        {}", info.total_frames);
    println!("Dimensions:    {}x{}", info.width, info.height);
    println!(
        "Coarse shifts: {}",
        if info.has_coarse_shifts { "yes" } else { "no" }
    );

    let frame_bytes = info.width * info.height * std::mem::size_of::<f32>();
    let total_mb = (frame_bytes * info.total_frames) as f64 / (1024.0 * 1024.0);
    println!("Decoded size:  {:.1} MB", total_mb);

    Ok(())
}
