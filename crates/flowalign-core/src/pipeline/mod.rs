pub mod config;
mod orchestrator;
pub mod types;

pub use config::{AlignConfig, CacheConfig, FrameRange};
pub use orchestrator::{run_alignment, run_alignment_reported};
pub use types::{AlignStage, NoOpReporter, ProgressReporter};
