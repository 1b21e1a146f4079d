/// Alignment stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignStage {
    Reading,
    PreAlignment,
    InitialAverage,
    /// 1-based pyramid level.
    Level(usize),
    Writing,
}

impl std::fmt::Display for AlignStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading frames"),
            Self::PreAlignment => write!(f, "Pre-aligning frames"),
            Self::InitialAverage => write!(f, "Averaging all frames"),
            Self::Level(level) => write!(f, "Aligning level {level}"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for an alignment run.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (frames or groups), if known.
    fn begin_stage(&self, _stage: AlignStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_alignment` delegates.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
