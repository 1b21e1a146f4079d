pub mod prealign;
pub mod pyramid;
pub mod schedule;

pub use prealign::PreShiftedSequence;
pub use pyramid::{AlignSettings, AlignmentResult, LevelSummary, PyramidAligner};
pub use schedule::{GroupDescriptor, ParentSlotCounter, PyramidLevelState, PyramidSchedule};
