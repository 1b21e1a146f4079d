//! The doubling group schedule of the coarse-to-fine aligner.
//!
//! Level 1 splits the range into two groups; every following level doubles
//! the group count until the group size reaches the target. A group size of
//! one forces one group per frame, so the terminal level of a target-1 run
//! always covers every frame individually.

use crate::consts::INITIAL_GROUP_COUNT;
use crate::error::{AlignError, Result};

/// One level of the schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PyramidLevelState {
    /// 1-based; the initial whole-range average counts as level 0.
    pub level_index: usize,
    pub group_count: usize,
    pub group_size: usize,
    pub terminal: bool,
}

/// Inclusive 1-based frame run of one group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub group_count: usize,
    /// 0-based position within the level.
    pub group_index: usize,
    pub start: usize,
    pub end: usize,
}

impl GroupDescriptor {
    pub fn frame_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Validated level sequence for `total_frames` frames and a target group size.
#[derive(Clone, Debug)]
pub struct PyramidSchedule {
    total_frames: usize,
    target_group_size: usize,
}

impl PyramidSchedule {
    /// Fails unless the doubling schedule reaches `target_group_size` exactly.
    pub fn new(total_frames: usize, target_group_size: usize) -> Result<Self> {
        if total_frames < 2 {
            return Err(AlignError::InvalidConfig(format!(
                "at least 2 frames are needed, got {total_frames}"
            )));
        }
        if target_group_size == 0 {
            return Err(AlignError::InvalidConfig(
                "target group size must be at least 1".into(),
            ));
        }

        let schedule = Self {
            total_frames,
            target_group_size,
        };

        let mut state = schedule.first();
        while !state.terminal {
            let next_size = total_frames / (state.group_count * 2);
            if next_size < target_group_size {
                return Err(AlignError::InvalidConfig(format!(
                    "group size {target_group_size} is not reachable from {total_frames} frames \
                     by doubling the group count (sizes go {} -> {next_size})",
                    state.group_size
                )));
            }
            state = schedule.level(state.level_index + 1, state.group_count * 2);
        }

        Ok(schedule)
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn target_group_size(&self) -> usize {
        self.target_group_size
    }

    pub fn first(&self) -> PyramidLevelState {
        self.level(1, INITIAL_GROUP_COUNT)
    }

    /// Transition function: the level after `state`, or `None` once terminal.
    pub fn next(&self, state: &PyramidLevelState) -> Option<PyramidLevelState> {
        (!state.terminal).then(|| self.level(state.level_index + 1, state.group_count * 2))
    }

    /// Every level in order, ending with the terminal one.
    pub fn levels(&self) -> Vec<PyramidLevelState> {
        std::iter::successors(Some(self.first()), |s| self.next(s)).collect()
    }

    /// Split `total_frames` frames starting at 1-based `first_frame` into the
    /// level's contiguous groups; the last group absorbs the remainder.
    pub fn groups(&self, state: &PyramidLevelState, first_frame: usize) -> Vec<GroupDescriptor> {
        let last_frame = first_frame + self.total_frames - 1;
        (0..state.group_count)
            .map(|g| {
                let start = first_frame + g * state.group_size;
                let end = if g + 1 == state.group_count {
                    last_frame
                } else {
                    start + state.group_size - 1
                };
                GroupDescriptor {
                    group_count: state.group_count,
                    group_index: g,
                    start,
                    end,
                }
            })
            .collect()
    }

    fn level(&self, level_index: usize, group_count: usize) -> PyramidLevelState {
        let group_size = self.total_frames / group_count;
        let group_count = if group_size == 1 {
            self.total_frames
        } else {
            group_count
        };
        PyramidLevelState {
            level_index,
            group_count,
            group_size,
            terminal: group_size == self.target_group_size,
        }
    }
}

/// Yields the parent slot of each successive group: 0, 0, 1, 1, 2, 2, ...
/// clamped to the last group of the previous level.
#[derive(Clone, Debug)]
pub struct ParentSlotCounter {
    previous_group_count: usize,
    emitted: usize,
}

impl ParentSlotCounter {
    pub fn new(previous_group_count: usize) -> Self {
        Self {
            previous_group_count,
            emitted: 0,
        }
    }
}

impl Iterator for ParentSlotCounter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let slot = (self.emitted / 2).min(self.previous_group_count.saturating_sub(1));
        self.emitted += 1;
        Some(slot)
    }
}
