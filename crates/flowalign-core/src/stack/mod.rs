pub mod mean;

pub use mean::{Averager, LevelAccumulator};
