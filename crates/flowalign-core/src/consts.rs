/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Group count of the first (coarsest) pyramid level.
pub const INITIAL_GROUP_COUNT: usize = 2;

/// Default box window of the dense flow estimator, in pixels.
pub const DEFAULT_FLOW_WINDOW: usize = 150;

/// Number of image pyramid levels used inside the flow estimator.
pub const FLOW_PYRAMID_LEVELS: usize = 6;

/// Refinement iterations per flow pyramid level.
pub const FLOW_ITERATIONS: usize = 1;

/// Smallest side (in pixels) a flow pyramid level may have.
pub const FLOW_MIN_LEVEL_SIZE: usize = 8;

/// Gaussian blur sigma used for building the flow estimator's image pyramid.
pub const PYRAMID_BLUR_SIGMA: f32 = 1.0;

/// Tikhonov term added to the Lucas-Kanade normal equations, per window pixel.
pub const FLOW_REGULARIZATION: f64 = 1e-6;

/// Keys cubic convolution parameter (matches the common `INTER_CUBIC` kernel).
pub const CUBIC_A: f32 = -0.75;

/// Channel count of a cached displacement field record (dx, dy).
pub const FLOW_RECORD_CHANNELS: i32 = 2;
