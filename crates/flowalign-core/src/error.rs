use thiserror::Error;

/// Broad category of a failure. Every kind is fatal to an alignment run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid crop, frame range, group size, manifest or gain map.
    Config,
    /// Missing or corrupt frames, correction images or cache records.
    Io,
    /// Shapes of frames, corrections or cached fields disagree.
    Dimension,
    /// The flow estimator failed or returned a malformed field.
    Estimation,
}

#[derive(Error, Debug)]
pub enum AlignError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Frame {index} could not be read: {reason}")]
    FrameUnreadable { index: usize, reason: String },

    #[error("Invalid crop: {0}")]
    InvalidCrop(String),

    #[error("Invalid gain map: {0}")]
    InvalidGain(String),

    #[error("Invalid sequence manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Dimension mismatch in {context}: expected {expected_w}x{expected_h}, got {actual_w}x{actual_h}")]
    DimensionMismatch {
        context: String,
        expected_w: usize,
        expected_h: usize,
        actual_w: usize,
        actual_h: usize,
    },

    #[error("Flow cache error: {0}")]
    Cache(String),

    #[error("No cached warm-start field for group size {group_size}, slot {slot}")]
    MissingWarmStart { group_size: usize, slot: usize },

    #[error("Flow estimation failed: {0}")]
    Estimation(String),

    #[error("Level {level}, group {group} (frames {start}-{end}): {source}")]
    Group {
        level: usize,
        group: usize,
        start: usize,
        end: usize,
        #[source]
        source: Box<AlignError>,
    },
}

impl AlignError {
    /// Build a `DimensionMismatch` from `(height, width)` pairs as returned by `Array2::dim`.
    pub fn dimension_mismatch(
        context: impl Into<String>,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected_w: expected.1,
            expected_h: expected.0,
            actual_w: actual.1,
            actual_h: actual.0,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCrop(_)
            | Self::InvalidGain(_)
            | Self::InvalidManifest(_)
            | Self::InvalidConfig(_)
            | Self::EmptySequence => ErrorKind::Config,
            Self::Io(_)
            | Self::ImageError(_)
            | Self::InvalidSer(_)
            | Self::InvalidDimensions { .. }
            | Self::FrameIndexOutOfRange { .. }
            | Self::FrameUnreadable { .. }
            | Self::Cache(_)
            | Self::MissingWarmStart { .. } => ErrorKind::Io,
            Self::DimensionMismatch { .. } => ErrorKind::Dimension,
            Self::Estimation(_) => ErrorKind::Estimation,
            Self::Group { source, .. } => source.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AlignError>;
