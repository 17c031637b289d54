//! Error types for glyphrain.
//!
//! Configuration and atlas problems fail fast at initialization, allocation
//! failures are surfaced as-is. Numeric instability inside the simulation is
//! never an error value: the simulator recovers locally (see
//! [`crate::simulate::NUMERIC_FLOOR`]).

use std::collections::TryReserveError;
use std::fmt;

/// Invalid or out-of-range configuration values.
#[derive(Debug)]
pub enum ConfigError {
    /// `num_columns` was zero.
    EmptyGrid,
    /// `glyph_sequence_length` was zero.
    EmptyGlyphSequence,
    /// `glyph_texture_columns` was zero.
    ZeroAtlasColumns,
    /// The glyph sequence does not fit in the atlas grid.
    SequenceExceedsAtlas {
        /// Requested sequence length.
        sequence_length: u32,
        /// Number of cells in the atlas (`columns²`).
        capacity: u32,
    },
    /// A numeric field was NaN or infinite.
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A numeric field was outside its accepted range.
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f32,
    },
    /// Failed to parse a JSON configuration.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyGrid => write!(f, "Grid must have at least one column"),
            ConfigError::EmptyGlyphSequence => write!(f, "Glyph sequence length must be at least 1"),
            ConfigError::ZeroAtlasColumns => write!(f, "Glyph atlas must have at least one column"),
            ConfigError::SequenceExceedsAtlas { sequence_length, capacity } => write!(
                f,
                "Glyph sequence of length {} does not fit in an atlas of {} cells",
                sequence_length, capacity
            ),
            ConfigError::NonFinite { field } => write!(f, "Configuration field '{}' must be finite", field),
            ConfigError::OutOfRange { field, value } => {
                write!(f, "Configuration field '{}' is out of range: {}", field, value)
            }
            ConfigError::Parse(e) => write!(f, "Failed to parse configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Errors that can occur while loading or validating a glyph atlas.
#[derive(Debug)]
pub enum AtlasError {
    /// Failed to decode the image.
    ImageLoad(image::ImageError),
    /// Failed to read the file from disk.
    Io(std::io::Error),
    /// The atlas image has zero width or height.
    Empty,
    /// Atlas dimensions are not evenly divisible by the column count.
    IndivisibleLayout {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Glyph columns (and rows) the atlas is expected to hold.
        columns: u32,
    },
    /// Glyph cells would not be square.
    NotSquare {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// The atlas was built for a different column count than the configuration.
    ColumnMismatch {
        /// Columns of the atlas.
        atlas: u32,
        /// `glyph_texture_columns` of the configuration.
        config: u32,
    },
}

impl fmt::Display for AtlasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtlasError::ImageLoad(e) => write!(f, "Failed to load glyph atlas: {}", e),
            AtlasError::Io(e) => write!(f, "Failed to read glyph atlas file: {}", e),
            AtlasError::Empty => write!(f, "Glyph atlas image is empty"),
            AtlasError::IndivisibleLayout { width, height, columns } => write!(
                f,
                "Glyph atlas of {}x{} pixels cannot be split into a {}x{} glyph grid",
                width, height, columns, columns
            ),
            AtlasError::NotSquare { width, height } => {
                write!(f, "Glyph atlas must be square, got {}x{} pixels", width, height)
            }
            AtlasError::ColumnMismatch { atlas, config } => write!(
                f,
                "Glyph atlas has {} columns but the configuration expects {}",
                atlas, config
            ),
        }
    }
}

impl std::error::Error for AtlasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AtlasError::ImageLoad(e) => Some(e),
            AtlasError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for AtlasError {
    fn from(e: image::ImageError) -> Self {
        AtlasError::ImageLoad(e)
    }
}

impl From<std::io::Error> for AtlasError {
    fn from(e: std::io::Error) -> Self {
        AtlasError::Io(e)
    }
}

/// Failure to allocate a state buffer or framebuffer.
#[derive(Debug)]
pub enum AllocationError {
    /// The requested element count overflowed `usize`.
    Overflow {
        /// What was being allocated.
        what: &'static str,
    },
    /// The allocator refused the reservation.
    Reserve {
        /// What was being allocated.
        what: &'static str,
        /// Underlying reservation error.
        source: TryReserveError,
    },
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationError::Overflow { what } => write!(f, "Size of {} overflows addressable memory", what),
            AllocationError::Reserve { what, source } => write!(f, "Failed to allocate {}: {}", what, source),
        }
    }
}

impl std::error::Error for AllocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AllocationError::Reserve { source, .. } => Some(source),
            AllocationError::Overflow { .. } => None,
        }
    }
}

/// Errors that can occur during GPU initialization or readback.
#[cfg(feature = "gpu")]
#[derive(Debug)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// Failed to map buffer for reading.
    BufferMapping(String),
}

#[cfg(feature = "gpu")]
impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
        }
    }
}

#[cfg(feature = "gpu")]
impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "gpu")]
impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors returned by [`crate::Pipeline::initialize`].
///
/// No partial pipeline exists when any of these is returned.
#[derive(Debug)]
pub enum InitError {
    /// Configuration failed validation.
    Config(ConfigError),
    /// Glyph atlas failed validation.
    Atlas(AtlasError),
    /// Buffers could not be allocated.
    Allocation(AllocationError),
    /// GPU backend could not be created.
    #[cfg(feature = "gpu")]
    Gpu(GpuError),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::Config(e) => write!(f, "Invalid configuration: {}", e),
            InitError::Atlas(e) => write!(f, "Invalid glyph atlas: {}", e),
            InitError::Allocation(e) => write!(f, "Allocation failed: {}", e),
            #[cfg(feature = "gpu")]
            InitError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Config(e) => Some(e),
            InitError::Atlas(e) => Some(e),
            InitError::Allocation(e) => Some(e),
            #[cfg(feature = "gpu")]
            InitError::Gpu(e) => Some(e),
        }
    }
}

impl From<ConfigError> for InitError {
    fn from(e: ConfigError) -> Self {
        InitError::Config(e)
    }
}

impl From<AtlasError> for InitError {
    fn from(e: AtlasError) -> Self {
        InitError::Atlas(e)
    }
}

impl From<AllocationError> for InitError {
    fn from(e: AllocationError) -> Self {
        InitError::Allocation(e)
    }
}

#[cfg(feature = "gpu")]
impl From<GpuError> for InitError {
    fn from(e: GpuError) -> Self {
        InitError::Gpu(e)
    }
}
