use std::path::PathBuf;

use refract_core::ShaderId;
use refract_reflect::ReflectionError;
use thiserror::Error;

/// Failures of a staged or direct buffer upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("mapping the staging buffer failed: {0}")]
    MapFailed(String),

    #[error("write of {len} bytes at offset {offset} exceeds the {capacity}-byte buffer")]
    OutOfBounds { offset: u64, len: u64, capacity: u64 },

    #[error("write of {len} bytes at offset {offset} is not 4-byte aligned")]
    Misaligned { offset: u64, len: u64 },

    #[error("no resource supplied for binding `{0}`")]
    MissingResource(String),

    #[error("`{0}` is not a field of this parameter block")]
    UnknownField(String),

    #[error("`{0}` is an opaque resource and has no uniform bytes")]
    NotInline(String),

    #[error("a {value}-byte value does not fit the {field}-byte field `{name}`")]
    SizeMismatch { name: String, field: u64, value: u64 },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Reflection(#[from] ReflectionError),

    #[error("{shader} failed to compile: {message}")]
    Compilation { shader: ShaderId, message: String },

    #[error("failed to read shader source: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}
