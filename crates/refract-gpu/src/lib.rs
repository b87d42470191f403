// GPU side of refract: binding-group layouts, pipeline cache, staged uploads.
// Built on wgpu; reflection and schema binding come from refract-reflect.

mod cache;
mod config;
mod context;
mod error;
mod layout;
mod parameter;
mod pipeline;
mod staged;
mod vertex;

pub use cache::{CacheStats, PipelineCache, PipelineCacheKey};
pub use config::{GraphicsConfig, PowerPreference};
pub use context::GraphicsContext;
pub use error::{ConfigError, ContextError, PipelineError, UploadError};
pub use layout::{layout_entries, BindGroupLayoutMap};
pub use parameter::ParameterBlock;
pub use pipeline::{ManagedShader, Pipeline, ShaderRegistry, ShaderSource, DEPTH_FORMAT};
pub use staged::{
    MapBackend, MapCallback, PendingWrite, StagedBuffer, StagedWriteState, WgpuStaging,
    WriteOutcome,
};
pub use vertex::Vertex;
