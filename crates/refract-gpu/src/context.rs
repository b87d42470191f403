// Graphics context: device handles plus the shader registry and pipeline cache
// every component shares. Passed explicitly instead of living in globals.

use std::sync::Arc;

use parking_lot::Mutex;
use refract_core::{BlockLayout, Reflect};
use refract_reflect::{bind_parameter, ReflectionError};

use crate::cache::{CacheStats, PipelineCache, PipelineCacheKey};
use crate::config::GraphicsConfig;
use crate::error::{ContextError, PipelineError};
use crate::pipeline::{ManagedShader, Pipeline, ShaderRegistry, ShaderSource};

pub struct GraphicsContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub config: GraphicsConfig,
    shaders: ShaderRegistry,
    pipelines: PipelineCache<Pipeline>,
    /// Error scopes live on a device-wide stack in wgpu 23; push..pop pairs
    /// from different threads must not interleave.
    pub(crate) error_scope: Mutex<()>,
}

impl GraphicsContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, config: GraphicsConfig) -> Self {
        Self {
            device,
            queue,
            config,
            shaders: ShaderRegistry::new(),
            pipelines: PipelineCache::new(),
            error_scope: Mutex::new(()),
        }
    }

    /// Context on the first adapter that does not need a surface.
    pub async fn headless(config: GraphicsConfig) -> Result<Self, ContextError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ContextError::NoAdapter)?;
        log::info!("adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(&config.label("device")),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self::new(Arc::new(device), Arc::new(queue), config))
    }

    pub fn register_shader(
        &self,
        name: &str,
        source: ShaderSource,
    ) -> Result<Arc<ManagedShader>, ReflectionError> {
        self.shaders.register(name, source)
    }

    pub fn shader(&self, name: &str) -> Option<Arc<ManagedShader>> {
        self.shaders.get(name)
    }

    /// Compiled pipeline for `shader` rendering into `format`, compiled on first use.
    pub fn pipeline(
        &self,
        shader: &ManagedShader,
        format: wgpu::TextureFormat,
    ) -> Result<Arc<Pipeline>, PipelineError> {
        let key = PipelineCacheKey::new(shader.id, format);
        self.pipelines.get_or_compile(key, || {
            log::info!("compiling pipeline `{}` ({}) for {:?}", shader.name, shader.id, format);
            Pipeline::compile(self, shader, format)
        })
    }

    pub fn pipeline_stats(&self) -> CacheStats {
        self.pipelines.stats()
    }

    /// Binds `T`'s schema against the shader parameter called `parameter`.
    pub fn bind<T: Reflect>(
        &self,
        shader: &ManagedShader,
        parameter: &str,
    ) -> Result<BlockLayout, ReflectionError> {
        bind_parameter(T::schema(), &shader.reflection, parameter)
    }

    /// Delivers pending map completions without blocking.
    pub fn poll(&self) {
        self.device.poll(wgpu::Maintain::Poll);
    }
}
