// Shader registry and render pipeline compilation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use refract_core::ShaderId;
use refract_reflect::{ReflectionError, ReflectionTree};

use crate::error::PipelineError;
use crate::layout::BindGroupLayoutMap;
use crate::vertex::Vertex;
use crate::GraphicsContext;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

// ──────────────────────────────────────────────
// Shader sources
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub wgsl: String,
    /// Reflection document emitted by the shader compiler, as JSON text.
    pub reflection: String,
    pub vertex: wgpu::VertexBufferLayout<'static>,
}

impl ShaderSource {
    pub fn new(wgsl: impl Into<String>, reflection: impl Into<String>) -> Self {
        Self {
            wgsl: wgsl.into(),
            reflection: reflection.into(),
            vertex: Vertex::LAYOUT,
        }
    }

    pub fn from_paths(wgsl: &Path, reflection: &Path) -> Result<Self, PipelineError> {
        let wgsl = std::fs::read_to_string(wgsl)?;
        let reflection = std::fs::read_to_string(reflection)?;
        Ok(Self::new(wgsl, reflection))
    }

    pub fn with_vertex(mut self, vertex: wgpu::VertexBufferLayout<'static>) -> Self {
        self.vertex = vertex;
        self
    }
}

/// A registered shader: its id, its source and the reflection decoded from it.
#[derive(Debug)]
pub struct ManagedShader {
    pub id: ShaderId,
    pub name: String,
    pub source: ShaderSource,
    pub reflection: ReflectionTree,
}

/// Shaders by name. Registering a known name returns the existing entry.
#[derive(Default)]
pub struct ShaderRegistry {
    next_id: AtomicU64,
    shaders: RwLock<HashMap<String, Arc<ManagedShader>>>,
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: &str,
        source: ShaderSource,
    ) -> Result<Arc<ManagedShader>, ReflectionError> {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        let reflection: ReflectionTree = source.reflection.parse()?;
        let mut shaders = self.shaders.write();
        let shader = shaders.entry(name.to_string()).or_insert_with(|| {
            let id = ShaderId(self.next_id.fetch_add(1, Ordering::Relaxed));
            log::debug!("registered shader `{}` as {}", name, id);
            Arc::new(ManagedShader {
                id,
                name: name.to_string(),
                source,
                reflection,
            })
        });
        Ok(shader.clone())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ManagedShader>> {
        self.shaders.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.shaders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.read().is_empty()
    }
}

// ──────────────────────────────────────────────
// Pipeline
// ──────────────────────────────────────────────

/// A compiled render pipeline together with the layouts it was built from.
pub struct Pipeline {
    shader: ShaderId,
    format: wgpu::TextureFormat,
    layouts: BindGroupLayoutMap,
    render_pipeline: wgpu::RenderPipeline,
}

impl Pipeline {
    pub fn compile(
        ctx: &GraphicsContext,
        shader: &ManagedShader,
        format: wgpu::TextureFormat,
    ) -> Result<Self, PipelineError> {
        let device = &ctx.device;
        let config = &ctx.config;

        // Reflection problems are ours, not the driver's; report them before
        // touching the device.
        let layouts =
            BindGroupLayoutMap::from_tree(device, &shader.reflection, config.visibility())?;

        let scope = ctx.error_scope.lock();
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&shader.name),
            source: wgpu::ShaderSource::Wgsl(shader.source.wgsl.as_str().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&config.label(&shader.name)),
            bind_group_layouts: &layouts.ordered(),
            push_constant_ranges: &[],
        });

        let depth_stencil = config.depth_test.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{}:{:?}", shader.name, format)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: None,
                buffers: &[shader.source.vertex.clone()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: None,
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let error = pollster::block_on(device.pop_error_scope());
        drop(scope);
        if let Some(error) = error {
            return Err(PipelineError::Compilation {
                shader: shader.id,
                message: error.to_string(),
            });
        }

        Ok(Self {
            shader: shader.id,
            format,
            layouts,
            render_pipeline,
        })
    }

    pub fn shader(&self) -> ShaderId {
        self.shader
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn layouts(&self) -> &BindGroupLayoutMap {
        &self.layouts
    }

    pub fn render_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.render_pipeline
    }
}
