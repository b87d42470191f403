// refract demo: builds a pipeline from shader reflection, binds host records to
// its parameter blocks, streams camera updates through a staged buffer and draws
// one frame offscreen.
//
// Usage: refract [<shader.wgsl> <reflection.json>]

mod scene;
mod shaders;

use std::error::Error;
use std::path::Path;

use refract_gpu::{
    GraphicsConfig, GraphicsContext, ParameterBlock, ShaderSource, StagedBuffer, WriteOutcome,
    DEPTH_FORMAT,
};

use scene::{Camera, Light, Material, TRIANGLE};
use shaders::{LIT_REFLECTION, LIT_SHADER};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const TARGET_SIZE: u32 = 256;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = GraphicsConfig::load();
    let ctx = pollster::block_on(GraphicsContext::headless(config))?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let source = match args.as_slice() {
        [wgsl, reflection] => ShaderSource::from_paths(Path::new(wgsl), Path::new(reflection))?,
        _ => ShaderSource::new(LIT_SHADER, LIT_REFLECTION),
    };
    let shader = ctx.register_shader("lit", source)?;

    // ── Pipeline (second request is a cache hit) ──
    let pipeline = ctx.pipeline(&shader, TARGET_FORMAT)?;
    let again = ctx.pipeline(&shader, TARGET_FORMAT)?;
    let stats = ctx.pipeline_stats();
    log::info!(
        "pipeline cache: {} entries, {} hits, {} misses (same object: {})",
        stats.entries,
        stats.hits,
        stats.misses,
        std::sync::Arc::ptr_eq(&pipeline, &again)
    );
    for path in pipeline.layouts().paths() {
        log::info!(
            "  group {:?} <- `{}`",
            pipeline.layouts().index_of(path),
            path
        );
    }

    // ── Parameter blocks ──
    let camera_layout = ctx.bind::<Camera>(&shader, "camera")?;
    let material_layout = ctx.bind::<Material>(&shader, "material")?;
    let view_placement = camera_layout
        .field("view")
        .cloned()
        .ok_or("camera layout has no `view` field")?;

    let camera = ParameterBlock::new(&ctx, pipeline.layouts(), camera_layout)?;
    let material = ParameterBlock::new(&ctx, pipeline.layouts(), material_layout)?;

    camera.write_record(&ctx, &Camera::looking_at_origin(1.0))?;
    material.write_record(
        &ctx,
        &Material {
            tint: [1.0, 0.8, 0.6, 1.0],
            albedo: 0,
            albedo_sampler: 0,
            _pad: [0; 2],
            light: Light {
                color: [1.0, 1.0, 1.0, 1.0],
                intensity: 1.0,
                _pad: [0.0; 3],
            },
        },
    )?;
    material.write_field(&ctx, "light.intensity", &0.75f32)?;

    let albedo = create_white_texture(&ctx);
    let albedo_view = albedo.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("albedo_sampler"),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    let camera_group = camera.bind_group(&ctx, pipeline.layouts(), &[])?;
    let material_group = material.bind_group(
        &ctx,
        pipeline.layouts(),
        &[
            ("albedo", wgpu::BindingResource::TextureView(&albedo_view)),
            ("albedoSampler", wgpu::BindingResource::Sampler(&sampler)),
        ],
    )?;
    let light_group = material
        .child("light")
        .ok_or("material has no nested `light` block")?
        .bind_group(&ctx, pipeline.layouts(), &[])?;

    // ── Staged camera updates: a burst collapses to the last write ──
    let staged = StagedBuffer::create(
        &ctx,
        std::mem::size_of::<Camera>() as u64,
        wgpu::BufferUsages::UNIFORM,
        "camera_staged",
    );
    let mut pending = Vec::new();
    for zoom in [0.25f32, 0.5, 1.0] {
        let camera = Camera::looking_at_origin(zoom);
        pending.push(staged.write_placed(&view_placement, &camera.view)?);
        pending.push(staged.write(bytemuck::bytes_of(&camera))?);
    }
    let last = pending.pop().ok_or("no staged writes issued")?;
    match last.wait(&ctx.device)? {
        WriteOutcome::Applied => log::info!("staged camera applied"),
        WriteOutcome::Superseded => log::warn!("final staged camera write was superseded"),
    }
    let superseded = pending
        .iter()
        .filter(|p| matches!(p.try_outcome(), Some(Ok(WriteOutcome::Superseded))))
        .count();
    log::info!("{} earlier staged writes superseded", superseded);

    // ── One offscreen frame ──
    render_frame(
        &ctx,
        &pipeline,
        &[&camera_group, &material_group, &light_group],
    );
    ctx.device.poll(wgpu::Maintain::Wait);
    log::info!("rendered {}x{} frame", TARGET_SIZE, TARGET_SIZE);

    Ok(())
}

fn create_white_texture(ctx: &GraphicsContext) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("albedo"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    ctx.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    texture
}

fn render_frame(ctx: &GraphicsContext, pipeline: &refract_gpu::Pipeline, groups: &[&wgpu::BindGroup]) {
    let size = wgpu::Extent3d {
        width: TARGET_SIZE,
        height: TARGET_SIZE,
        depth_or_array_layers: 1,
    };
    let color = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("frame_color"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("frame_depth"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

    let vertices = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("triangle_vb"),
        size: std::mem::size_of_val(&TRIANGLE) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    ctx.queue
        .write_buffer(&vertices, 0, bytemuck::cast_slice(&TRIANGLE));

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: ctx.config.depth_test.then_some(
                wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                },
            ),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline.render_pipeline());
        for (index, group) in groups.iter().enumerate() {
            pass.set_bind_group(index as u32, *group, &[]);
        }
        pass.set_vertex_buffer(0, vertices.slice(..));
        pass.draw(0..TRIANGLE.len() as u32, 0..1);
    }
    ctx.queue.submit(std::iter::once(encoder.finish()));
}
