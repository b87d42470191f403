// Parameter blocks: a block's uniform buffer plus the bind group built from it.
// Nested blocks own their own buffer and group, reachable by dot path.

use bytemuck::Pod;
use refract_core::{join_path, BlockEntry, BlockLayout, SlotKind};

use crate::error::UploadError;
use crate::layout::BindGroupLayoutMap;
use crate::staged::{align_up, placed_bytes};
use crate::GraphicsContext;

pub struct ParameterBlock {
    path: String,
    layout: BlockLayout,
    buffer: Option<wgpu::Buffer>,
    children: Vec<ParameterBlock>,
}

impl ParameterBlock {
    /// Allocates uniform buffers for `layout` and every block nested in it.
    ///
    /// `layouts` must come from the same shader the block was bound against.
    pub fn new(
        ctx: &GraphicsContext,
        layouts: &BindGroupLayoutMap,
        layout: BlockLayout,
    ) -> Result<Self, UploadError> {
        let path = layout.name.clone();
        Self::build(ctx, layouts, path, layout)
    }

    fn build(
        ctx: &GraphicsContext,
        layouts: &BindGroupLayoutMap,
        path: String,
        mut layout: BlockLayout,
    ) -> Result<Self, UploadError> {
        if layouts.get(&path).is_none() {
            return Err(UploadError::UnknownField(path));
        }

        let buffer = layout.uniform_size.map(|size| {
            ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&ctx.config.label(&path)),
                size: align_up(size, wgpu::COPY_BUFFER_ALIGNMENT),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        // Children own their nested layouts; the parent keeps only its fields.
        let mut children = Vec::new();
        let mut fields = Vec::with_capacity(layout.entries.len());
        for entry in layout.entries.drain(..) {
            match entry {
                BlockEntry::Block(nested) => {
                    let child_path = join_path(&path, &nested.name);
                    children.push(Self::build(ctx, layouts, child_path, nested)?);
                }
                field => fields.push(field),
            }
        }
        layout.entries = fields;

        Ok(Self {
            path,
            layout,
            buffer,
            children,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    pub fn uniform_buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    pub fn child(&self, name: &str) -> Option<&ParameterBlock> {
        self.children.iter().find(|c| c.layout.name == name)
    }

    /// Writes one uniform field, addressed relative to this block (`"light.color"`).
    pub fn write_field<T: Pod>(
        &self,
        ctx: &GraphicsContext,
        path: &str,
        value: &T,
    ) -> Result<(), UploadError> {
        if let Some((head, rest)) = path.split_once('.') {
            return self
                .child(head)
                .ok_or_else(|| UploadError::UnknownField(join_path(&self.path, head)))?
                .write_field(ctx, rest, value);
        }

        let placement = self
            .layout
            .field(path)
            .ok_or_else(|| UploadError::UnknownField(join_path(&self.path, path)))?;
        let range = placement
            .byte_range()
            .ok_or_else(|| UploadError::NotInline(join_path(&self.path, path)))?;
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| UploadError::NotInline(join_path(&self.path, path)))?;

        let bytes = placed_bytes(placement, value)?;
        let len = bytes.len();
        let offset = range.start;
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0
        {
            return Err(UploadError::Misaligned {
                offset,
                len: len as u64,
            });
        }
        if offset + len as u64 > buffer.size() {
            return Err(UploadError::OutOfBounds {
                offset,
                len: len as u64,
                capacity: buffer.size(),
            });
        }

        ctx.queue.write_buffer(buffer, offset, bytes);
        Ok(())
    }

    /// Uploads every uniform member of `record` (the root host record) into this
    /// block and its nested blocks.
    pub fn write_record<T: Pod>(&self, ctx: &GraphicsContext, record: &T) -> Result<(), UploadError> {
        let bytes = bytemuck::bytes_of(record);
        if let Some(buffer) = &self.buffer {
            let image = self
                .layout
                .pack_uniforms(bytes)
                .ok_or(UploadError::OutOfBounds {
                    offset: 0,
                    len: bytes.len() as u64,
                    capacity: buffer.size(),
                })?;
            ctx.queue.write_buffer(buffer, 0, &image);
        }
        for child in &self.children {
            child.write_record(ctx, record)?;
        }
        Ok(())
    }

    /// Bind group for this block's own group. `resources` supplies each opaque
    /// resource by its shader name; the uniform buffer is filled in automatically.
    pub fn bind_group(
        &self,
        ctx: &GraphicsContext,
        layouts: &BindGroupLayoutMap,
        resources: &[(&str, wgpu::BindingResource<'_>)],
    ) -> Result<wgpu::BindGroup, UploadError> {
        let layout = layouts
            .get(&self.path)
            .ok_or_else(|| UploadError::UnknownField(self.path.clone()))?;

        let entries = self
            .layout
            .slots
            .iter()
            .map(|slot| {
                let resource = match &slot.kind {
                    SlotKind::UniformBuffer { .. } => self
                        .buffer
                        .as_ref()
                        .map(|b| b.as_entire_binding())
                        .ok_or_else(|| UploadError::MissingResource(self.path.clone()))?,
                    SlotKind::Resource { name, .. } => resources
                        .iter()
                        .find(|(n, _)| *n == name.as_str())
                        .map(|(_, r)| r.clone())
                        .ok_or_else(|| UploadError::MissingResource(join_path(&self.path, name)))?,
                };
                Ok(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource,
                })
            })
            .collect::<Result<Vec<_>, UploadError>>()?;

        Ok(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&ctx.config.label(&self.path)),
            layout,
            entries: &entries,
        }))
    }
}
