// Binding-group layout builder: turns resolved block layouts into wgpu
// bind group layouts, one per parameter block, keyed by dot path.

use std::collections::HashMap;
use std::num::NonZeroU64;

use refract_core::{BlockLayout, ResourceShape, SlotKind, TextureDimension};
use refract_reflect::{block_layouts, ReflectionError, ReflectionTree};

/// Layout entries for one block's own slots (nested blocks are separate groups).
pub fn layout_entries(
    path: &str,
    block: &BlockLayout,
    visibility: wgpu::ShaderStages,
) -> Result<Vec<wgpu::BindGroupLayoutEntry>, ReflectionError> {
    block
        .slots
        .iter()
        .map(|slot| {
            let ty = match &slot.kind {
                SlotKind::UniformBuffer { size } => wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(*size),
                },
                SlotKind::Resource { name, shape } => match shape {
                    ResourceShape::Texture(dim) => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: view_dimension(*dim),
                        multisampled: false,
                    },
                    ResourceShape::Sampler => {
                        wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                    }
                    ResourceShape::Unrecognized(kind) => {
                        return Err(ReflectionError::UnknownResourceKind {
                            field: refract_core::join_path(path, name),
                            kind: kind.clone(),
                        })
                    }
                },
            };
            Ok(wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility,
                ty,
                count: None,
            })
        })
        .collect()
}

fn view_dimension(dim: TextureDimension) -> wgpu::TextureViewDimension {
    match dim {
        TextureDimension::D1 => wgpu::TextureViewDimension::D1,
        TextureDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureDimension::D3 => wgpu::TextureViewDimension::D3,
        TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
    }
}

/// A block's entries, computed before anything is allocated on the device.
#[derive(Debug, Clone)]
pub(crate) struct PlannedGroup {
    pub path: String,
    pub group: u32,
    pub entries: Vec<wgpu::BindGroupLayoutEntry>,
}

/// Entries for every block and nested block, in depth-first order.
///
/// Two blocks claiming the same group index make the pipeline layout
/// ambiguous and are rejected.
pub(crate) fn plan(
    blocks: &[BlockLayout],
    visibility: wgpu::ShaderStages,
) -> Result<Vec<PlannedGroup>, ReflectionError> {
    let mut planned = Vec::new();
    let mut claimed: HashMap<u32, String> = HashMap::new();
    for root in blocks {
        for (path, block) in root.walk() {
            if let Some(previous) = claimed.get(&block.group) {
                return Err(ReflectionError::Malformed {
                    context: path,
                    reason: format!("group {} is already used by `{}`", block.group, previous),
                });
            }
            claimed.insert(block.group, path.clone());
            let entries = layout_entries(&path, block, visibility)?;
            planned.push(PlannedGroup {
                path,
                group: block.group,
                entries,
            });
        }
    }
    Ok(planned)
}

/// Whether `groups` leaves holes below its highest index.
pub(crate) fn has_gaps(groups: &[PlannedGroup]) -> bool {
    groups
        .iter()
        .map(|g| g.group as usize + 1)
        .max()
        .is_some_and(|span| span > groups.len())
}

// ──────────────────────────────────────────────
// BindGroupLayoutMap
// ──────────────────────────────────────────────

struct GroupLayout {
    group: u32,
    entries: Vec<wgpu::BindGroupLayoutEntry>,
    layout: wgpu::BindGroupLayout,
}

/// Bind group layouts of one shader, addressable by parameter path (`"material.light"`).
pub struct BindGroupLayoutMap {
    layouts: Vec<GroupLayout>,
    by_path: HashMap<String, usize>,
    paths: Vec<String>,
    // Stands in for group indices no parameter block uses.
    filler: Option<wgpu::BindGroupLayout>,
}

impl BindGroupLayoutMap {
    pub fn build(
        device: &wgpu::Device,
        blocks: &[BlockLayout],
        visibility: wgpu::ShaderStages,
    ) -> Result<Self, ReflectionError> {
        let planned = plan(blocks, visibility)?;

        let filler = has_gaps(&planned).then(|| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("bgl:empty"),
                entries: &[],
            })
        });

        let mut layouts = Vec::with_capacity(planned.len());
        let mut by_path = HashMap::with_capacity(planned.len());
        let mut paths = Vec::with_capacity(planned.len());
        for group in planned {
            let label = format!("bgl:{}", group.path);
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&label),
                entries: &group.entries,
            });
            log::debug!(
                "layout `{}`: group {} with {} bindings",
                group.path,
                group.group,
                group.entries.len()
            );
            by_path.insert(group.path.clone(), layouts.len());
            paths.push(group.path);
            layouts.push(GroupLayout {
                group: group.group,
                entries: group.entries,
                layout,
            });
        }

        Ok(Self {
            layouts,
            by_path,
            paths,
            filler,
        })
    }

    /// Layouts for every parameter block the shader declares.
    pub fn from_tree(
        device: &wgpu::Device,
        tree: &ReflectionTree,
        visibility: wgpu::ShaderStages,
    ) -> Result<Self, ReflectionError> {
        let blocks = block_layouts(tree)?;
        Self::build(device, &blocks, visibility)
    }

    pub fn get(&self, path: &str) -> Option<&wgpu::BindGroupLayout> {
        self.by_path.get(path).map(|&i| &self.layouts[i].layout)
    }

    /// Group index the block at `path` binds to.
    pub fn index_of(&self, path: &str) -> Option<u32> {
        self.by_path.get(path).map(|&i| self.layouts[i].group)
    }

    pub fn entries(&self, path: &str) -> Option<&[wgpu::BindGroupLayoutEntry]> {
        self.by_path
            .get(path)
            .map(|&i| self.layouts[i].entries.as_slice())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Layouts indexed by group, with unused indices filled by an empty layout.
    pub fn ordered(&self) -> Vec<&wgpu::BindGroupLayout> {
        let span = match self.layouts.iter().map(|l| l.group).max() {
            Some(max) => max + 1,
            None => return Vec::new(),
        };
        (0..span)
            .filter_map(|g| {
                self.layouts
                    .iter()
                    .find(|l| l.group == g)
                    .map(|l| &l.layout)
                    .or(self.filler.as_ref())
            })
            .collect()
    }
}
