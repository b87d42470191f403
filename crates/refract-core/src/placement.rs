// Resolved placements: where each schema field lives on the device side.

use std::ops::Range;

use crate::{join_path, ResourceShape};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementKind {
    /// Bytes inside the block's uniform buffer at binding 0.
    Uniform,
    /// A binding slot of its own; offset and size are meaningless.
    Resource(ResourceShape),
}

/// Where one schema field lives: group, binding, and (for uniforms) the byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlacement {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub offset: u64,
    pub size: u64,
    pub kind: PlacementKind,
    /// Offset of the member in the root host record the block was bound from.
    pub host_offset: usize,
    pub host_size: usize,
}

impl FieldPlacement {
    pub fn is_uniform(&self) -> bool {
        self.kind == PlacementKind::Uniform
    }

    /// Device byte range, `None` for resources.
    pub fn byte_range(&self) -> Option<Range<u64>> {
        match self.kind {
            PlacementKind::Uniform => Some(self.offset..self.offset + self.size),
            PlacementKind::Resource(_) => None,
        }
    }

    /// Number of bytes actually copied from host to device for this field.
    pub fn copy_len(&self) -> usize {
        (self.size as usize).min(self.host_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    UniformBuffer { size: u64 },
    Resource { name: String, shape: ResourceShape },
}

/// One binding index of a block's binding group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlot {
    pub binding: u32,
    pub kind: SlotKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEntry {
    Field(FieldPlacement),
    Block(BlockLayout),
}

/// Resolved layout of one parameter block.
///
/// `slots` always describes every binding the shader declares for the block,
/// whether or not a schema field refers to it; `entries` holds the schema's
/// fields and nested blocks in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    pub name: String,
    pub group: u32,
    pub uniform_size: Option<u64>,
    pub slots: Vec<BindingSlot>,
    pub entries: Vec<BlockEntry>,
    /// Offset of this block's record inside the root host record.
    pub host_offset: usize,
}

impl BlockLayout {
    pub fn fields(&self) -> impl Iterator<Item = &FieldPlacement> {
        self.entries.iter().filter_map(|e| match e {
            BlockEntry::Field(f) => Some(f),
            BlockEntry::Block(_) => None,
        })
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BlockLayout> {
        self.entries.iter().filter_map(|e| match e {
            BlockEntry::Block(b) => Some(b),
            BlockEntry::Field(_) => None,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldPlacement> {
        self.fields().find(|f| f.name == name)
    }

    pub fn block(&self, name: &str) -> Option<&BlockLayout> {
        self.blocks().find(|b| b.name == name)
    }

    /// Looks up a field by dot path relative to this block, e.g. `"light.color"`.
    pub fn find(&self, path: &str) -> Option<&FieldPlacement> {
        match path.split_once('.') {
            Some((head, rest)) => self.block(head)?.find(rest),
            None => self.field(path),
        }
    }

    pub fn binding_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, binding: u32) -> Option<&BindingSlot> {
        self.slots.iter().find(|s| s.binding == binding)
    }

    /// Binding index of the named opaque resource.
    pub fn resource_binding(&self, name: &str) -> Option<u32> {
        self.slots.iter().find_map(|s| match &s.kind {
            SlotKind::Resource { name: n, .. } if n == name => Some(s.binding),
            _ => None,
        })
    }

    /// Depth-first `(path, block)` pairs, starting with this block under its own name.
    pub fn walk(&self) -> Vec<(String, &BlockLayout)> {
        let mut out = Vec::new();
        self.walk_into("", &mut out);
        out
    }

    fn walk_into<'a>(&'a self, parent: &str, out: &mut Vec<(String, &'a BlockLayout)>) {
        let path = join_path(parent, &self.name);
        out.push((path.clone(), self));
        for block in self.blocks() {
            block.walk_into(&path, out);
        }
    }

    /// Scatters the uniform members of `root` (the bytes of the root host record)
    /// into a device-side image of this block's uniform buffer.
    ///
    /// Returns `None` when the block has no uniform buffer or `root` is too short
    /// for one of the placements.
    pub fn pack_uniforms(&self, root: &[u8]) -> Option<Vec<u8>> {
        let size = self.uniform_size?;
        let mut image = vec![0u8; size as usize];
        for field in self.fields().filter(|f| f.is_uniform()) {
            let len = field.copy_len();
            let src = root.get(field.host_offset..field.host_offset + len)?;
            let start = field.offset as usize;
            image.get_mut(start..start + len)?.copy_from_slice(src);
        }
        Some(image)
    }
}
