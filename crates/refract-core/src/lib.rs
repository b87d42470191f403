mod placement;
mod schema;

pub use placement::{BindingSlot, BlockEntry, BlockLayout, FieldPlacement, PlacementKind, SlotKind};
pub use schema::{Reflect, Schema, SchemaField, SchemaMember};

use std::fmt;

// ──────────────────────────────────────────────
// Host member types
// ──────────────────────────────────────────────

/// Primitive type of a host record member that lands in a uniform buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    F32,
    I32,
    U32,
    Vec2,
    Vec3,
    Vec4,
    IVec4,
    UVec4,
    /// Three columns, each padded to a `vec4`.
    Mat3,
    Mat4,
}

impl TypeTag {
    /// Size of the member in the host record, in bytes.
    pub const fn size(self) -> usize {
        match self {
            TypeTag::F32 | TypeTag::I32 | TypeTag::U32 => 4,
            TypeTag::Vec2 => 8,
            TypeTag::Vec3 => 12,
            TypeTag::Vec4 | TypeTag::IVec4 | TypeTag::UVec4 => 16,
            TypeTag::Mat3 => 48,
            TypeTag::Mat4 => 64,
        }
    }
}

// ──────────────────────────────────────────────
// Opaque resources
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
    Cube,
}

/// What an opaque (non-uniform) shader parameter binds to.
///
/// Shapes the reflection reader does not recognise are kept verbatim so the
/// layout builder can reject them with the reported name attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceShape {
    Texture(TextureDimension),
    Sampler,
    Unrecognized(String),
}

impl fmt::Display for ResourceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceShape::Texture(dim) => write!(f, "texture {:?}", dim),
            ResourceShape::Sampler => f.write_str("sampler"),
            ResourceShape::Unrecognized(kind) => write!(f, "unrecognized `{}`", kind),
        }
    }
}

// ──────────────────────────────────────────────
// Identity
// ──────────────────────────────────────────────

/// Process-stable identity of a registered shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u64);

impl fmt::Display for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shader#{}", self.0)
    }
}

/// Joins a parent block path and a child name with a dot.
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}
