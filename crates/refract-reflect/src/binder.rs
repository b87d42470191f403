// Layout binder: resolves schema fields against a reflection subtree.
//
// Binding indices inside a block are assigned from the reflection alone: the
// uniform buffer (if any inline data exists) takes 0, opaque resources follow in
// the order the shader declares them. Schema fields only look those slots up, so
// a schema that names a subset of the shader's resources still yields a layout
// the pipeline accepts.

use refract_core::{
    join_path, BindingSlot, BlockEntry, BlockLayout, FieldPlacement, PlacementKind, Schema,
    SchemaMember, SlotKind,
};

use crate::tree::{NodeKind, ReflectionNode, ReflectionTree};
use crate::ReflectionError;

/// Resolves `schema` against the parameter block `node`.
pub fn bind(schema: &Schema, node: &ReflectionNode) -> Result<BlockLayout, ReflectionError> {
    resolve(node, node.name(), Some(schema), 0)
}

/// Resolves `schema` against the top-level parameter called `name`.
pub fn bind_parameter(
    schema: &Schema,
    tree: &ReflectionTree,
    name: &str,
) -> Result<BlockLayout, ReflectionError> {
    bind(schema, tree.parameter(name)?)
}

/// Schema-free layout of a block: every slot and every nested block, no field placements.
pub fn block_layout(node: &ReflectionNode) -> Result<BlockLayout, ReflectionError> {
    resolve(node, node.name(), None, 0)
}

/// Schema-free layouts for every top-level parameter, in declaration order.
pub fn block_layouts(tree: &ReflectionTree) -> Result<Vec<BlockLayout>, ReflectionError> {
    tree.parameters().iter().map(block_layout).collect()
}

fn resolve(
    node: &ReflectionNode,
    path: &str,
    schema: Option<&Schema>,
    host_offset: usize,
) -> Result<BlockLayout, ReflectionError> {
    let (group, uniform_size, children) = match node.kind() {
        NodeKind::Block {
            group,
            uniform_size,
            children,
        } => (*group, *uniform_size, children.as_slice()),
        other => {
            return Err(ReflectionError::KindMismatch {
                field: path.to_string(),
                expected: "parameter block",
                found: other.describe(),
            })
        }
    };

    let slots = slots(path, uniform_size, children)?;

    let entries = match schema {
        Some(schema) => bind_fields(schema, node, path, group, &slots, host_offset)?,
        None => children
            .iter()
            .filter(|c| c.is_block())
            .map(|c| resolve(c, &join_path(path, c.name()), None, host_offset).map(BlockEntry::Block))
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(BlockLayout {
        name: node.name().to_string(),
        group,
        uniform_size,
        slots,
        entries,
        host_offset,
    })
}

fn slots(
    path: &str,
    uniform_size: Option<u64>,
    children: &[ReflectionNode],
) -> Result<Vec<BindingSlot>, ReflectionError> {
    let mut slots = Vec::new();
    if let Some(size) = uniform_size {
        slots.push(BindingSlot {
            binding: 0,
            kind: SlotKind::UniformBuffer { size },
        });
    }

    for child in children {
        match child.kind() {
            NodeKind::Uniform { offset, size } => {
                let limit = uniform_size.unwrap_or(0);
                match offset.checked_add(*size) {
                    Some(end) if end <= limit => {}
                    end => {
                        return Err(ReflectionError::OutOfBounds {
                            field: join_path(path, child.name()),
                            end: end.unwrap_or(u64::MAX),
                            size: limit,
                        })
                    }
                }
            }
            NodeKind::Resource { shape, .. } => slots.push(BindingSlot {
                binding: slots.len() as u32,
                kind: SlotKind::Resource {
                    name: child.name().to_string(),
                    shape: shape.clone(),
                },
            }),
            NodeKind::Block { .. } => {}
        }
    }
    Ok(slots)
}

fn bind_fields(
    schema: &Schema,
    node: &ReflectionNode,
    path: &str,
    group: u32,
    slots: &[BindingSlot],
    host_offset: usize,
) -> Result<Vec<BlockEntry>, ReflectionError> {
    if let Some(field) = schema.duplicate() {
        return Err(ReflectionError::DuplicateField {
            schema: schema.host(),
            field: field.to_string(),
        });
    }

    let mut entries = Vec::with_capacity(schema.len());
    for field in schema.fields() {
        let child = node.child(field.name)?;
        let field_path = join_path(path, field.name);

        let entry = match (field.member, child.kind()) {
            (SchemaMember::Primitive(tag), NodeKind::Uniform { offset, size }) => {
                BlockEntry::Field(FieldPlacement {
                    name: field.name.to_string(),
                    group,
                    binding: 0,
                    offset: *offset,
                    size: *size,
                    kind: PlacementKind::Uniform,
                    host_offset: host_offset + field.host_offset,
                    host_size: tag.size(),
                })
            }
            (SchemaMember::Resource, NodeKind::Resource { shape, .. }) => {
                let binding = slots
                    .iter()
                    .find_map(|s| match &s.kind {
                        SlotKind::Resource { name, .. } if name == field.name => Some(s.binding),
                        _ => None,
                    })
                    .ok_or_else(|| ReflectionError::FieldNotFound(field_path.clone()))?;
                BlockEntry::Field(FieldPlacement {
                    name: field.name.to_string(),
                    group,
                    binding,
                    offset: 0,
                    size: 0,
                    kind: PlacementKind::Resource(shape.clone()),
                    host_offset: host_offset + field.host_offset,
                    host_size: 0,
                })
            }
            (SchemaMember::Nested(inner), NodeKind::Block { .. }) => BlockEntry::Block(resolve(
                child,
                &field_path,
                Some(inner),
                host_offset + field.host_offset,
            )?),
            (member, found) => {
                return Err(ReflectionError::KindMismatch {
                    field: field_path,
                    expected: member.describe(),
                    found: found.describe(),
                })
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}
