// Reflection tree: the compiler's parameter-block hierarchy, decoded once per shader.

use std::path::Path;
use std::str::FromStr;

use refract_core::{join_path, ResourceShape, TextureDimension};
use serde_json::Value;

use crate::ReflectionError;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Inline value inside the enclosing block's uniform buffer.
    Uniform { offset: u64, size: u64 },
    /// Texture or sampler slot.
    Resource { index: u32, shape: ResourceShape },
    /// Parameter block: one binding group with its own children.
    Block {
        group: u32,
        uniform_size: Option<u64>,
        children: Vec<ReflectionNode>,
    },
}

impl NodeKind {
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::Uniform { .. } => "inline uniform",
            NodeKind::Resource { .. } => "opaque resource",
            NodeKind::Block { .. } => "parameter block",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionNode {
    name: String,
    kind: NodeKind,
}

impl ReflectionNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, NodeKind::Block { .. })
    }

    /// Immediate children; empty for leaves.
    pub fn children(&self) -> &[ReflectionNode] {
        match &self.kind {
            NodeKind::Block { children, .. } => children,
            _ => &[],
        }
    }

    pub fn child(&self, name: &str) -> Result<&ReflectionNode, ReflectionError> {
        self.children()
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ReflectionError::FieldNotFound(join_path(&self.name, name)))
    }
}

/// Top-level shader parameters, each a block mapping to one binding group.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionTree {
    parameters: Vec<ReflectionNode>,
}

impl ReflectionTree {
    pub fn new(parameters: Vec<ReflectionNode>) -> Self {
        Self { parameters }
    }

    /// Decodes an already-parsed reflection document.
    pub fn from_value(root: &Value) -> Result<Self, ReflectionError> {
        let params = member(root, "parameters", "<root>")?
            .as_array()
            .ok_or_else(|| ReflectionError::malformed("parameters", "expected an array"))?;

        let parameters = params
            .iter()
            .map(parse_parameter)
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("reflection: {} top-level parameters", parameters.len());
        Ok(Self { parameters })
    }

    pub fn from_path(path: &Path) -> Result<Self, ReflectionError> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    pub fn parameters(&self) -> &[ReflectionNode] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Result<&ReflectionNode, ReflectionError> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ReflectionError::FieldNotFound(name.to_string()))
    }

    /// Resolves a dot path such as `"scene.light.color"`.
    pub fn find(&self, path: &str) -> Result<&ReflectionNode, ReflectionError> {
        let mut parts = path.split('.');
        let head = parts.next().unwrap_or_default();
        parts.try_fold(self.parameter(head)?, |node, part| node.child(part))
    }
}

impl FromStr for ReflectionTree {
    type Err = ReflectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_value(&value)
    }
}

// ──────────────────────────────────────────────
// Decoding
// ──────────────────────────────────────────────

fn member<'a>(value: &'a Value, key: &str, context: &str) -> Result<&'a Value, ReflectionError> {
    value
        .get(key)
        .ok_or_else(|| ReflectionError::malformed(context, format!("missing `{}`", key)))
}

fn string<'a>(value: &'a Value, key: &str, context: &str) -> Result<&'a str, ReflectionError> {
    member(value, key, context)?
        .as_str()
        .ok_or_else(|| ReflectionError::malformed(context, format!("`{}` is not a string", key)))
}

fn number(value: &Value, key: &str, context: &str) -> Result<u64, ReflectionError> {
    member(value, key, context)?.as_u64().ok_or_else(|| {
        ReflectionError::malformed(context, format!("`{}` is not an unsigned integer", key))
    })
}

fn index(value: &Value, key: &str, context: &str) -> Result<u32, ReflectionError> {
    let n = number(value, key, context)?;
    u32::try_from(n)
        .map_err(|_| ReflectionError::malformed(context, format!("`{}` = {} overflows u32", key, n)))
}

fn type_kind(node: &Value) -> Option<&str> {
    node.get("type")?.get("kind")?.as_str()
}

fn parse_parameter(param: &Value) -> Result<ReflectionNode, ReflectionError> {
    let name = string(param, "name", "parameters[]")?;
    let binding = member(param, "binding", name)?;
    let group = index(binding, "index", name)?;

    let node = if type_kind(param) == Some("parameterBlock") {
        let layout = member(&param["type"], "elementVarLayout", name)?;
        parse_block(name, name, group, layout)?
    } else {
        wrap_global(param, name, group)?
    };
    log::debug!(
        "reflection: parameter `{}` -> group {} ({} children)",
        name,
        group,
        node.children().len()
    );
    Ok(node)
}

/// A bare uniform or resource global gets a block of its own, so every
/// top-level parameter still owns exactly one binding group.
fn wrap_global(param: &Value, name: &str, group: u32) -> Result<ReflectionNode, ReflectionError> {
    let mut nested = 0;
    let value = parse_field(param, "", group, &mut nested)?;
    let uniform_size = uniform_extent(std::slice::from_ref(&value), name)?;
    Ok(ReflectionNode::new(
        name,
        NodeKind::Block {
            group,
            uniform_size,
            children: vec![value],
        },
    ))
}

fn parse_block(
    name: &str,
    context: &str,
    group: u32,
    layout: &Value,
) -> Result<ReflectionNode, ReflectionError> {
    let fields = member(member(layout, "type", context)?, "fields", context)?
        .as_array()
        .ok_or_else(|| ReflectionError::malformed(context, "`fields` is not an array"))?;

    let mut children = Vec::with_capacity(fields.len());
    let mut nested = 0;
    for field in fields {
        let child = parse_field(field, context, group, &mut nested)?;
        children.push(child);
    }

    let uniform_size = match declared_uniform_size(layout, context)? {
        Some(size) => Some(size),
        None => uniform_extent(&children, context)?,
    };

    Ok(ReflectionNode::new(
        name,
        NodeKind::Block {
            group,
            uniform_size,
            children,
        },
    ))
}

fn parse_field(
    field: &Value,
    parent: &str,
    parent_group: u32,
    nested: &mut u32,
) -> Result<ReflectionNode, ReflectionError> {
    let name = string(field, "name", parent)?;
    let context = join_path(parent, name);

    if type_kind(field) == Some("parameterBlock") {
        *nested += 1;
        let group = match field.get("binding").and_then(|b| b.get("index")) {
            Some(_) => index(&field["binding"], "index", &context)?,
            None => parent_group + *nested,
        };
        let layout = member(&field["type"], "elementVarLayout", &context)?;
        return parse_block(name, &context, group, layout);
    }

    let binding = member(field, "binding", &context)?;
    let kind = string(binding, "kind", &context)?;
    let kind = match kind {
        "uniform" => {
            let offset = number(binding, "offset", &context)?;
            let size = number(binding, "size", &context)?;
            if offset.checked_add(size).is_none() {
                return Err(ReflectionError::malformed(
                    &context,
                    format!("offset {} + size {} overflows", offset, size),
                ));
            }
            NodeKind::Uniform { offset, size }
        }
        "descriptorTableSlot" => NodeKind::Resource {
            index: index(binding, "index", &context)?,
            shape: resource_shape(field),
        },
        other => {
            return Err(ReflectionError::UnknownBindingKind {
                field: context,
                kind: other.to_string(),
            })
        }
    };
    Ok(ReflectionNode::new(name, kind))
}

fn resource_shape(field: &Value) -> ResourceShape {
    let ty = field.get("type");
    match type_kind(field) {
        Some("samplerState") => ResourceShape::Sampler,
        Some("resource") => {
            let shape = ty
                .and_then(|t| t.get("baseShape"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            match shape {
                "texture1D" => ResourceShape::Texture(TextureDimension::D1),
                "texture2D" => ResourceShape::Texture(TextureDimension::D2),
                "texture3D" => ResourceShape::Texture(TextureDimension::D3),
                "textureCube" => ResourceShape::Texture(TextureDimension::Cube),
                other => ResourceShape::Unrecognized(format!("resource/{}", other)),
            }
        }
        Some(other) => ResourceShape::Unrecognized(other.to_string()),
        None => ResourceShape::Unrecognized("untyped".to_string()),
    }
}

/// Size of the block's uniform buffer as reported by the compiler, if it reports one.
fn declared_uniform_size(layout: &Value, context: &str) -> Result<Option<u64>, ReflectionError> {
    let uniform = |binding: &Value| binding.get("kind").and_then(Value::as_str) == Some("uniform");

    let entry = if let Some(bindings) = layout.get("bindings") {
        let bindings = bindings
            .as_array()
            .ok_or_else(|| ReflectionError::malformed(context, "`bindings` is not an array"))?;
        bindings.iter().find(|b| uniform(b))
    } else {
        layout.get("binding").filter(|b| uniform(b))
    };

    match entry {
        Some(binding) => Ok(Some(number(binding, "size", context)?).filter(|&s| s > 0)),
        None => Ok(None),
    }
}

/// End of the furthest uniform child, for blocks whose size is not reported.
fn uniform_extent(children: &[ReflectionNode], context: &str) -> Result<Option<u64>, ReflectionError> {
    let mut extent = None;
    for child in children {
        if let NodeKind::Uniform { offset, size } = child.kind {
            let end = offset.checked_add(size).ok_or_else(|| {
                ReflectionError::malformed(
                    &join_path(context, &child.name),
                    format!("offset {} + size {} overflows", offset, size),
                )
            })?;
            extent = extent.max(Some(end));
        }
    }
    Ok(extent)
}
