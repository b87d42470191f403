// Declaration-time schema registry: per host record type, a static table
// mapping shader-side names to host members.

use crate::TypeTag;

/// What a schema field refers to in the host record.
#[derive(Debug, Clone, Copy)]
pub enum SchemaMember {
    /// Inline value written into the block's uniform buffer.
    Primitive(TypeTag),
    /// Texture or sampler handle; occupies a binding slot, not uniform bytes.
    Resource,
    /// A nested record bound to a nested parameter block.
    Nested(&'static Schema),
}

impl SchemaMember {
    pub fn describe(&self) -> &'static str {
        match self {
            SchemaMember::Primitive(_) => "inline uniform",
            SchemaMember::Resource => "opaque resource",
            SchemaMember::Nested(_) => "parameter block",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaField {
    pub name: &'static str,
    /// Byte offset of the member inside its host record.
    pub host_offset: usize,
    pub member: SchemaMember,
}

impl SchemaField {
    pub const fn new(name: &'static str, host_offset: usize, member: SchemaMember) -> Self {
        Self {
            name,
            host_offset,
            member,
        }
    }

    /// Bytes this member contributes to a uniform buffer (0 for resources and nested records).
    pub fn host_size(&self) -> usize {
        match self.member {
            SchemaMember::Primitive(tag) => tag.size(),
            SchemaMember::Resource | SchemaMember::Nested(_) => 0,
        }
    }
}

#[derive(Debug)]
pub struct Schema {
    host: &'static str,
    fields: &'static [SchemaField],
}

impl Schema {
    pub const fn new(host: &'static str, fields: &'static [SchemaField]) -> Self {
        Self { host, fields }
    }

    /// Name of the host record type the schema was declared for.
    pub fn host(&self) -> &'static str {
        self.host
    }

    pub fn fields(&self) -> &'static [SchemaField] {
        self.fields
    }

    pub fn field(&self, name: &str) -> Option<&'static SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First field name declared more than once, if any.
    pub fn duplicate(&self) -> Option<&'static str> {
        self.fields
            .iter()
            .enumerate()
            .find(|(i, f)| self.fields[..*i].iter().any(|prev| prev.name == f.name))
            .map(|(_, f)| f.name)
    }
}

/// Associates a host record type with its schema.
pub trait Reflect {
    fn schema() -> &'static Schema;
}

/// Declares a static [`Schema`] for a `#[repr(C)]` host record.
///
/// ```
/// use refract_core::{schema, SchemaMember, TypeTag};
///
/// #[repr(C)]
/// struct Camera {
///     view: [[f32; 4]; 4],
///     proj: [[f32; 4]; 4],
/// }
///
/// schema! {
///     pub static CAMERA: Camera {
///         view => SchemaMember::Primitive(TypeTag::Mat4),
///         proj as "projection" => SchemaMember::Primitive(TypeTag::Mat4),
///     }
/// }
///
/// assert_eq!(CAMERA.field("projection").map(|f| f.host_offset), Some(64));
/// ```
#[macro_export]
macro_rules! schema {
    (
        $vis:vis static $name:ident : $host:ty {
            $( $field:ident $(as $rename:literal)? => $member:expr ),* $(,)?
        }
    ) => {
        $vis static $name: $crate::Schema = $crate::Schema::new(
            stringify!($host),
            &[
                $(
                    $crate::SchemaField::new(
                        $crate::schema!(@name $field $($rename)?),
                        ::core::mem::offset_of!($host, $field),
                        $member,
                    ),
                )*
            ],
        );
    };
    (@name $field:ident) => {
        stringify!($field)
    };
    (@name $field:ident $rename:literal) => {
        $rename
    };
}
