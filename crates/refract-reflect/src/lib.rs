// Shader reflection for refract.
// Decodes the compiler's reflection document and resolves host schemas
// against it into binding-group placements.

mod binder;
mod error;
mod tests;
mod tree;

pub use binder::{bind, bind_parameter, block_layout, block_layouts};
pub use error::ReflectionError;
pub use tree::{NodeKind, ReflectionNode, ReflectionTree};
