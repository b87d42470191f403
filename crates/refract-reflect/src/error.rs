use thiserror::Error;

/// Failures while reading shader reflection or resolving a schema against it.
///
/// Every variant is fatal for the shader load that produced it.
#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error("`{0}` not found in shader reflection")]
    FieldNotFound(String),

    #[error("unknown binding kind `{kind}` on `{field}`")]
    UnknownBindingKind { field: String, kind: String },

    #[error("unknown resource kind `{kind}` on `{field}`")]
    UnknownResourceKind { field: String, kind: String },

    #[error("`{field}` is declared as {expected} but the shader reflects {found}")]
    KindMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{field}` is declared more than once in schema `{schema}`")]
    DuplicateField { schema: &'static str, field: String },

    #[error("`{field}` ends at byte {end}, past the {size}-byte uniform buffer")]
    OutOfBounds { field: String, end: u64, size: u64 },

    #[error("malformed reflection at `{context}`: {reason}")]
    Malformed { context: String, reason: String },

    #[error("reflection is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read reflection: {0}")]
    Io(#[from] std::io::Error),
}

impl ReflectionError {
    pub(crate) fn malformed(context: &str, reason: impl Into<String>) -> Self {
        ReflectionError::Malformed {
            context: context.to_string(),
            reason: reason.into(),
        }
    }
}
