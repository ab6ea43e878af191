/// Errors raised while building a schema registry.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema file could not be loaded.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// Two descriptors share a short name.
    #[error("duplicate field short name '{0}'")]
    DuplicateField(String),

    /// A descriptor uses a short name reserved by the protocol.
    #[error("field short name '{0}' is reserved")]
    ReservedField(String),

    /// A descriptor is malformed.
    #[error("invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    /// A json field schema could not be compiled.
    #[error("failed to compile schema for field '{field}': {message}")]
    CompileFailed { field: String, message: String },

    /// The schema document is not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchemaError>;

/// A single token that failed its descriptor's validation.
///
/// Scoped to one field: siblings in the same frame still decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}' rejected '{raw}': {message}")]
pub struct FieldError {
    pub field: String,
    pub raw: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, raw: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            raw: raw.into(),
            message: message.into(),
        }
    }
}
