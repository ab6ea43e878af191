use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tokenizer and registry behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Characters that separate tokens within a payload.
    pub separators: String,
    /// Character splitting a token into short name and raw value.
    pub marker: char,
    /// Reserved short name carrying the device address.
    pub id_field: String,
    /// Reserved short name carrying session start/end.
    pub session_field: String,
    /// Maximum bytes accepted from a schema file.
    pub max_schema_file_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            separators: ";,\r\n".to_string(),
            marker: ':',
            id_field: "id".to_string(),
            session_field: "session".to_string(),
            max_schema_file_size: 256 * 1024,
        }
    }
}

impl RegistryConfig {
    pub fn is_reserved(&self, short_name: &str) -> bool {
        short_name == self.id_field || short_name == self.session_field
    }
}

/// How a raw token value is validated and typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParserKind {
    Float {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    Bool,
    Text {
        #[serde(default, rename = "maxLength")]
        max_length: Option<usize>,
    },
    Hex {
        #[serde(default)]
        bytes: Option<usize>,
    },
    Enum {
        values: Vec<String>,
    },
    Json {
        #[serde(default)]
        schema: Option<Value>,
    },
}

/// One field descriptor as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub short_name: String,
    pub target_name: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub force_send: bool,
    pub parser: ParserKind,
}

/// A complete schema document: tokenizer settings plus ordered fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSpec {
    #[serde(flatten)]
    pub config: RegistryConfig,
    pub fields: Vec<FieldSpec>,
}
