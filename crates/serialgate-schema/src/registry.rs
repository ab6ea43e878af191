use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::config::{FieldSpec, RegistryConfig, SchemaSpec};
use crate::descriptor::FieldDescriptor;
use crate::error::{Result, SchemaError};
use crate::parser;

/// Ordered set of field descriptors keyed by short name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            fields: Vec::new(),
            index: HashMap::new(),
            config,
        }
    }

    /// Add a descriptor. Short names must be unique and not reserved.
    pub fn register(&mut self, descriptor: FieldDescriptor) -> Result<()> {
        let short_name = descriptor.short_name();
        if short_name.is_empty() {
            return Err(SchemaError::InvalidField {
                field: String::new(),
                message: "short name must not be empty".to_string(),
            });
        }
        if short_name.contains(self.config.marker)
            || short_name.contains(|c: char| self.config.separators.contains(c))
        {
            return Err(SchemaError::InvalidField {
                field: short_name.to_string(),
                message: "short name contains a separator or marker".to_string(),
            });
        }
        if self.config.is_reserved(short_name) {
            return Err(SchemaError::ReservedField(short_name.to_string()));
        }
        if self.index.contains_key(short_name) {
            return Err(SchemaError::DuplicateField(short_name.to_string()));
        }

        self.index.insert(short_name.to_string(), self.fields.len());
        self.fields.push(descriptor);
        Ok(())
    }

    /// Compile and add a declarative field.
    pub fn register_spec(&mut self, spec: &FieldSpec) -> Result<()> {
        let parse = parser::build(&spec.short_name, &spec.parser)?;
        let descriptor = FieldDescriptor::from_parse_fn(&spec.short_name, &spec.target_name, parse)
            .with_topics(spec.topics.iter().cloned())
            .with_force_send(spec.force_send);
        self.register(descriptor)
    }

    /// Build a registry from a parsed schema document.
    pub fn from_spec(spec: &SchemaSpec) -> Result<Self> {
        let mut registry = Self::with_config(spec.config.clone());
        for field in &spec.fields {
            registry.register_spec(field)?;
        }
        tracing::debug!(fields = registry.len(), "schema registry built");
        Ok(registry)
    }

    /// Build a registry from a JSON schema document.
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: SchemaSpec = serde_json::from_str(json)?;
        Self::from_spec(&spec)
    }

    /// Load a JSON schema document from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let max_bytes = RegistryConfig::default().max_schema_file_size;
        let file = std::fs::File::open(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;
        let metadata = file
            .metadata()
            .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
        if !metadata.is_file() {
            return Err(SchemaError::LoadFailed(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        if metadata.len() > max_bytes as u64 {
            return Err(SchemaError::LoadFailed(format!(
                "schema file too large ({} bytes): {}",
                metadata.len(),
                path.display()
            )));
        }

        let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| {
                SchemaError::LoadFailed(format!("failed reading {}: {err}", path.display()))
            })?;
        if content.len() > max_bytes {
            return Err(SchemaError::LoadFailed(format!(
                "schema file too large while reading: {}",
                path.display()
            )));
        }

        Self::from_json(&content)
    }

    /// Look up a descriptor by short name.
    pub fn get(&self, short_name: &str) -> Option<&FieldDescriptor> {
        self.index.get(short_name).map(|&i| &self.fields[i])
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Union of every topic any descriptor publishes under.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .fields
            .iter()
            .flat_map(|d| d.topics().iter().cloned())
            .collect();
        topics.sort_unstable();
        topics.dedup();
        topics
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::config::ParserKind;

    const SCHEMA: &str = r#"{
        "fields": [
            { "shortName": "temp", "targetName": "temperature", "topics": ["sensordata"],
              "parser": { "kind": "float" } },
            { "shortName": "hum", "targetName": "humidity", "topics": ["sensordata", "climate"],
              "parser": { "kind": "integer", "min": 0, "max": 100 } },
            { "shortName": "btn", "targetName": "button", "forceSend": true,
              "parser": { "kind": "bool" } }
        ]
    }"#;

    fn float_spec(short: &str) -> FieldSpec {
        FieldSpec {
            short_name: short.to_string(),
            target_name: short.to_string(),
            topics: vec![],
            force_send: false,
            parser: ParserKind::Float {
                min: None,
                max: None,
            },
        }
    }

    #[test]
    fn from_json_keeps_order_and_metadata() {
        let registry = SchemaRegistry::from_json(SCHEMA).unwrap();
        let order: Vec<&str> = registry.iter().map(|d| d.short_name()).collect();
        assert_eq!(order, vec!["temp", "hum", "btn"]);
        assert!(registry.get("btn").unwrap().force_send());
        assert_eq!(registry.topics(), vec!["climate", "sensordata"]);
        assert_eq!(registry.get("hum").unwrap().parse("40").unwrap(), json!(40));
    }

    #[test]
    fn duplicate_short_name_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register_spec(&float_spec("t")).unwrap();
        let err = registry.register_spec(&float_spec("t")).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField(name) if name == "t"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reserved_and_malformed_names_rejected() {
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.register_spec(&float_spec("id")),
            Err(SchemaError::ReservedField(_))
        ));
        assert!(matches!(
            registry.register_spec(&float_spec("a;b")),
            Err(SchemaError::InvalidField { .. })
        ));
        assert!(matches!(
            registry.register_spec(&float_spec("")),
            Err(SchemaError::InvalidField { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn programmatic_descriptor() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(FieldDescriptor::new("raw", "raw", |v| Ok(Value::String(v.into()))))
            .unwrap();
        assert!(registry.get("raw").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn invalid_json_reported() {
        assert!(matches!(
            SchemaRegistry::from_json("{"),
            Err(SchemaError::InvalidJson(_))
        ));
    }

    #[test]
    fn from_file_loads_and_enforces_limits() {
        let dir = std::env::temp_dir().join(format!("serialgate-schema-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let good = dir.join("fields.json");
        std::fs::write(&good, SCHEMA).unwrap();
        assert_eq!(SchemaRegistry::from_file(&good).unwrap().len(), 3);

        let huge = dir.join("huge.json");
        std::fs::write(&huge, vec![b' '; 256 * 1024 + 1]).unwrap();
        assert!(matches!(
            SchemaRegistry::from_file(&huge),
            Err(SchemaError::LoadFailed(_))
        ));

        assert!(matches!(
            SchemaRegistry::from_file(&dir.join("missing.json")),
            Err(SchemaError::LoadFailed(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
