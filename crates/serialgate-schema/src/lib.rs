//! Declarative field schema and decode pipeline for sensor frames.
//!
//! A frame payload such as `id:01A2;temp:23.5;hum:41` is split into
//! `shortName:value` tokens. Each known short name maps to a
//! [`FieldDescriptor`] whose parse function turns the raw text into a typed
//! value. Failures stay scoped to their field; unknown names are ignored.

pub mod config;
pub mod decode;
pub mod descriptor;
pub mod error;
pub mod parser;
pub mod registry;
pub mod tokenizer;

pub use config::{FieldSpec, ParserKind, RegistryConfig, SchemaSpec};
pub use decode::{normalize_address, wire_address, DecodedField, DecodedFrame, SessionSignal};
pub use descriptor::{FieldDescriptor, ParseFn};
pub use error::{FieldError, Result, SchemaError};
pub use registry::SchemaRegistry;
pub use tokenizer::{tokenize, Token};
