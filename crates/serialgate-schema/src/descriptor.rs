use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::FieldError;

/// Pure parse function: raw token text in, typed value or a reason out.
pub type ParseFn = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

/// How one wire short name becomes a published field.
#[derive(Clone)]
pub struct FieldDescriptor {
    short_name: String,
    target_name: String,
    topics: BTreeSet<String>,
    force_send: bool,
    parser: ParseFn,
}

impl FieldDescriptor {
    pub fn new<F>(short_name: impl Into<String>, target_name: impl Into<String>, parser: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            short_name: short_name.into(),
            target_name: target_name.into(),
            topics: BTreeSet::new(),
            force_send: false,
            parser: Arc::new(parser),
        }
    }

    /// Build from an already shared parse function.
    pub fn from_parse_fn(
        short_name: impl Into<String>,
        target_name: impl Into<String>,
        parser: ParseFn,
    ) -> Self {
        Self {
            short_name: short_name.into(),
            target_name: target_name.into(),
            topics: BTreeSet::new(),
            force_send: false,
            parser,
        }
    }

    /// Add a topic this field is published under.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topics.insert(topic.into());
        self
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.extend(topics.into_iter().map(Into::into));
        self
    }

    /// Flush the session row as soon as this field arrives.
    pub fn with_force_send(mut self, force_send: bool) -> Self {
        self.force_send = force_send;
        self
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    pub fn force_send(&self) -> bool {
        self.force_send
    }

    /// Run the parse function. Deterministic for a given input.
    pub fn parse(&self, raw: &str) -> Result<Value, FieldError> {
        (self.parser)(raw).map_err(|message| FieldError::new(&self.short_name, raw, message))
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("short_name", &self.short_name)
            .field("target_name", &self.target_name)
            .field("topics", &self.topics)
            .field("force_send", &self.force_send)
            .finish_non_exhaustive()
    }
}
