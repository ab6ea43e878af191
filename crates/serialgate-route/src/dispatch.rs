use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::{info, trace, warn};

use crate::error::SinkError;
use crate::router::PublishAction;

/// Opaque publish target (broker client, backend socket, ...).
pub trait PublishSink: Send {
    /// Short label used in logs.
    fn name(&self) -> &str;

    fn publish(&mut self, topic: &str, payload: &Value) -> Result<(), SinkError>;
}

/// Dispatcher behaviour.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Log only the first connectivity failure of an outage at warn level.
    pub mute_connection_errors: bool,
}

struct SinkSlot {
    sink: Box<dyn PublishSink>,
    failing: bool,
}

/// Fire-and-forget fan-out to every attached sink.
pub struct Dispatcher {
    sinks: Vec<SinkSlot>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            sinks: Vec::new(),
            config,
        }
    }

    /// Attach another sink. Each sink receives every publish.
    pub fn with_sink(mut self, sink: impl PublishSink + 'static) -> Self {
        self.add_sink(Box::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn PublishSink>) {
        self.sinks.push(SinkSlot {
            sink,
            failing: false,
        });
    }

    /// Publish one routed record. Returns how many sinks accepted it.
    pub fn dispatch(&mut self, action: &PublishAction) -> usize {
        self.publish(&action.topic, &action.payload())
    }

    /// Publish a payload under a topic. Failures are logged, never returned.
    pub fn publish(&mut self, topic: &str, payload: &Value) -> usize {
        let mute = self.config.mute_connection_errors;
        let mut delivered = 0;

        for slot in &mut self.sinks {
            match slot.sink.publish(topic, payload) {
                Ok(()) => {
                    if slot.failing {
                        info!(sink = slot.sink.name(), "publish sink recovered");
                        slot.failing = false;
                    }
                    delivered += 1;
                }
                Err(err) => {
                    let repeated = slot.failing && err.is_connectivity();
                    if mute && repeated {
                        trace!(sink = slot.sink.name(), topic, error = %err, "publish failed");
                    } else {
                        warn!(sink = slot.sink.name(), topic, error = %err, "publish failed");
                    }
                    slot.failing = true;
                }
            }
        }

        delivered
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}

/// Writes every publish to the tracing log.
#[derive(Debug, Default)]
pub struct LogSink;

impl PublishSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn publish(&mut self, topic: &str, payload: &Value) -> Result<(), SinkError> {
        info!(topic, payload = %payload, "publish");
        Ok(())
    }
}

/// Writes `{"topic": .., "payload": ..}` lines to any writer.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> PublishSink for JsonLinesSink<W> {
    fn name(&self) -> &str {
        "json-lines"
    }

    fn publish(&mut self, topic: &str, payload: &Value) -> Result<(), SinkError> {
        let line = json!({ "topic": topic, "payload": payload });
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every publish in memory. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(topic, payload)` pairs in publish order.
    pub fn records(&self) -> Vec<(String, Value)> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.records().into_iter().map(|(topic, _)| topic).collect()
    }

    pub fn clear(&self) {
        match self.records.lock() {
            Ok(mut records) => records.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl PublishSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn publish(&mut self, topic: &str, payload: &Value) -> Result<(), SinkError> {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push((topic.to_string(), payload.clone()));
        Ok(())
    }
}
