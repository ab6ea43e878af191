use std::collections::BTreeSet;

use serde_json::{Map, Value};
use serialgate_frame::Frame;

use crate::error::FieldError;
use crate::registry::SchemaRegistry;
use crate::tokenizer::tokenize;

/// Session boundary carried by the reserved session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    Start,
    End,
}

impl SessionSignal {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "start" | "open" | "begin" | "1" => Some(Self::Start),
            "end" | "close" | "stop" | "0" => Some(Self::End),
            _ => None,
        }
    }
}

/// A successfully parsed field with its routing hints.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub short_name: String,
    pub target_name: String,
    pub value: Value,
    pub topics: BTreeSet<String>,
    pub force_send: bool,
}

/// Everything extracted from one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFrame {
    /// Device address from the id token, upper-case hex when it parses.
    pub address: Option<String>,
    pub session: Option<SessionSignal>,
    /// Fields in arrival order.
    pub fields: Vec<DecodedField>,
    pub errors: Vec<FieldError>,
    /// Short names with no descriptor.
    pub unknown: Vec<String>,
}

impl DecodedFrame {
    /// True when the frame carried nothing routable.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.session.is_none()
    }

    pub fn has_force_send(&self) -> bool {
        self.fields.iter().any(|f| f.force_send)
    }

    /// Target name to value. Later duplicates overwrite earlier ones.
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        for field in &self.fields {
            record.insert(field.target_name.clone(), field.value.clone());
        }
        record
    }
}

/// Normalize an id token into an address key.
///
/// Hex ids are rendered as four upper-case digits so `1a2` and `01A2` land on
/// the same session. Anything else is kept verbatim.
pub fn normalize_address(raw: &str) -> String {
    match u16::from_str_radix(raw, 16) {
        Ok(value) => format!("{value:04X}"),
        Err(_) => raw.to_string(),
    }
}

/// Wire address for a normalized key, if it is hex.
pub fn wire_address(key: &str) -> Option<u16> {
    u16::from_str_radix(key, 16).ok()
}

impl SchemaRegistry {
    /// Decode a frame payload against the registered descriptors.
    ///
    /// The id token is extracted first, then the session token. Remaining
    /// tokens are parsed in order; a failing field is recorded in `errors`
    /// without affecting its siblings.
    pub fn decode(&self, payload: &[u8]) -> DecodedFrame {
        let text = String::from_utf8_lossy(payload);
        let text = text.trim_end_matches('\0');
        let tokens = tokenize(text, self.config());
        let address = tokens
            .iter()
            .find(|t| t.name == self.config().id_field && !t.value.is_empty())
            .map(|t| normalize_address(t.value));
        let mut decoded = DecodedFrame {
            address,
            ..DecodedFrame::default()
        };

        for token in &tokens {
            if token.name == self.config().id_field {
                continue;
            }

            if token.name == self.config().session_field {
                match SessionSignal::parse(token.value) {
                    Some(signal) if decoded.session.is_none() => decoded.session = Some(signal),
                    Some(_) => {}
                    None => decoded.errors.push(FieldError::new(
                        token.name,
                        token.value,
                        "expected start or end",
                    )),
                }
                continue;
            }

            let Some(descriptor) = self.get(token.name) else {
                tracing::trace!(field = token.name, "ignoring unknown field");
                decoded.unknown.push(token.name.to_string());
                continue;
            };

            match descriptor.parse(token.value) {
                Ok(value) => decoded.fields.push(DecodedField {
                    short_name: descriptor.short_name().to_string(),
                    target_name: descriptor.target_name().to_string(),
                    value,
                    topics: descriptor.topics().clone(),
                    force_send: descriptor.force_send(),
                }),
                Err(err) => {
                    tracing::debug!(field = %err.field, raw = %err.raw, reason = %err.message, "field rejected");
                    decoded.errors.push(err);
                }
            }
        }

        decoded
    }

    /// Decode a received frame.
    pub fn decode_frame(&self, frame: &Frame) -> DecodedFrame {
        self.decode(frame.payload.as_ref())
    }
}
