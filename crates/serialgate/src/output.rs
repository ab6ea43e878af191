use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::{Map, Value};
use serialgate_schema::{DecodedFrame, SessionSignal};
use serialgate_transport::{PortInfo, PortKind};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'static str,
    detail: String,
}

impl<'a> From<&'a PortInfo> for PortOutput<'a> {
    fn from(port: &'a PortInfo) -> Self {
        let (kind, detail) = match &port.kind {
            PortKind::Usb { vid, pid, product } => (
                "usb",
                match product {
                    Some(product) => format!("{vid:04x}:{pid:04x} {product}"),
                    None => format!("{vid:04x}:{pid:04x}"),
                },
            ),
            PortKind::Pci => ("pci", String::new()),
            PortKind::Bluetooth => ("bluetooth", String::new()),
            PortKind::Unknown => ("unknown", String::new()),
        };
        Self {
            name: &port.name,
            kind,
            detail,
        }
    }
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    let rows: Vec<PortOutput<'_>> = ports.iter().map(PortOutput::from).collect();
    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND", "DETAIL"]);
            for row in &rows {
                table.add_row(vec![row.name.to_string(), row.kind.to_string(), row.detail.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!("{} kind={} {}", row.name, row.kind, row.detail);
            }
        }
    }
}

#[derive(Serialize)]
struct FieldErrorOutput<'a> {
    field: &'a str,
    raw: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct DecodeOutput<'a> {
    address: Option<&'a str>,
    session: Option<&'static str>,
    record: Map<String, Value>,
    errors: Vec<FieldErrorOutput<'a>>,
    unknown: &'a [String],
}

impl<'a> From<&'a DecodedFrame> for DecodeOutput<'a> {
    fn from(decoded: &'a DecodedFrame) -> Self {
        Self {
            address: decoded.address.as_deref(),
            session: decoded.session.map(|signal| match signal {
                SessionSignal::Start => "start",
                SessionSignal::End => "end",
            }),
            record: decoded.to_record(),
            errors: decoded
                .errors
                .iter()
                .map(|err| FieldErrorOutput {
                    field: &err.field,
                    raw: &err.raw,
                    message: &err.message,
                })
                .collect(),
            unknown: &decoded.unknown,
        }
    }
}

pub fn print_decoded(decoded: &DecodedFrame, format: OutputFormat) {
    let out = DecodeOutput::from(decoded);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE", "TOPICS", "STATUS"]);
            for field in &decoded.fields {
                let topics: Vec<&str> = field.topics.iter().map(String::as_str).collect();
                table.add_row(vec![
                    field.target_name.clone(),
                    field.value.to_string(),
                    topics.join(","),
                    if field.force_send { "ok (force)" } else { "ok" }.to_string(),
                ]);
            }
            for err in &decoded.errors {
                table.add_row(vec![err.field.clone(), err.raw.clone(), String::new(), err.message.clone()]);
            }
            for name in &decoded.unknown {
                table.add_row(vec![name.clone(), String::new(), String::new(), "unknown".to_string()]);
            }
            println!(
                "address={} session={}",
                out.address.unwrap_or("-"),
                out.session.unwrap_or("-")
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "address={} session={} record={}",
                out.address.unwrap_or("-"),
                out.session.unwrap_or("-"),
                Value::Object(out.record.clone())
            );
            for err in &out.errors {
                println!("error field={} raw={} message={}", err.field, err.raw, err.message);
            }
            if !out.unknown.is_empty() {
                println!("unknown={}", out.unknown.join(","));
            }
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
