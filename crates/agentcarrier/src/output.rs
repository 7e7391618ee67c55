use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use agentcarrier_delivery::StatsSnapshot;
use agentcarrier_frame::{Frame, FrameKind};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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
struct FrameOutput<'a> {
    kind: &'a str,
    provider_id: &'a str,
    answer_id: u64,
    payload_size: usize,
    payload: String,
    queue: &'a str,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, queue: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                kind: frame.kind.name(),
                provider_id: &frame.provider_id,
                answer_id: frame.answer_id,
                payload_size: frame.payload.len(),
                payload: payload_preview(frame.kind, frame.payload.as_ref()),
                queue,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "PEER", "ANSWER ID", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    frame.kind.name().to_string(),
                    frame.provider_id.clone(),
                    frame.answer_id.to_string(),
                    frame.payload.len().to_string(),
                    payload_preview(frame.kind, frame.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} peer={} answer_id={} size={} payload={}",
                frame.kind,
                frame.provider_id,
                frame.answer_id,
                frame.payload.len(),
                payload_preview(frame.kind, frame.payload.as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(frame.payload.as_ref());
        }
    }
}

/// What `send` delivered.
#[derive(Serialize)]
pub struct SendReport<'a> {
    pub port: String,
    pub transport: &'a str,
    pub kind: &'a str,
    pub provider_id: &'a str,
    pub answer_id: u64,
    pub payload_size: usize,
    pub frame_size: usize,
}

pub fn print_send_report(report: &SendReport<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TRANSPORT", "KIND", "PEER", "ANSWER ID", "BYTES"])
                .add_row(vec![
                    report.port.clone(),
                    report.transport.to_string(),
                    report.kind.to_string(),
                    report.provider_id.to_string(),
                    report.answer_id.to_string(),
                    report.frame_size.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sent {} frame ({} bytes) to {} via {}",
                report.kind, report.frame_size, report.port, report.transport
            );
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_stats(queue: &str, stats: &StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct StatsOutput<'a> {
                queue: &'a str,
                #[serde(flatten)]
                stats: &'a StatsSnapshot,
            }
            eprintln!(
                "{}",
                serde_json::to_string(&StatsOutput { queue, stats })
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            eprintln!(
                "queue={queue} received={} accepted={} rejected={} failed={}",
                stats.received, stats.accepted, stats.rejected, stats.failed
            );
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn payload_preview(kind: FrameKind, payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if kind.is_text() => text.to_string(),
        _ => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
