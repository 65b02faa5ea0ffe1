use std::io::{IsTerminal, Write};
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use lcmbus_wire::ShortMessage;
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
struct MessageOutput<'a> {
    channel: &'a str,
    params: &'a str,
    sequence: u32,
    payload_size: usize,
    payload: String,
    source: Option<String>,
    timestamp: String,
}

pub fn print_message(message: &ShortMessage, source: Option<Ipv4Addr>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                channel: &message.channel,
                params: &message.params,
                sequence: message.sequence_number,
                payload_size: message.data.len(),
                payload: payload_preview(&message.data),
                source: source.map(|ip| ip.to_string()),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "SEQ", "SIZE", "SOURCE", "PAYLOAD"])
                .add_row(vec![
                    message.channel.clone(),
                    message.sequence_number.to_string(),
                    message.data.len().to_string(),
                    source.map(|ip| ip.to_string()).unwrap_or_default(),
                    payload_preview(&message.data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channel={} seq={} size={} source={} payload={}",
                message.channel,
                message.sequence_number,
                message.data.len(),
                source.map(|ip| ip.to_string()).unwrap_or_else(|| "-".to_string()),
                payload_preview(&message.data)
            );
        }
        OutputFormat::Raw => {
            print_raw(&message.data);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
