use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rpcprims_call::{Metadata, MetadataValue, Status};
use rpcprims_frame::{ResponseContext, ResponseFrame};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
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

/// One printable response frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameRow {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl FrameRow {
    pub fn from_frame(frame: &ResponseFrame<String>) -> Self {
        match frame {
            ResponseFrame::Headers(headers) => Self::metadata_row("headers", None, headers),
            ResponseFrame::Message(message) => Self {
                kind: "message",
                payload: Some(message.clone()),
                code: None,
                metadata: BTreeMap::new(),
            },
            ResponseFrame::Trailers(status, trailers) => {
                Self::metadata_row("trailers", Some(status), trailers)
            }
        }
    }

    fn metadata_row(kind: &'static str, status: Option<&Status>, metadata: &Metadata) -> Self {
        Self {
            kind,
            payload: None,
            code: status.map(|s| s.code().as_str()),
            metadata: flatten(metadata),
        }
    }
}

/// The frames a single-response call would have produced.
pub fn rows_from_context(ctx: &ResponseContext<String>) -> Vec<FrameRow> {
    vec![
        FrameRow::from_frame(&ResponseFrame::Headers(ctx.headers.clone())),
        FrameRow::from_frame(&ResponseFrame::Message(ctx.value.clone())),
        FrameRow::from_frame(&ResponseFrame::Trailers(
            Status::ok(),
            ctx.trailers.clone(),
        )),
    ]
}

pub fn print_rows(rows: &[FrameRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "PAYLOAD", "CODE", "METADATA"]);
            for row in rows {
                table.add_row(vec![
                    row.kind.to_string(),
                    row.payload.clone().unwrap_or_default(),
                    row.code.unwrap_or_default().to_string(),
                    join_metadata(&row.metadata),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!("{}", pretty_line(row));
            }
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            for payload in rows.iter().filter_map(|row| row.payload.as_deref()) {
                let _ = writeln!(out, "{payload}");
            }
            let _ = out.flush();
        }
    }
}

fn pretty_line(row: &FrameRow) -> String {
    let mut line = format!("kind={}", row.kind);
    if let Some(payload) = &row.payload {
        line.push_str(&format!(" payload={payload}"));
    }
    if let Some(code) = row.code {
        line.push_str(&format!(" code={code}"));
    }
    if !row.metadata.is_empty() {
        line.push_str(&format!(" metadata={}", join_metadata(&row.metadata)));
    }
    line
}

fn join_metadata(metadata: &BTreeMap<String, String>) -> String {
    metadata
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn flatten(metadata: &Metadata) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in metadata.iter() {
        let text = match value {
            MetadataValue::Ascii(text) => text.clone(),
            MetadataValue::Binary(bytes) => format!("<binary {} bytes>", bytes.len()),
        };
        out.entry(name.to_string())
            .and_modify(|existing| {
                existing.push(';');
                existing.push_str(&text);
            })
            .or_insert(text);
    }
    out
}
