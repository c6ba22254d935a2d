//! Subcommand implementations.
//!
//! Each command builds a protocol [`Request`], runs it through
//! [`protocol::dispatch`] and prints the [`Response`] either as text or,
//! with `--json`, verbatim.

pub mod config;
pub mod cut;
pub mod query;
pub mod view;

use crate::config::Settings;
use crate::protocol::{self, Request, Response};
use crate::reader::LineScanner;
use crate::record::{Level, LogRecord};
use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use std::path::Path;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Output {
    pub json: bool,
    pub settings: Settings,
}

pub(crate) fn open(path: &Path) -> Result<LineScanner> {
    LineScanner::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

pub(crate) fn run_request(
    scanner: &LineScanner,
    request: Request,
    settings: &Settings,
) -> Result<Response> {
    protocol::dispatch(scanner, request, settings)
        .with_context(|| format!("Request on {} failed", scanner.path().display()))
}

pub(crate) fn print_json(response: &Response) -> Result<()> {
    let text = serde_json::to_string_pretty(response).context("Failed to encode response")?;
    println!("{}", text);
    Ok(())
}

fn paint_level(level: Option<Level>, text: &str) -> ColoredString {
    match level {
        Some(Level::Error) => text.red(),
        Some(Level::Warn) => text.yellow(),
        Some(Level::Info) => text.normal(),
        Some(Level::Debug) => text.dimmed(),
        None => text.normal(),
    }
}

pub(crate) fn print_record(record: &LogRecord) {
    println!(
        "{} {}",
        format!("{:>8}", record.line_number).dimmed(),
        paint_level(record.level, &record.content)
    );
}

pub(crate) fn print_records(records: &[LogRecord]) {
    for record in records {
        print_record(record);
    }
}

pub(crate) fn summary_line(label: &str, value: impl std::fmt::Display) {
    println!("{}: {}", label.cyan(), value.to_string().green());
}
