//! Rendering of decoded events and parser statistics

use std::fmt::Write as _;
use std::io::{self, Write};

use ftrace_common::{FIELD_SYMBOL, STANDARD_FIELDS};

use crate::event::{ParsedEvent, Value};
use crate::parsing::ParserStats;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One line per event: `[ts] comm(pid) symbol name=value ...`
#[must_use]
pub fn format_text(event: &ParsedEvent) -> String {
    let mut line = String::new();

    if let Some(ts) = event.timestamp() {
        let _ = write!(line, "[{ts:.6}] ");
    }
    let _ = write!(line, "{}", event.caller_name().unwrap_or("?"));
    if let Some(pid) = event.caller_pid() {
        let _ = write!(line, "({})", pid.0);
    }
    if let Some(symbol) = event.get(FIELD_SYMBOL).and_then(Value::as_str) {
        let _ = write!(line, " {symbol}");
    }

    for (name, value) in event.iter().filter(|(name, _)| !STANDARD_FIELDS.contains(name)) {
        let _ = write!(line, " {name}={value}");
    }
    line
}

/// # Errors
/// Returns an error if a field cannot be serialized.
pub fn format_json(event: &ParsedEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

/// Write one event to `out` in the chosen format
///
/// # Errors
/// Returns an error if serialization or the write fails.
pub fn write_event(out: &mut impl Write, event: &ParsedEvent, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", format_text(event)),
        OutputFormat::Json => writeln!(out, "{}", format_json(event)?),
    }
}

/// Display parser statistics
pub fn display_statistics(stats: &ParserStats) {
    eprintln!(
        "stats: lines={} events={} unknown={} overflow={} malformed={} decode_errors={}",
        stats.lines,
        stats.events,
        stats.unknown_events,
        stats.overflows,
        stats.malformed,
        stats.decode_errors
    );
}
