//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::domain::PointerWidth;
use crate::tracefs::{DEFAULT_FTRACE_ENABLED, DEFAULT_TRACING_ROOT};

#[derive(Parser)]
#[command(
    name = "ftrace",
    about = "Trace system calls through ftrace kprobes and decode trace_pipe",
    after_help = "\
EXAMPLES:
    sudo ftrace                              Trace every built-in event
    sudo ftrace sys_execve sys_connect       Trace selected events only
    sudo ftrace --json --duration 10         JSON lines for ten seconds
    ftrace --print-probes                    Show kprobe definitions and exit"
)]
pub struct Args {
    /// Events to enable (default: all built-in events)
    #[arg(value_name = "EVENT")]
    pub events: Vec<String>,

    /// Tracing root directory
    #[arg(long, value_name = "DIR", default_value = DEFAULT_TRACING_ROOT)]
    pub tracefs: PathBuf,

    /// Global function tracer switch
    #[arg(long, value_name = "FILE", default_value = DEFAULT_FTRACE_ENABLED)]
    pub ftrace_enabled: PathBuf,

    /// Pointer width of the traced kernel in bytes
    #[arg(long, value_name = "4|8", default_value = "8", value_parser = parse_pointer_width)]
    pub pointer_width: PointerWidth,

    /// Repetition count of list parameters (e.g. execve argv)
    #[arg(long, value_name = "N")]
    pub list_len: Option<usize>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Stop after N seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Print every probe definition and exit
    #[arg(long)]
    pub print_probes: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_pointer_width(value: &str) -> Result<PointerWidth, String> {
    let bytes: u8 = value.parse().map_err(|e| format!("{e}"))?;
    PointerWidth::try_from(bytes).map_err(|e| e.to_string())
}
