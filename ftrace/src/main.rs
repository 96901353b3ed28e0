//! # ftrace - Main Entry Point
//!
//! Supports two operational modes:
//! - **Dry run** (`--print-probes`): print every kprobe definition and exit
//! - **Live** (default): register probes, stream decoded events until Ctrl+C
//!   or `--duration` elapses, then restore tracefs

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use log::warn;
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ftrace::cli::Args;
use ftrace::domain::StreamError;
use ftrace::event::ParsedEvent;
use ftrace::output::{display_statistics, write_event, OutputFormat};
use ftrace::parsing::ParserStats;
use ftrace::preflight::run_preflight_checks;
use ftrace::probes::EventRegistry;
use ftrace::tracefs::{ControlPaths, Ftrace};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else if msg.contains("unknown event") || msg.contains("pointer width") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Print every probe definition without touching tracefs
fn print_probes(registry: &EventRegistry) -> Result<()> {
    let mut out = io::stdout().lock();
    for event in registry.iter() {
        match registry.probe_definition(event)? {
            Some(definition) => writeln!(out, "{definition}")?,
            None => writeln!(out, "# {}: tracepoint", event.name())?,
        }
    }
    Ok(())
}

/// Messages from the pipe reader thread
enum Incoming {
    Event(ParsedEvent),
    Failed(StreamError),
}

/// Print everything the reader has sent so far
///
/// Returns `false` once the reader is gone.
fn drain(
    rx: &Receiver<Incoming>,
    out: &mut impl Write,
    format: OutputFormat,
    printed: &mut u64,
) -> Result<bool> {
    loop {
        match rx.try_recv() {
            Ok(Incoming::Event(event)) => {
                write_event(out, &event, format)?;
                *printed += 1;
            }
            Ok(Incoming::Failed(e)) => warn!("{e}"),
            Err(TryRecvError::Empty) => {
                out.flush()?;
                return Ok(true);
            }
            Err(TryRecvError::Disconnected) => {
                out.flush()?;
                return Ok(false);
            }
        }
    }
}

/// Outcome of a live session
struct Summary {
    exit_reason: &'static str,
    printed: u64,
    elapsed: Duration,
    stats: ParserStats,
}

/// Set up tracing and print events until interrupted or the pipe closes
async fn stream_events(ftrace: &mut Ftrace, args: &Args) -> Result<Summary> {
    ftrace.setup().context("Failed to set up ftrace")?;

    if !args.quiet {
        let selected: Vec<_> = ftrace.tracer().selected().collect();
        println!("events: {}", selected.join(" "));
    }

    let events = ftrace.event_stream().context("Failed to open trace_pipe")?;

    // trace_pipe blocks, so it is read on its own thread
    let (event_tx, event_rx) = bounded(1000);
    let shared_stats = Arc::new(Mutex::new(ParserStats::default()));
    let reader_stats = Arc::clone(&shared_stats);
    std::thread::spawn(move || {
        let mut events = events;
        loop {
            let Some(item) = events.next() else { break };
            if let Ok(mut stats) = reader_stats.lock() {
                *stats = events.stats();
            }
            let message = match item {
                Ok(event) => Incoming::Event(event),
                Err(e) => Incoming::Failed(e),
            };
            if event_tx.send(message).is_err() {
                break;
            }
        }
    });

    let format = if args.json { OutputFormat::Json } else { OutputFormat::Text };
    let mut out = BufWriter::new(io::stdout().lock());
    let mut printed = 0u64;

    // Setup Ctrl+C handler
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let tracing_start = Instant::now();
    let duration_limit =
        if args.duration > 0 { Some(Duration::from_secs(args.duration)) } else { None };

    // Track why we exited the loop
    let mut exit_reason = "interrupted";

    loop {
        if let Some(limit) = duration_limit {
            if tracing_start.elapsed() >= limit {
                exit_reason = "duration limit reached";
                break;
            }
        }

        if !drain(&event_rx, &mut out, format, &mut printed)? {
            exit_reason = "trace pipe closed";
            break;
        }

        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(100)) => {}
            _ = &mut ctrl_c => {
                break;
            }
        }
    }

    drain(&event_rx, &mut out, format, &mut printed)?;

    let stats = shared_stats.lock().map(|stats| *stats).unwrap_or_default();
    Ok(Summary { exit_reason, printed, elapsed: tracing_start.elapsed(), stats })
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    let registry = Arc::new(
        EventRegistry::builtin(args.pointer_width, args.list_len)
            .context("Invalid event descriptors")?,
    );

    if args.print_probes {
        return print_probes(&registry);
    }

    let paths = ControlPaths { tracing_root: args.tracefs.clone(), ftrace_enabled: args.ftrace_enabled.clone() };

    // Run pre-flight checks before anything else
    run_preflight_checks(&paths)?;

    if !quiet {
        println!("ftrace v{}", env!("CARGO_PKG_VERSION"));
        println!("tracefs: {}", paths.tracing_root.display());
        println!("pointer width: {}", args.pointer_width);
    }

    let mut ftrace = Ftrace::new(paths, Arc::clone(&registry));
    ftrace.reset().context("Failed to reset ftrace")?;
    ftrace.select(args.events.as_slice())?;

    // tracefs is restored even when the session fails
    let outcome = stream_events(&mut ftrace, &args).await;
    let summary = ftrace.conclude(outcome)?;

    if !quiet {
        eprintln!("\n{}: {:.1}s, {} events", summary.exit_reason, summary.elapsed.as_secs_f64(), summary.printed);
        display_statistics(&summary.stats);
    }

    Ok(())
}
