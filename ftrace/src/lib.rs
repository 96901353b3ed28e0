//! # ftrace - Kprobe Definitions and Trace Pipe Decoding
//!
//! ftrace drives the kernel's ftrace interface to observe system calls. It
//! renders kprobe definitions from declarative event descriptors, registers
//! and enables them through tracefs, then rebuilds typed events from the
//! text that `trace_pipe` emits.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Event Descriptors (probes)                   │
//! │  • name, probe handle, typed parameters, list repetition count  │
//! │  • rendered to `p:kprobes/<handle> <symbol> <fetch args>`       │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ kprobe_events / enable files
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Kernel (ftrace)                            │
//! │  • kprobes on syscall entry points                              │
//! │  • sched_process_fork tracepoint                                │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ trace_pipe lines (may be split)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ftrace (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │ EventStream  │──▶│  LineParser  │──▶│   Output     │        │
//! │  │ (BufRead)    │   │ (accumulate) │   │ (text/JSON)  │        │
//! │  └──────────────┘   └──────┬───────┘   └──────────────┘        │
//! │                            │ strategy per descriptor           │
//! │                            ▼                                   │
//! │             ┌──────────────────────────────┐                   │
//! │             │ standard │ fork │ socket addr│                   │
//! │             └──────────────────────────────┘                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`probes`]: parameter catalog, event descriptors, built-in registry
//! - [`parsing`]: trace line grammar, parsing strategies, incremental parser
//! - [`sockaddr`]: socket address reconstruction from raw probe integers
//! - [`stream`]: pull-based event iterator over a line source
//! - [`tracefs`]: control files, the `nop` tracer session, global controller
//! - [`event`]: decoded event model
//! - [`output`]: text and JSON rendering
//! - [`preflight`]: privilege and tracefs checks
//! - [`cli`]: command-line argument parsing and configuration
//! - [`domain`]: core domain types and errors
//!
//! ## Typical Usage
//!
//! ```bash
//! # Trace every built-in event
//! sudo ./ftrace
//!
//! # Trace process launches and outgoing connections as JSON
//! sudo ./ftrace --json sys_execve sys_connect
//!
//! # Show the probe definitions without touching the kernel
//! ./ftrace --print-probes
//! ```

pub mod cli;
pub mod domain;
pub mod event;
pub mod output;
pub mod parsing;
pub mod preflight;
pub mod probes;
pub mod sockaddr;
pub mod stream;
pub mod tracefs;
